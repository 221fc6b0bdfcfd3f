use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const VERIFICATION_CODE_DIGITS: u32 = 4;
pub const VERIFICATION_CODE_MINUTES: i64 = 10;
pub const RESET_CODE_DIGITS: u32 = 6;
pub const RESET_CODE_MINUTES: i64 = 15;

/// Uniform numeric code, zero-padded to `digits`.
pub fn generate_code(digits: u32) -> String {
    let upper = 10u32.pow(digits);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{value:0width$}", width = digits as usize)
}

pub fn verification_code() -> (String, DateTime<Utc>) {
    (
        generate_code(VERIFICATION_CODE_DIGITS),
        Utc::now() + Duration::minutes(VERIFICATION_CODE_MINUTES),
    )
}

pub fn reset_code() -> (String, DateTime<Utc>) {
    (
        generate_code(RESET_CODE_DIGITS),
        Utc::now() + Duration::minutes(RESET_CODE_MINUTES),
    )
}

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};

use finory_shared::errors::AppError;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;

/// Material handed to the client while the second factor is pending setup.
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub provisioning_uri: String,
    pub qr_code: String,
}

#[derive(Debug, Clone)]
pub struct TotpSettings {
    pub issuer: String,
    /// Accepted drift in 30-second steps on each side of the current one.
    pub skew: u8,
}

pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

fn totp(settings: &TotpSettings, secret: &str, account_name: &str) -> Result<TOTP, AppError> {
    let bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| AppError::internal(format!("stored TOTP secret is not base32: {e:?}")))?;

    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        settings.skew,
        STEP_SECS,
        bytes,
        Some(settings.issuer.clone()),
        account_name.to_string(),
    )
    .map_err(|e| AppError::internal(format!("invalid TOTP parameters: {e}")))
}

pub fn setup_material(settings: &TotpSettings, secret: &str, account_name: &str) -> Result<TwoFactorSetup, AppError> {
    let provisioning_uri = totp(settings, secret, account_name)?.get_url();
    let qr_code = qr_data_uri(&provisioning_uri)?;

    Ok(TwoFactorSetup {
        secret: secret.to_string(),
        provisioning_uri,
        qr_code,
    })
}

/// Checks `code` against the step at `unix_time` and `skew` steps either side.
pub fn verify_code_at(
    settings: &TotpSettings,
    secret: &str,
    account_name: &str,
    code: &str,
    unix_time: u64,
) -> Result<bool, AppError> {
    let code = code.trim();
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }
    Ok(totp(settings, secret, account_name)?.check(code, unix_time))
}

pub fn verify_code(settings: &TotpSettings, secret: &str, account_name: &str, code: &str) -> Result<bool, AppError> {
    verify_code_at(settings, secret, account_name, code, chrono::Utc::now().timestamp() as u64)
}

fn qr_data_uri(content: &str) -> Result<String, AppError> {
    let code = QrCode::new(content.as_bytes())
        .map_err(|e| AppError::internal(format!("QR encoding failed: {e}")))?;
    let image = DynamicImage::ImageLuma8(code.render::<Luma<u8>>().build());

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .map_err(|e| AppError::internal(format!("QR rendering failed: {e}")))?;

    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(buffer.get_ref())
    ))
}

#[cfg(test)]
pub(crate) fn code_at(settings: &TotpSettings, secret: &str, unix_time: u64) -> String {
    totp(settings, secret, "test@finory.io").unwrap().generate(unix_time)
}

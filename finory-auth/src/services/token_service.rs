use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use finory_shared::errors::AppError;
use finory_shared::types::auth::{Claims, TokenPair};

use crate::models::NewRefreshToken;

pub fn create_access_token(user_id: Uuid, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims::new(user_id, ttl_secs);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
}

pub fn create_refresh_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Only this digest is persisted; the opaque token itself is never stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A fresh pair plus the row that makes its refresh half redeemable.
pub fn create_token_pair(
    user_id: Uuid,
    secret: &str,
    access_ttl: i64,
    refresh_ttl: i64,
) -> Result<(TokenPair, NewRefreshToken), AppError> {
    let access_token = create_access_token(user_id, secret, access_ttl)?;
    let refresh_token = create_refresh_token();

    let row = NewRefreshToken {
        id: Uuid::now_v7(),
        user_id,
        token_hash: hash_token(&refresh_token),
        expires_at: refresh_expiry(refresh_ttl),
    };

    Ok((TokenPair::new(access_token, refresh_token, access_ttl), row))
}

fn refresh_expiry(ttl_secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(ttl_secs)
}

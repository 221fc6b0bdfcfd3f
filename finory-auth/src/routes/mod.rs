pub mod companies;
pub mod forgot_password;
pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod refresh;
pub mod register;
pub mod resend_otp;
pub mod reset_password;
pub mod tenant;
pub mod two_factor;
pub mod verify_email;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::types::auth::AuthUser;

use crate::services::auth_service::{normalize_email, Identity};
use crate::AppState;

/// Bearer identity wins; otherwise the request must name an email.
pub(crate) fn identity_from(user: Option<AuthUser>, email: Option<&str>) -> AppResult<Identity> {
    match (user, email.map(str::trim).filter(|e| !e.is_empty())) {
        (Some(user), _) => Ok(Identity::Account(user.id)),
        (None, Some(email)) => Ok(Identity::Email(normalize_email(email))),
        (None, None) => Err(AppError::new(
            ErrorCode::ValidationError,
            "email is required when not authenticated",
        )),
    }
}

/// Fixed-window limit on code issuance per identity. Fails open when Redis
/// is unavailable.
pub(crate) async fn check_code_rate_limit(state: &AppState, scope: &str, subject: &str) -> AppResult<()> {
    let Some(redis) = &state.redis else {
        return Ok(());
    };

    let key = format!("otp:rate:{scope}:{subject}");
    let allowed = match redis
        .rate_limit_check(&key, state.config.otp_rate_limit, state.config.otp_rate_window_secs)
        .await
    {
        Ok(allowed) => allowed,
        Err(e) => {
            tracing::warn!(error = %e, "rate limit check failed");
            true
        }
    };

    if !allowed {
        return Err(AppError::new(
            ErrorCode::EmailRateLimited,
            "please wait before requesting a new code",
        ));
    }
    Ok(())
}

pub(crate) fn rate_limit_subject(identity: &Identity) -> String {
    match identity {
        Identity::Account(id) => id.to_string(),
        Identity::Email(email) => email.clone(),
    }
}

//! Account lifecycle: registration, email verification, password reset,
//! second-factor enrollment and login.
//!
//! The state of an account is derived from its stored fields:
//! unverified, then email-verified, with the second factor disabled, pending
//! setup (secret stored, not enabled) or enabled. Every transition is a
//! conditional store update; this module only decides which one to attempt.

use std::sync::Arc;

use axum::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use finory_shared::clients::email::EmailClient;
use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::types::auth::TokenPair;

use crate::models::{Account, AccountStatus, Company, Membership, NewAccount};
use crate::services::two_factor::{self, TotpSettings, TwoFactorSetup};
use crate::services::{otp, password, token_service};
use crate::store::{AccountStore, RefreshTokenStore, TenantStore};

/// Outbound channel for one-time codes.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String>;
    async fn send_password_reset_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String>;
}

#[async_trait]
impl CodeDelivery for EmailClient {
    async fn send_verification_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String> {
        EmailClient::send_verification_code(self, to, code, valid_minutes).await
    }

    async fn send_password_reset_code(&self, to: &str, code: &str, valid_minutes: i64) -> Result<(), String> {
        EmailClient::send_password_reset_code(self, to, code, valid_minutes).await
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_ttl: i64,
    pub refresh_ttl: i64,
    pub totp: TotpSettings,
    /// Echo issued codes back as `otp_debug`. Development only.
    pub expose_debug_codes: bool,
}

/// Who a verification request is about: the bearer of a token, or whoever
/// owns the given address.
#[derive(Debug, Clone)]
pub enum Identity {
    Account(Uuid),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterOutcome {
    pub user: Account,
    pub company: Option<Company>,
    pub membership: Option<Membership>,
    pub tokens: TokenPair,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_debug: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct CodeIssued {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_debug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub user: Account,
    pub tokens: TokenPair,
    pub companies: Vec<Company>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_code() -> AppError {
    AppError::new(ErrorCode::InvalidOrExpiredCode, "invalid or expired code")
}

fn invalid_credentials() -> AppError {
    AppError::new(ErrorCode::InvalidCredentials, "invalid email or password")
}

fn invalid_second_factor() -> AppError {
    AppError::new(ErrorCode::InvalidSecondFactorCode, "invalid two-factor code")
}

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    tenants: Arc<dyn TenantStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    delivery: Arc<dyn CodeDelivery>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tenants: Arc<dyn TenantStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        delivery: Arc<dyn CodeDelivery>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            accounts,
            tenants,
            refresh_tokens,
            delivery,
            settings,
        }
    }

    fn debug_code(&self, code: String) -> Option<String> {
        self.settings.expose_debug_codes.then_some(code)
    }

    async fn find_account(&self, identity: &Identity) -> AppResult<Option<Account>> {
        match identity {
            Identity::Account(id) => self.accounts.find_by_id(*id).await,
            Identity::Email(email) => self.accounts.find_by_email(&normalize_email(email)).await,
        }
    }

    async fn require_account(&self, id: Uuid) -> AppResult<Account> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn issue_tokens(&self, user_id: Uuid) -> AppResult<TokenPair> {
        let (pair, row) = token_service::create_token_pair(
            user_id,
            &self.settings.jwt_secret,
            self.settings.access_ttl,
            self.settings.refresh_ttl,
        )?;
        self.refresh_tokens.insert(row).await?;
        Ok(pair)
    }

    async fn deliver_verification_code(&self, account: &Account, code: &str) {
        if let Err(e) = self
            .delivery
            .send_verification_code(&account.email, code, otp::VERIFICATION_CODE_MINUTES)
            .await
        {
            tracing::error!(error = %e, user_id = %account.id, "failed to send verification email");
        }
    }

    pub async fn register(&self, input: RegisterInput) -> AppResult<RegisterOutcome> {
        let email = normalize_email(&input.email);
        password::validate_password(&input.password)?;

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AppError::new(ErrorCode::DuplicateAccount, "an account with this email already exists"));
        }

        let password_hash = password::hash_password(&input.password)?;
        let (code, expiry) = otp::verification_code();
        let company_name = input
            .company_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let registration = self
            .accounts
            .register(
                NewAccount {
                    id: Uuid::now_v7(),
                    email,
                    full_name: input.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                    password_hash,
                    otp_code: Some(code.clone()),
                    otp_expiry: Some(expiry),
                },
                company_name,
            )
            .await?;

        self.deliver_verification_code(&registration.account, &code).await;
        let tokens = self.issue_tokens(registration.account.id).await?;

        tracing::info!(
            user_id = %registration.account.id,
            with_company = registration.company.is_some(),
            "account registered"
        );

        Ok(RegisterOutcome {
            user: registration.account,
            company: registration.company,
            membership: registration.membership,
            tokens,
            otp_debug: self.debug_code(code),
        })
    }

    /// Replaces any outstanding verification code. Unknown and already
    /// verified accounts get the same empty success.
    pub async fn resend_verification_code(&self, identity: Identity) -> AppResult<CodeIssued> {
        let Some(account) = self.find_account(&identity).await? else {
            return Ok(CodeIssued::default());
        };
        if account.is_email_verified {
            return Ok(CodeIssued::default());
        }

        let (code, expiry) = otp::verification_code();
        self.accounts.set_verification_code(account.id, &code, expiry).await?;
        self.deliver_verification_code(&account, &code).await;

        tracing::info!(user_id = %account.id, "verification code reissued");
        Ok(CodeIssued { otp_debug: self.debug_code(code) })
    }

    pub async fn verify_email(&self, identity: Identity, code: &str) -> AppResult<Account> {
        let account = self.find_account(&identity).await?.ok_or_else(invalid_code)?;

        if !self
            .accounts
            .consume_verification_code(account.id, code.trim(), Utc::now())
            .await?
        {
            return Err(invalid_code());
        }

        tracing::info!(user_id = %account.id, "email verified");
        self.require_account(account.id).await
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<CodeIssued> {
        let Some(account) = self.accounts.find_by_email(&normalize_email(email)).await? else {
            return Ok(CodeIssued::default());
        };

        let (code, expiry) = otp::reset_code();
        self.accounts.set_reset_code(account.id, &code, expiry).await?;

        if let Err(e) = self
            .delivery
            .send_password_reset_code(&account.email, &code, otp::RESET_CODE_MINUTES)
            .await
        {
            tracing::error!(error = %e, user_id = %account.id, "failed to send reset email");
        }

        tracing::info!(user_id = %account.id, "password reset code issued");
        Ok(CodeIssued { otp_debug: self.debug_code(code) })
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> AppResult<()> {
        password::validate_password(new_password)?;

        let account = self
            .accounts
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid_code)?;

        let new_hash = password::hash_password(new_password)?;
        let now = Utc::now();
        if !self
            .accounts
            .consume_reset_code(account.id, code.trim(), now, &new_hash)
            .await?
        {
            return Err(invalid_code());
        }

        let revoked = self.refresh_tokens.revoke_all(account.id, now).await?;
        tracing::info!(user_id = %account.id, revoked_sessions = revoked, "password reset");
        Ok(())
    }

    pub async fn setup_two_factor(&self, user_id: Uuid) -> AppResult<TwoFactorSetup> {
        let account = self.require_account(user_id).await?;
        if account.is_2fa_enabled {
            return Err(AppError::new(ErrorCode::AlreadyEnabled, "two-factor authentication is already enabled"));
        }

        let secret = two_factor::generate_secret();
        if !self.accounts.begin_two_factor_setup(account.id, &secret).await? {
            return Err(AppError::new(ErrorCode::AlreadyEnabled, "two-factor authentication is already enabled"));
        }

        tracing::info!(user_id = %account.id, "two-factor setup started");
        two_factor::setup_material(&self.settings.totp, &secret, &account.email)
    }

    pub async fn enable_two_factor(&self, user_id: Uuid, code: &str) -> AppResult<()> {
        let account = self.require_account(user_id).await?;
        if account.is_2fa_enabled {
            return Err(AppError::new(ErrorCode::AlreadyEnabled, "two-factor authentication is already enabled"));
        }
        let Some(secret) = account.two_factor_secret.as_deref() else {
            return Err(AppError::new(ErrorCode::SetupRequired, "call two-factor setup first"));
        };

        if !two_factor::verify_code(&self.settings.totp, secret, &account.email, code)? {
            return Err(invalid_second_factor());
        }
        // The secret may have been replaced by a concurrent setup call.
        if !self.accounts.enable_two_factor(account.id, secret).await? {
            return Err(invalid_second_factor());
        }

        tracing::info!(user_id = %account.id, "two-factor enabled");
        Ok(())
    }

    pub async fn verify_two_factor(&self, user_id: Uuid, code: &str) -> AppResult<()> {
        let account = self.require_account(user_id).await?;
        let secret = match (&account.two_factor_secret, account.is_2fa_enabled) {
            (Some(secret), true) => secret,
            _ => {
                return Err(AppError::new(ErrorCode::SetupRequired, "two-factor authentication is not enabled"));
            }
        };

        if !two_factor::verify_code(&self.settings.totp, secret, &account.email, code)? {
            return Err(invalid_second_factor());
        }
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str, two_factor_code: Option<&str>) -> AppResult<LoginOutcome> {
        let account = self
            .accounts
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid_credentials)?;

        if !password::verify_password(password, &account.password_hash)? {
            return Err(invalid_credentials());
        }

        let status = account.account_status();
        if status != AccountStatus::Active {
            return Err(AppError::new(ErrorCode::AccountInactive, format!("account is {status}")));
        }

        if !account.is_email_verified {
            return Err(self.verification_required(&account).await?);
        }

        if account.is_2fa_enabled {
            let secret = account
                .two_factor_secret
                .as_deref()
                .ok_or_else(|| AppError::internal("second factor enabled without a stored secret"))?;

            match two_factor_code.map(str::trim).filter(|c| !c.is_empty()) {
                None => {
                    return Err(AppError::with_details(
                        ErrorCode::SecondFactorRequired,
                        "two-factor code required",
                        json!({ "requires_2fa": true }),
                    ));
                }
                Some(code) => {
                    if !two_factor::verify_code(&self.settings.totp, secret, &account.email, code)? {
                        return Err(invalid_second_factor());
                    }
                }
            }
        }

        let now = Utc::now();
        self.accounts.touch_last_login(account.id, now).await?;
        let tokens = self.issue_tokens(account.id).await?;
        let companies = self.tenants.companies_for_account(account.id).await?;

        tracing::info!(user_id = %account.id, companies = companies.len(), "user logged in");

        let mut user = account;
        user.last_login = Some(now);
        Ok(LoginOutcome { user, tokens, companies })
    }

    /// Reuses a live code, otherwise issues and sends a new one.
    async fn verification_required(&self, account: &Account) -> AppResult<AppError> {
        let code = match account.live_verification_code(Utc::now()) {
            Some(code) => code.to_string(),
            None => {
                let (code, expiry) = otp::verification_code();
                self.accounts.set_verification_code(account.id, &code, expiry).await?;
                self.deliver_verification_code(account, &code).await;
                code
            }
        };

        let mut details = json!({ "requires_verification": true, "email": account.email });
        if let Some(code) = self.debug_code(code) {
            details["otp_debug"] = json!(code);
        }

        Ok(AppError::with_details(
            ErrorCode::VerificationRequired,
            "email address is not verified",
            details,
        ))
    }

    /// Rotation: the presented token is revoked in the same step that
    /// validates it, so it can be redeemed at most once.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let token_hash = token_service::hash_token(refresh_token.trim());
        let Some(stored) = self.refresh_tokens.rotate(&token_hash, Utc::now()).await? else {
            return Err(AppError::new(
                ErrorCode::RefreshTokenRevoked,
                "refresh token is invalid, expired or revoked",
            ));
        };

        let account = self.require_account(stored.user_id).await?;
        if account.account_status() != AccountStatus::Active {
            return Err(AppError::new(ErrorCode::AccountInactive, format!("account is {}", account.account_status())));
        }

        self.issue_tokens(account.id).await
    }

    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let token_hash = token_service::hash_token(refresh_token.trim());
        if !self.refresh_tokens.revoke(&token_hash, Utc::now()).await? {
            tracing::debug!("logout with unknown or already revoked refresh token");
        }
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<Account> {
        self.require_account(user_id).await
    }
}

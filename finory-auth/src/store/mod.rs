//! Persistence seams of the auth service.
//!
//! Every state transition on an account row is a single conditional update so
//! that concurrent requests cannot observe or consume the same code twice.

use axum::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use finory_shared::errors::AppResult;
use finory_shared::tenancy::MembershipSource;

use crate::models::{Account, Company, Membership, NewAccount, NewRefreshToken, RefreshToken};

pub mod pg;

#[cfg(test)]
pub mod memory;

pub use pg::PgStore;

/// Rows created by a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: Account,
    pub company: Option<Company>,
    pub membership: Option<Membership>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;

    /// Inserts the account and, when `company_name` is set, the company and an
    /// active owner membership, all in one transaction. A taken email yields
    /// `DuplicateAccount`.
    async fn register(&self, account: NewAccount, company_name: Option<String>) -> AppResult<Registration>;

    /// Overwrites any previous verification code.
    async fn set_verification_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()>;

    /// Marks the email verified and clears the code iff `code` matches and has
    /// not expired at `now`.
    async fn consume_verification_code(&self, id: Uuid, code: &str, now: DateTime<Utc>) -> AppResult<bool>;

    async fn set_reset_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()>;

    /// Stores `password_hash` and clears the reset code iff `code` matches and
    /// has not expired at `now`.
    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> AppResult<bool>;

    /// Stores a fresh secret unless the second factor is already enabled.
    async fn begin_two_factor_setup(&self, id: Uuid, secret: &str) -> AppResult<bool>;

    /// Flips the second factor on iff the stored secret is still `secret`.
    async fn enable_two_factor(&self, id: Uuid, secret: &str) -> AppResult<bool>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait TenantStore: MembershipSource {
    /// Companies where the account holds an active membership.
    async fn companies_for_account(&self, account_id: Uuid) -> AppResult<Vec<Company>>;

    /// Creates a company represented by `owner` and upserts the owner membership.
    async fn create_company(
        &self,
        owner: Uuid,
        name: &str,
        settings: serde_json::Value,
    ) -> AppResult<(Company, Membership)>;

    async fn members_of(&self, company_id: Uuid) -> AppResult<Vec<Membership>>;

    /// Toggles the existing row; `None` when the pair has no membership.
    async fn set_membership_active(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> AppResult<Option<Membership>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> AppResult<()>;

    /// Revokes the token iff it is live at `now` and returns it.
    async fn rotate(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<RefreshToken>>;

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<bool>;

    async fn revoke_all(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<usize>;
}

//! In-process stores backing the service and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::tenancy::{MembershipSource, TenantContext};

use crate::models::{
    Account, AccountStatus, Company, Membership, NewAccount, NewRefreshToken, RefreshToken, Role, OWNER_ROLE,
};

use super::{AccountStore, RefreshTokenStore, Registration, TenantStore};

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    companies: Vec<Company>,
    roles: Vec<Role>,
    memberships: Vec<Membership>,
    refresh_tokens: Vec<RefreshToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    membership_queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `first_active_membership` calls served so far.
    pub fn membership_queries(&self) -> usize {
        self.membership_queries.load(Ordering::SeqCst)
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.tables.lock().unwrap().accounts.iter().find(|a| a.id == id).cloned()
    }

    pub fn set_status(&self, id: Uuid, status: AccountStatus) {
        self.with_account(id, |a| a.status = status.to_string());
    }

    /// Moves both code expiries into the past.
    pub fn expire_codes(&self, id: Uuid) {
        let past = Utc::now() - Duration::seconds(1);
        self.with_account(id, |a| {
            if a.otp_expiry.is_some() {
                a.otp_expiry = Some(past);
            }
            if a.password_reset_otp_expiry.is_some() {
                a.password_reset_otp_expiry = Some(past);
            }
        });
    }

    pub fn add_membership(&self, company_id: Uuid, user_id: Uuid, is_active: bool) -> Membership {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let membership = Membership {
            id: Uuid::now_v7(),
            company_id,
            user_id,
            role_id: None,
            is_active,
            created_at: now,
            updated_at: now,
        };
        tables.memberships.push(membership.clone());
        membership
    }

    /// Row counts of `(accounts, companies, memberships)`.
    pub fn row_counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.lock().unwrap();
        (tables.accounts.len(), tables.companies.len(), tables.memberships.len())
    }

    pub fn live_refresh_tokens(&self, user_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.revoked_at.is_none())
            .count()
    }

    fn with_account<F: FnOnce(&mut Account)>(&self, id: Uuid, f: F) -> bool {
        let mut tables = self.tables.lock().unwrap();
        match tables.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                f(account);
                true
            }
            None => false,
        }
    }
}

impl Tables {
    fn owner_role(&mut self) -> Uuid {
        if let Some(role) = self.roles.iter().find(|r| r.name == OWNER_ROLE) {
            return role.id;
        }
        let role = Role {
            id: Uuid::now_v7(),
            name: OWNER_ROLE.to_string(),
            is_system_role: true,
            created_at: Utc::now(),
        };
        let id = role.id;
        self.roles.push(role);
        id
    }

    fn insert_owned_company(&mut self, owner: Uuid, name: String, settings: serde_json::Value) -> (Company, Membership) {
        let now = Utc::now();
        let company = Company {
            id: Uuid::now_v7(),
            name,
            settings,
            legal_representative_id: Some(owner),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let role_id = self.owner_role();
        let membership = Membership {
            id: Uuid::now_v7(),
            company_id: company.id,
            user_id: owner,
            role_id: Some(role_id),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.companies.push(company.clone());
        self.memberships.push(membership.clone());
        (company, membership)
    }

    fn company(&self, id: Uuid) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    fn active_memberships(&self, account_id: Uuid) -> Vec<&Membership> {
        let mut rows: Vec<&Membership> = self
            .memberships
            .iter()
            .filter(|m| m.user_id == account_id && m.is_active)
            .collect();
        rows.sort_by_key(|m| m.created_at);
        rows
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.account(id))
    }

    async fn register(&self, account: NewAccount, company_name: Option<String>) -> AppResult<Registration> {
        let mut tables = self.tables.lock().unwrap();
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Err(AppError::new(ErrorCode::DuplicateAccount, "an account with this email already exists"));
        }

        let now = Utc::now();
        let account = Account {
            id: account.id,
            email: account.email,
            full_name: account.full_name,
            password_hash: account.password_hash,
            is_email_verified: false,
            otp_code: account.otp_code,
            otp_expiry: account.otp_expiry,
            password_reset_otp: None,
            password_reset_otp_expiry: None,
            is_2fa_enabled: false,
            two_factor_secret: None,
            status: AccountStatus::Active.to_string(),
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        tables.accounts.push(account.clone());

        let (company, membership) = match company_name {
            Some(name) => {
                let (company, membership) = tables.insert_owned_company(account.id, name, serde_json::json!({}));
                (Some(company), Some(membership))
            }
            None => (None, None),
        };

        Ok(Registration { account, company, membership })
    }

    async fn set_verification_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()> {
        self.with_account(id, |a| {
            a.otp_code = Some(code.to_string());
            a.otp_expiry = Some(expiry);
        });
        Ok(())
    }

    async fn consume_verification_code(&self, id: Uuid, code: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut consumed = false;
        self.with_account(id, |a| {
            if a.otp_code.as_deref() == Some(code) && a.otp_expiry.is_some_and(|e| e > now) {
                a.is_email_verified = true;
                a.otp_code = None;
                a.otp_expiry = None;
                consumed = true;
            }
        });
        Ok(consumed)
    }

    async fn set_reset_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()> {
        self.with_account(id, |a| {
            a.password_reset_otp = Some(code.to_string());
            a.password_reset_otp_expiry = Some(expiry);
        });
        Ok(())
    }

    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> AppResult<bool> {
        let mut consumed = false;
        self.with_account(id, |a| {
            if a.password_reset_otp.as_deref() == Some(code)
                && a.password_reset_otp_expiry.is_some_and(|e| e > now)
            {
                a.password_hash = password_hash.to_string();
                a.password_reset_otp = None;
                a.password_reset_otp_expiry = None;
                consumed = true;
            }
        });
        Ok(consumed)
    }

    async fn begin_two_factor_setup(&self, id: Uuid, secret: &str) -> AppResult<bool> {
        let mut stored = false;
        self.with_account(id, |a| {
            if !a.is_2fa_enabled {
                a.two_factor_secret = Some(secret.to_string());
                stored = true;
            }
        });
        Ok(stored)
    }

    async fn enable_two_factor(&self, id: Uuid, secret: &str) -> AppResult<bool> {
        let mut enabled = false;
        self.with_account(id, |a| {
            if !a.is_2fa_enabled && a.two_factor_secret.as_deref() == Some(secret) {
                a.is_2fa_enabled = true;
                enabled = true;
            }
        });
        Ok(enabled)
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.with_account(id, |a| a.last_login = Some(at));
        Ok(())
    }
}

#[async_trait]
impl MembershipSource for MemoryStore {
    async fn first_active_membership(&self, account_id: Uuid) -> AppResult<Option<TenantContext>> {
        self.membership_queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let first = tables
            .active_memberships(account_id)
            .into_iter()
            .find_map(|m| tables.company(m.company_id).map(|c| m.tenant_context(c)));
        Ok(first)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn companies_for_account(&self, account_id: Uuid) -> AppResult<Vec<Company>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .active_memberships(account_id)
            .into_iter()
            .filter_map(|m| tables.company(m.company_id).cloned())
            .collect())
    }

    async fn create_company(
        &self,
        owner: Uuid,
        name: &str,
        settings: serde_json::Value,
    ) -> AppResult<(Company, Membership)> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.insert_owned_company(owner, name.to_string(), settings))
    }

    async fn members_of(&self, company_id: Uuid) -> AppResult<Vec<Membership>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Membership> = tables
            .memberships
            .iter()
            .filter(|m| m.company_id == company_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn set_membership_active(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> AppResult<Option<Membership>> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .memberships
            .iter_mut()
            .find(|m| m.company_id == company_id && m.user_id == user_id);
        Ok(row.map(|m| {
            m.is_active = is_active;
            m.updated_at = Utc::now();
            m.clone()
        }))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: NewRefreshToken) -> AppResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.refresh_tokens.push(RefreshToken {
            id: token.id,
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn rotate(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<RefreshToken>> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .refresh_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.revoked_at.is_none() && t.expires_at > now);
        Ok(row.map(|t| {
            t.revoked_at = Some(now);
            t.clone()
        }))
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .refresh_tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && t.revoked_at.is_none());
        Ok(row.map(|t| t.revoked_at = Some(now)).is_some())
    }

    async fn revoke_all(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<usize> {
        let mut tables = self.tables.lock().unwrap();
        let mut revoked = 0;
        for token in tables
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && t.revoked_at.is_none())
        {
            token.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

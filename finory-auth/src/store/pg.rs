use axum::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use finory_shared::clients::db::{with_conn, DbPool};
use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::tenancy::{MembershipSource, TenantContext};

use crate::models::{
    Account, Company, Membership, NewAccount, NewCompany, NewMembership, NewRefreshToken, NewRole,
    RefreshToken, Role, OWNER_ROLE,
};
use crate::schema::{companies, company_users, refresh_tokens, roles, users};

use super::{AccountStore, RefreshTokenStore, Registration, TenantStore};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn owner_role(conn: &mut PgConnection) -> QueryResult<Role> {
    diesel::insert_into(roles::table)
        .values(&NewRole {
            id: Uuid::now_v7(),
            name: OWNER_ROLE.to_string(),
            is_system_role: true,
        })
        .on_conflict(roles::name)
        .do_nothing()
        .execute(conn)?;

    roles::table
        .filter(roles::name.eq(OWNER_ROLE))
        .select(Role::as_select())
        .first(conn)
}

/// One row per (company, user): an existing row is reactivated in place.
fn upsert_membership(
    conn: &mut PgConnection,
    company_id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
) -> QueryResult<Membership> {
    diesel::insert_into(company_users::table)
        .values(&NewMembership {
            id: Uuid::now_v7(),
            company_id,
            user_id,
            role_id: Some(role_id),
            is_active: true,
        })
        .on_conflict((company_users::company_id, company_users::user_id))
        .do_update()
        .set((
            company_users::is_active.eq(true),
            company_users::role_id.eq(Some(role_id)),
            company_users::updated_at.eq(Utc::now()),
        ))
        .returning(Membership::as_returning())
        .get_result(conn)
}

fn insert_owned_company(
    conn: &mut PgConnection,
    owner: Uuid,
    name: String,
    settings: serde_json::Value,
) -> QueryResult<(Company, Membership)> {
    let company: Company = diesel::insert_into(companies::table)
        .values(&NewCompany {
            id: Uuid::now_v7(),
            name,
            settings,
            legal_representative_id: Some(owner),
        })
        .returning(Company::as_returning())
        .get_result(conn)?;

    let role = owner_role(conn)?;
    let membership = upsert_membership(conn, company.id, owner, role.id)?;
    Ok((company, membership))
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let email = email.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(users::table
                .filter(users::email.eq(&email))
                .select(Account::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        with_conn(&self.pool, move |conn| {
            Ok(users::table
                .find(id)
                .select(Account::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn register(&self, new_account: NewAccount, company_name: Option<String>) -> AppResult<Registration> {
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let account: Account = diesel::insert_into(users::table)
                    .values(&new_account)
                    .returning(Account::as_returning())
                    .get_result(conn)
                    .map_err(|e| match e {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            AppError::new(ErrorCode::DuplicateAccount, "an account with this email already exists")
                        }
                        other => AppError::from(other),
                    })?;

                let Some(name) = company_name else {
                    return Ok(Registration { account, company: None, membership: None });
                };

                let (company, membership) =
                    insert_owned_company(conn, account.id, name, serde_json::json!({}))?;

                Ok(Registration {
                    account,
                    company: Some(company),
                    membership: Some(membership),
                })
            })
        })
        .await
    }

    async fn set_verification_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()> {
        let code = code.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::update(users::table.find(id))
                .set((
                    users::otp_code.eq(Some(code)),
                    users::otp_expiry.eq(Some(expiry)),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn consume_verification_code(&self, id: Uuid, code: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let code = code.to_string();
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(
                users::table
                    .filter(users::id.eq(id))
                    .filter(users::otp_code.eq(&code))
                    .filter(users::otp_expiry.gt(now)),
            )
            .set((
                users::is_email_verified.eq(true),
                users::otp_code.eq(None::<String>),
                users::otp_expiry.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn set_reset_code(&self, id: Uuid, code: &str, expiry: DateTime<Utc>) -> AppResult<()> {
        let code = code.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::update(users::table.find(id))
                .set((
                    users::password_reset_otp.eq(Some(code)),
                    users::password_reset_otp_expiry.eq(Some(expiry)),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> AppResult<bool> {
        let code = code.to_string();
        let password_hash = password_hash.to_string();
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(
                users::table
                    .filter(users::id.eq(id))
                    .filter(users::password_reset_otp.eq(&code))
                    .filter(users::password_reset_otp_expiry.gt(now)),
            )
            .set((
                users::password_hash.eq(password_hash),
                users::password_reset_otp.eq(None::<String>),
                users::password_reset_otp_expiry.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn begin_two_factor_setup(&self, id: Uuid, secret: &str) -> AppResult<bool> {
        let secret = secret.to_string();
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(
                users::table
                    .filter(users::id.eq(id))
                    .filter(users::is_2fa_enabled.eq(false)),
            )
            .set((
                users::two_factor_secret.eq(Some(secret)),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn enable_two_factor(&self, id: Uuid, secret: &str) -> AppResult<bool> {
        let secret = secret.to_string();
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(
                users::table
                    .filter(users::id.eq(id))
                    .filter(users::two_factor_secret.eq(&secret))
                    .filter(users::is_2fa_enabled.eq(false)),
            )
            .set((
                users::is_2fa_enabled.eq(true),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        with_conn(&self.pool, move |conn| {
            diesel::update(users::table.find(id))
                .set(users::last_login.eq(Some(at)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl MembershipSource for PgStore {
    async fn first_active_membership(&self, account_id: Uuid) -> AppResult<Option<TenantContext>> {
        with_conn(&self.pool, move |conn| {
            let row = company_users::table
                .inner_join(companies::table)
                .filter(company_users::user_id.eq(account_id))
                .filter(company_users::is_active.eq(true))
                .order((company_users::created_at.asc(), company_users::id.asc()))
                .select((Membership::as_select(), Company::as_select()))
                .first::<(Membership, Company)>(conn)
                .optional()?;

            Ok(row.map(|(membership, company)| membership.tenant_context(&company)))
        })
        .await
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn companies_for_account(&self, account_id: Uuid) -> AppResult<Vec<Company>> {
        with_conn(&self.pool, move |conn| {
            Ok(company_users::table
                .inner_join(companies::table)
                .filter(company_users::user_id.eq(account_id))
                .filter(company_users::is_active.eq(true))
                .order((company_users::created_at.asc(), company_users::id.asc()))
                .select(Company::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create_company(
        &self,
        owner: Uuid,
        name: &str,
        settings: serde_json::Value,
    ) -> AppResult<(Company, Membership)> {
        let name = name.to_string();
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                Ok(insert_owned_company(conn, owner, name, settings)?)
            })
        })
        .await
    }

    async fn members_of(&self, company_id: Uuid) -> AppResult<Vec<Membership>> {
        with_conn(&self.pool, move |conn| {
            Ok(company_users::table
                .filter(company_users::company_id.eq(company_id))
                .order((company_users::created_at.asc(), company_users::id.asc()))
                .select(Membership::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn set_membership_active(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> AppResult<Option<Membership>> {
        with_conn(&self.pool, move |conn| {
            Ok(diesel::update(
                company_users::table
                    .filter(company_users::company_id.eq(company_id))
                    .filter(company_users::user_id.eq(user_id)),
            )
            .set((
                company_users::is_active.eq(is_active),
                company_users::updated_at.eq(Utc::now()),
            ))
            .returning(Membership::as_returning())
            .get_result(conn)
            .optional()?)
        })
        .await
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(&self, token: NewRefreshToken) -> AppResult<()> {
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(refresh_tokens::table)
                .values(&token)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn rotate(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<RefreshToken>> {
        let token_hash = token_hash.to_string();
        with_conn(&self.pool, move |conn| {
            Ok(diesel::update(
                refresh_tokens::table
                    .filter(refresh_tokens::token_hash.eq(&token_hash))
                    .filter(refresh_tokens::revoked_at.is_null())
                    .filter(refresh_tokens::expires_at.gt(now)),
            )
            .set(refresh_tokens::revoked_at.eq(Some(now)))
            .returning(RefreshToken::as_returning())
            .get_result(conn)
            .optional()?)
        })
        .await
    }

    async fn revoke(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let token_hash = token_hash.to_string();
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(
                refresh_tokens::table
                    .filter(refresh_tokens::token_hash.eq(&token_hash))
                    .filter(refresh_tokens::revoked_at.is_null()),
            )
            .set(refresh_tokens::revoked_at.eq(Some(now)))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn revoke_all(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<usize> {
        with_conn(&self.pool, move |conn| {
            Ok(diesel::update(
                refresh_tokens::table
                    .filter(refresh_tokens::user_id.eq(user_id))
                    .filter(refresh_tokens::revoked_at.is_null()),
            )
            .set(refresh_tokens::revoked_at.eq(Some(now)))
            .execute(conn)?)
        })
        .await
    }
}

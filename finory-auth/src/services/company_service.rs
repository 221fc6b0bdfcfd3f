use std::sync::Arc;

use uuid::Uuid;

use finory_shared::errors::{AppError, AppResult, ErrorCode};
use finory_shared::tenancy::{TenantContext, TenantResolver};

use crate::models::{Company, Membership};
use crate::store::TenantStore;

/// Company and membership management. Every membership change drops the
/// affected account's cached tenant resolution.
pub struct CompanyService {
    tenants: Arc<dyn TenantStore>,
    resolver: Arc<TenantResolver>,
}

impl CompanyService {
    pub fn new(tenants: Arc<dyn TenantStore>, resolver: Arc<TenantResolver>) -> Self {
        Self { tenants, resolver }
    }

    pub async fn companies_for(&self, account_id: Uuid) -> AppResult<Vec<Company>> {
        self.tenants.companies_for_account(account_id).await
    }

    pub async fn create_company(
        &self,
        owner: Uuid,
        name: &str,
        settings: Option<serde_json::Value>,
    ) -> AppResult<(Company, Membership)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::new(ErrorCode::ValidationError, "company name is required"));
        }
        let settings = match settings {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(value @ serde_json::Value::Object(_)) => value,
            Some(_) => {
                return Err(AppError::new(ErrorCode::ValidationError, "settings must be a JSON object"));
            }
        };

        let (company, membership) = self.tenants.create_company(owner, name, settings).await?;
        self.resolver.invalidate(owner).await;

        tracing::info!(user_id = %owner, company_id = %company.id, "company created");
        Ok((company, membership))
    }

    /// Members of the current tenant; nothing when no tenant is resolved.
    pub async fn members(&self, tenant: Option<&TenantContext>) -> AppResult<Vec<Membership>> {
        match tenant {
            Some(tenant) => self.tenants.members_of(tenant.tenant_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Toggles another member of the acting account's tenant. Roles are not
    /// evaluated, so any member may toggle any other member except the
    /// company's legal representative; nobody may toggle their own row.
    pub async fn set_member_active(
        &self,
        tenant: Option<&TenantContext>,
        actor: Uuid,
        user_id: Uuid,
        is_active: bool,
    ) -> AppResult<Membership> {
        let tenant = tenant.ok_or_else(|| {
            AppError::new(ErrorCode::TenantRequired, "no active company for this account")
        })?;
        if actor == user_id {
            return Err(AppError::new(ErrorCode::Forbidden, "cannot change your own membership"));
        }
        let represented = self
            .tenants
            .companies_for_account(actor)
            .await?
            .into_iter()
            .any(|c| c.id == tenant.tenant_id && c.legal_representative_id == Some(user_id));
        if represented {
            return Err(AppError::new(
                ErrorCode::Forbidden,
                "the company's legal representative cannot be changed",
            ));
        }

        let membership = self
            .tenants
            .set_membership_active(tenant.tenant_id, user_id, is_active)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::MembershipNotFound, "user is not a member of this company"))?;

        self.resolver.invalidate(user_id).await;

        tracing::info!(
            tenant_id = %tenant.tenant_id,
            user_id = %user_id,
            is_active,
            "membership updated"
        );
        Ok(membership)
    }
}

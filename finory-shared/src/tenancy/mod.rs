//! Tenant resolution: which company an authenticated account acts under.
//!
//! The membership table is the source of truth. Answers are memoized in a
//! [`ResolutionCache`] for a fixed TTL; misses always fall back to the
//! [`MembershipSource`], and "no tenant" is never cached.

mod cache;
mod resolver;

pub use cache::*;
pub use resolver::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resolved tenant of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub membership_id: Uuid,
    pub role_id: Option<Uuid>,
}

pub mod auth_service;
pub mod company_service;
pub mod otp;
pub mod password;
pub mod token_service;
pub mod two_factor;

pub use auth_service::{AuthService, AuthSettings, CodeDelivery};
pub use company_service::CompanyService;

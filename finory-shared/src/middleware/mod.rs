mod auth_extractor;
mod tenant_extractor;
mod json_extractor;
mod tracing_layer;
mod metrics_layer;

pub use auth_extractor::*;
pub use tenant_extractor::*;
pub use json_extractor::*;
pub use tracing_layer::*;
pub use metrics_layer::*;

pub mod auth;
pub mod session;

pub use auth::{GateRejection, RequireApiKey, check_api_key, require_api_key};
pub use session::require_session;

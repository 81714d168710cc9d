pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod importer;
pub mod logging;
pub mod middleware;
pub mod oauth;
pub mod router;

pub use config::{ApiKey, Config};
pub use error::{AppError, ConfigError, ImportError};
pub use importer::{ImportJob, ImportReport, run_import};
pub use router::{AppState, app_router};

//! Database backends for the importer.
//!
//! Layout:
//! - `postgres.rs`: PostgreSQL target (the production database)
//! - `sqlite.rs`: SQLite target (local runs and tests)
//!
//! Each opens exactly one connection per run and writes through a single
//! explicit transaction, so nothing is visible until the final commit.

pub mod postgres;
pub mod sqlite;

pub use postgres::PgTarget;
pub use sqlite::SqliteTarget;

use crate::error::ImportError;
use sqlx::Connection;
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{info, warn};

/// Where the importer writes. Built once from the database configuration.
#[derive(Clone)]
pub enum DatabaseTarget {
    Postgres(PgConnectOptions),
    Sqlite(SqliteConnectOptions),
}

impl std::fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseTarget::Postgres(opts) => f
                .debug_struct("Postgres")
                .field("host", &opts.get_host())
                .field("port", &opts.get_port())
                .field("database", &opts.get_database())
                .field("user", &opts.get_username())
                .finish(),
            DatabaseTarget::Sqlite(opts) => f
                .debug_struct("Sqlite")
                .field("filename", &opts.get_filename())
                .finish(),
        }
    }
}

/// Open one connection, giving up after `timeout`.
pub(crate) async fn connect<C, F>(connecting: F, timeout: Duration) -> Result<C, ImportError>
where
    F: Future<Output = Result<C, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, connecting).await {
        Ok(result) => result.map_err(ImportError::Connectivity),
        Err(_) => Err(ImportError::Connectivity(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no connection after {}s", timeout.as_secs()),
        )))),
    }
}

/// Close after a committed run. The data is already durable, so a failed
/// close is only logged.
pub(crate) async fn close<C: Connection>(conn: C) {
    match conn.close().await {
        Ok(()) => info!("Database connection closed"),
        Err(e) => warn!(error = %e, "closing database connection failed"),
    }
}

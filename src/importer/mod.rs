//! Bulk record import: tabular file -> validated rows -> one transaction.
//!
//! Layout:
//! - `record.rs`: value/row/table types and validation
//! - `source.rs`: delimited and spreadsheet readers
//! - backends implementing [`InsertTarget`] live in `crate::db`

pub mod record;
pub mod source;

pub use record::{FieldValue, ImportBatch, InsertStatement, RawRow, RecordRow, TableSpec};
pub use source::{HeaderPolicy, SourceKind, TabularSource};

use crate::db::{self, DatabaseTarget};
use crate::error::ImportError;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// A transactional sink for one batch. Implementations hold an open
/// transaction; nothing they write is visible until `commit`.
pub trait InsertTarget: Send + Sized {
    /// Render the insert for `spec` with this backend's placeholders.
    fn prepare(
        &mut self,
        spec: &TableSpec,
    ) -> impl Future<Output = Result<InsertStatement, sqlx::Error>> + Send;

    /// Execute one insert, binding each value as its own parameter.
    fn insert(
        &mut self,
        stmt: &InsertStatement,
        row: &RecordRow,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Insert every row in order and commit once. The first failure rolls the
/// whole transaction back.
pub async fn write_batch<T: InsertTarget>(
    mut target: T,
    batch: &ImportBatch,
) -> Result<u64, ImportError> {
    let stmt = match target.prepare(batch.spec()).await {
        Ok(stmt) => stmt,
        Err(source) => {
            abandon(target).await;
            return Err(ImportError::Statement {
                table: batch.spec().name().to_string(),
                source,
            });
        }
    };

    let mut inserted = 0u64;
    for row in batch.rows() {
        match target.insert(&stmt, row).await {
            Ok(affected) => inserted += affected,
            Err(e) => {
                abandon(target).await;
                return Err(ImportError::from_insert(row.index(), e));
            }
        }
    }

    target.commit().await.map_err(ImportError::Commit)?;
    Ok(inserted)
}

async fn abandon<T: InsertTarget>(target: T) {
    if let Err(e) = target.rollback().await {
        warn!(error = %e, "rollback failed; the server discards the transaction on disconnect");
    }
}

/// One run of the importer: where to read and which table to fill.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub source: TabularSource,
    pub table: TableSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub table: String,
    pub inserted: u64,
}

impl ImportJob {
    pub fn new(source: TabularSource, table: TableSpec) -> Self {
        Self { source, table }
    }

    /// Read and validate the whole file. No database is involved yet.
    pub fn load_batch(&self) -> Result<ImportBatch, ImportError> {
        let rows = self.source.read_rows()?;
        ImportBatch::validate(self.table.clone(), rows)
    }
}

/// Read, validate, connect, insert, commit, close.
///
/// The file is fully parsed and validated before a connection is opened, so
/// a missing file or malformed row never touches the database.
pub async fn run_import(
    job: &ImportJob,
    target: &DatabaseTarget,
    connect_timeout: Duration,
) -> Result<ImportReport, ImportError> {
    let batch = job.load_batch()?;
    info!(
        path = %job.source.path().display(),
        table = %batch.spec().name(),
        rows = batch.len(),
        "input validated"
    );

    let inserted = match target {
        DatabaseTarget::Postgres(opts) => {
            db::postgres::import(opts, &batch, connect_timeout).await?
        }
        DatabaseTarget::Sqlite(opts) => db::sqlite::import(opts, &batch, connect_timeout).await?,
    };

    info!(table = %batch.spec().name(), inserted, "import committed");
    Ok(ImportReport {
        table: batch.spec().name().to_string(),
        inserted,
    })
}

use crate::db::{close, connect};
use crate::error::ImportError;
use crate::importer::{
    FieldValue, ImportBatch, InsertStatement, InsertTarget, RecordRow, TableSpec, write_batch,
};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions};
use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use std::time::Duration;
use tracing::info;

/// Open transaction on a single SQLite connection.
pub struct SqliteTarget<'c> {
    tx: Transaction<'c, Sqlite>,
}

impl<'c> SqliteTarget<'c> {
    pub fn new(tx: Transaction<'c, Sqlite>) -> Self {
        Self { tx }
    }
}

impl InsertTarget for SqliteTarget<'_> {
    async fn prepare(&mut self, spec: &TableSpec) -> Result<InsertStatement, sqlx::Error> {
        Ok(spec.insert_statement(|_, _| "?".to_string()))
    }

    async fn insert(
        &mut self,
        stmt: &InsertStatement,
        row: &RecordRow,
    ) -> Result<u64, sqlx::Error> {
        debug_assert_eq!(stmt.arity(), row.values().len());
        let query = row
            .values()
            .iter()
            .fold(sqlx::query(stmt.sql()), |q, v| bind_value(q, v));
        let done = query.execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q FieldValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(b) => query.bind(*b),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Float(f) => query.bind(*f),
        FieldValue::Date(d) => query.bind(*d),
        FieldValue::DateTime(dt) => query.bind(*dt),
        FieldValue::Text(s) => query.bind(s.as_str()),
    }
}

/// Write `batch` through one connection and one transaction.
pub async fn import(
    opts: &SqliteConnectOptions,
    batch: &ImportBatch,
    connect_timeout: Duration,
) -> Result<u64, ImportError> {
    let mut conn = connect(SqliteConnection::connect_with(opts), connect_timeout).await?;
    info!(filename = %opts.get_filename().display(), "Connection established");

    let tx = conn.begin().await.map_err(ImportError::Connectivity)?;
    let inserted = write_batch(SqliteTarget::new(tx), batch).await?;

    close(conn).await;
    Ok(inserted)
}

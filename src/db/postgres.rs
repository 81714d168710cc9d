use crate::db::{close, connect};
use crate::error::ImportError;
use crate::importer::{
    FieldValue, ImportBatch, InsertStatement, InsertTarget, RecordRow, TableSpec, write_batch,
};
use sqlx::postgres::{PgArguments, PgConnectOptions};
use sqlx::query::Query;
use sqlx::{Connection, PgConnection, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Declared type of every live column of a table, as castable SQL.
const COLUMN_TYPES: &str = r#"
SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
FROM pg_attribute a
WHERE a.attrelid = $1::regclass
  AND a.attnum > 0
  AND NOT a.attisdropped
"#;

/// Open transaction on a single PostgreSQL connection.
///
/// PostgreSQL types every bound parameter, so each placeholder is cast to
/// its column's declared type. A NULL or a date string then lands in its
/// column the way a literal would; a value that cannot convert is still
/// rejected by the server.
pub struct PgTarget<'c> {
    tx: Transaction<'c, Postgres>,
}

impl<'c> PgTarget<'c> {
    pub fn new(tx: Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }
}

impl InsertTarget for PgTarget<'_> {
    async fn prepare(&mut self, spec: &TableSpec) -> Result<InsertStatement, sqlx::Error> {
        let column_types: HashMap<String, String> =
            sqlx::query_as::<_, (String, String)>(COLUMN_TYPES)
                .bind(spec.name())
                .fetch_all(&mut *self.tx)
                .await?
                .into_iter()
                .collect();
        debug!(table = %spec.name(), columns = column_types.len(), "resolved column types");

        Ok(spec.insert_statement(|i, column| {
            match column_types.get(&column.to_ascii_lowercase()) {
                Some(ty) => format!("${i}::{ty}"),
                None => format!("${i}"),
            }
        }))
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
    query: Query<'q, Postgres, PgArguments>,
    value: &'q FieldValue,
) -> Query<'q, Postgres, PgArguments> {
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
    opts: &PgConnectOptions,
    batch: &ImportBatch,
    connect_timeout: Duration,
) -> Result<u64, ImportError> {
    let mut conn = connect(PgConnection::connect_with(opts), connect_timeout).await?;
    info!(
        host = %opts.get_host(),
        database = opts.get_database().unwrap_or("<default>"),
        "Connection established"
    );

    let tx = conn.begin().await.map_err(ImportError::Connectivity)?;
    let inserted = write_batch(PgTarget::new(tx), batch).await?;

    close(conn).await;
    Ok(inserted)
}

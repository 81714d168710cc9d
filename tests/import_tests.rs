use order_desk::db::DatabaseTarget;
use order_desk::error::ImportError;
use order_desk::importer::{HeaderPolicy, ImportJob, TableSpec, TabularSource, run_import};
use rust_xlsxwriter::Workbook;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

const CUSTOMERS_DDL: &str = r#"
CREATE TABLE customers (
    id INTEGER NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    gender TEXT,
    date_of_birth TEXT,
    age INTEGER,
    email TEXT,
    phone TEXT,
    post_address TEXT,
    membership TEXT
)
"#;

const HEADER: &str =
    "id,first_name,last_name,gender,date_of_birth,age,email,phone,post_address,membership";

struct Fixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = dir.path().join("orders.sqlite");
        let mut conn = SqliteConnection::connect_with(
            &SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await
        .expect("failed to create database");
        sqlx::query(CUSTOMERS_DDL)
            .execute(&mut conn)
            .await
            .expect("failed to create table");
        conn.close().await.expect("failed to close connection");
        Self { dir, db_path }
    }

    fn target(&self) -> DatabaseTarget {
        DatabaseTarget::Sqlite(SqliteConnectOptions::new().filename(&self.db_path))
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("failed to write input file");
        path
    }

    async fn open(&self) -> SqliteConnection {
        SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&self.db_path))
            .await
            .expect("failed to open database")
    }

    /// Rows in insertion order.
    async fn customer_rows(&self) -> Vec<(i64, String, String, Option<i64>)> {
        let mut conn = self.open().await;
        sqlx::query_as("SELECT id, first_name, email, age FROM customers ORDER BY rowid")
            .fetch_all(&mut conn)
            .await
            .expect("failed to read customers")
    }

    async fn full_rows(&self) -> Vec<CustomerRow> {
        let mut conn = self.open().await;
        let sql = format!("SELECT {HEADER} FROM customers ORDER BY rowid");
        sqlx::query_as(&sql)
            .fetch_all(&mut conn)
            .await
            .expect("failed to read customers")
    }
}

type CustomerRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn csv_job(path: &Path) -> ImportJob {
    ImportJob::new(TabularSource::delimited(path), TableSpec::customers())
}

fn customer_line(id: i64, first: &str) -> String {
    format!(
        "{id},{first},Doe,Male,1990-01-01,34,{}@example.com,555-0100,\"1 Main St, Springfield\",Gold",
        first.to_lowercase()
    )
}

#[tokio::test]
async fn single_row_lands_with_every_column() {
    let fx = Fixture::new().await;
    let path = fx.write(
        "customers.csv",
        &format!("{HEADER}\n1,Jane,Doe,F,1990-01-01,34,jane@example.com,555-1234,1 Main St,gold\n"),
    );

    let report = run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect("import failed");

    assert_eq!(report.table, "customers");
    assert_eq!(report.inserted, 1);
    assert_eq!(
        fx.full_rows().await,
        vec![(
            1,
            "Jane".to_string(),
            "Doe".to_string(),
            Some("F".to_string()),
            Some("1990-01-01".to_string()),
            Some(34),
            Some("jane@example.com".to_string()),
            Some("555-1234".to_string()),
            Some("1 Main St".to_string()),
            Some("gold".to_string()),
        )]
    );
}

#[tokio::test]
async fn rows_are_inserted_in_file_order() {
    let fx = Fixture::new().await;
    let names = ["Carol", "Alice", "Bob", "Dave"];
    let body: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, n)| customer_line(10 - i as i64, n))
        .collect();
    let path = fx.write("customers.csv", &format!("{HEADER}\n{}\n", body.join("\n")));

    let report = run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect("import failed");

    assert_eq!(report.inserted, 4);
    let firsts: Vec<String> = fx.customer_rows().await.into_iter().map(|r| r.1).collect();
    assert_eq!(firsts, names);
}

#[tokio::test]
async fn empty_cells_become_null() {
    let fx = Fixture::new().await;
    let path = fx.write(
        "customers.csv",
        &format!("{HEADER}\n7,Eve,Doe,,,,eve@example.com,,,\n"),
    );

    run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect("import failed");

    assert_eq!(
        fx.customer_rows().await,
        vec![(7, "Eve".to_string(), "eve@example.com".to_string(), None)]
    );
}

#[tokio::test]
async fn short_row_fails_validation_before_any_insert() {
    let fx = Fixture::new().await;
    let path = fx.write(
        "customers.csv",
        &format!(
            "{HEADER}\n{}\n{}\n3,Bob,Doe,Male,1990-01-01,34,bob@example.com,555-0100,Elm St\n",
            customer_line(1, "Ann"),
            customer_line(2, "Ben"),
        ),
    );

    let err = run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect_err("short row must fail");

    match err {
        ImportError::MissingField { row, field } => {
            assert_eq!(row, 3);
            assert_eq!(field, "membership");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fx.customer_rows().await.is_empty());
}

#[tokio::test]
async fn duplicate_key_rolls_back_the_whole_batch() {
    let fx = Fixture::new().await;
    let path = fx.write(
        "customers.csv",
        &format!(
            "{HEADER}\n{}\n{}\n{}\n",
            customer_line(1, "Ann"),
            customer_line(2, "Ben"),
            customer_line(1, "Cat"),
        ),
    );

    let err = run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect_err("duplicate key must fail");

    assert!(
        matches!(err, ImportError::Integrity { row: 3, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.exit_code(), 70);
    assert!(fx.customer_rows().await.is_empty());
}

#[tokio::test]
async fn missing_file_is_reported_without_touching_the_database() {
    let fx = Fixture::new().await;
    let unreachable = DatabaseTarget::Sqlite(
        SqliteConnectOptions::new().filename(fx.dir.path().join("no-such-dir/db.sqlite")),
    );

    let err = run_import(
        &csv_job(&fx.dir.path().join("absent.csv")),
        &unreachable,
        TIMEOUT,
    )
    .await
    .expect_err("missing file must fail");

    assert!(matches!(err, ImportError::NotFound(_)), "unexpected error: {err:?}");
    assert_eq!(err.exit_code(), 66);
}

#[tokio::test]
async fn unreachable_database_is_a_connectivity_failure() {
    let fx = Fixture::new().await;
    let path = fx.write("customers.csv", &format!("{HEADER}\n{}\n", customer_line(1, "Ann")));
    let unreachable = DatabaseTarget::Sqlite(
        SqliteConnectOptions::new().filename(fx.dir.path().join("no-such-dir/db.sqlite")),
    );

    let err = run_import(&csv_job(&path), &unreachable, TIMEOUT)
        .await
        .expect_err("connect must fail");

    assert!(matches!(err, ImportError::Connectivity(_)), "unexpected error: {err:?}");
    assert_eq!(err.exit_code(), 69);
}

#[tokio::test]
async fn unknown_table_is_a_statement_failure() {
    let fx = Fixture::new().await;
    let path = fx.write("products.csv", "id,product_name,price,category,brand,product_description\n1,Pen,1.5,Office,Acme,Blue\n");
    let job = ImportJob::new(TabularSource::delimited(&path), TableSpec::products());

    let err = run_import(&job, &fx.target(), TIMEOUT)
        .await
        .expect_err("missing table must fail");

    assert!(
        matches!(err, ImportError::Integrity { row: 1, .. } | ImportError::Statement { .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn spreadsheet_headers_are_trimmed() {
    let fx = Fixture::new().await;
    let path = fx.dir.path().join("customers-data.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("customers").expect("valid sheet name");
    for (col, header) in HEADER.split(',').enumerate() {
        sheet
            .write_string(0, col as u16, format!(" {header} "))
            .expect("failed to write header");
    }
    let row = [
        "21", "Zoe", "Doe", "Female", "1985-06-30", "39", "zoe@example.com", "555-0199",
        "2 Oak Ave", "Silver",
    ];
    for (col, value) in row.iter().enumerate() {
        match value.parse::<f64>() {
            Ok(n) => sheet.write_number(1, col as u16, n),
            Err(_) => sheet.write_string(1, col as u16, *value),
        }
        .expect("failed to write cell");
    }
    workbook.save(&path).expect("failed to save workbook");

    let job = ImportJob::new(
        TabularSource::spreadsheet(&path, "customers"),
        TableSpec::customers(),
    );
    let report = run_import(&job, &fx.target(), TIMEOUT)
        .await
        .expect("import failed");

    assert_eq!(report.inserted, 1);
    assert_eq!(
        fx.customer_rows().await,
        vec![(21, "Zoe".to_string(), "zoe@example.com".to_string(), Some(39))]
    );
}

#[tokio::test]
async fn missing_sheet_is_reported() {
    let fx = Fixture::new().await;
    let path = fx.dir.path().join("book.xlsx");
    let mut workbook = Workbook::new();
    workbook.add_worksheet().set_name("Sheet1").expect("valid sheet name");
    workbook.save(&path).expect("failed to save workbook");

    let job = ImportJob::new(
        TabularSource::spreadsheet(&path, "customers"),
        TableSpec::customers(),
    );
    let err = job.load_batch().expect_err("sheet must be missing");

    assert!(matches!(err, ImportError::SheetNotFound { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn padded_csv_headers_match_only_when_trimmed() {
    let fx = Fixture::new().await;
    let padded = HEADER.replace(',', ", ");
    let path = fx.write("customers.csv", &format!("{padded}\n{}\n", customer_line(5, "Ann")));

    let err = run_import(&csv_job(&path), &fx.target(), TIMEOUT)
        .await
        .expect_err("padded headers must not match");
    assert!(matches!(err, ImportError::MissingField { row: 1, .. }), "unexpected error: {err:?}");

    let trimmed = ImportJob::new(
        TabularSource::Delimited {
            path,
            headers: HeaderPolicy::Trim,
        },
        TableSpec::customers(),
    );
    let report = run_import(&trimmed, &fx.target(), TIMEOUT)
        .await
        .expect("import failed");
    assert_eq!(report.inserted, 1);
}

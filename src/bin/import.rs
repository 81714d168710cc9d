//! order-import - load a CSV or spreadsheet into one database table.
//!
//! Connection settings come from `order-desk.toml` / `ORDER_DESK_DATABASE__*`
//! and can be overridden on the command line. Every row is inserted inside a
//! single transaction; any failure leaves the table untouched.

use clap::{Parser, ValueEnum};
use mimalloc::MiMalloc;
use order_desk::config::Config;
use order_desk::error::ImportError;
use order_desk::importer::{
    HeaderPolicy, ImportJob, SourceKind, TableSpec, TabularSource, run_import,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "order-import")]
#[command(about = "Insert the rows of a CSV or spreadsheet file into a table", long_about = None)]
#[command(version)]
struct Args {
    /// Input file, or a directory holding the table's default input file
    #[arg(short, long)]
    file: PathBuf,

    /// Target table (`customers` and `products` are built in)
    #[arg(short, long, default_value = "customers")]
    table: String,

    /// Required columns in insert order; needed for tables that are not built in
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Input format; guessed from the file extension when omitted
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// Spreadsheet sheet name [default: the table name]
    #[arg(long)]
    sheet: Option<String>,

    /// Strip whitespace around CSV header names, as spreadsheet headers are
    #[arg(long)]
    trim_headers: bool,

    /// Full database URL (`postgres://...` or `sqlite:...`)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database port
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    dbname: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long, env = "PGPASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// TLS mode (disable, allow, prefer, require, verify-ca, verify-full)
    #[arg(long)]
    sslmode: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    Csv,
    Spreadsheet,
}

impl From<InputFormat> for SourceKind {
    fn from(val: InputFormat) -> Self {
        match val {
            InputFormat::Csv => SourceKind::Delimited,
            InputFormat::Spreadsheet => SourceKind::Spreadsheet,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    order_desk::logging::init(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<(), ImportError> {
    let table = match (&args.columns, TableSpec::preset(&args.table)) {
        (Some(columns), _) => TableSpec::new(args.table.clone(), columns.iter().cloned())?,
        (None, Some(preset)) => preset,
        (None, None) => {
            return Err(ImportError::InvalidIdentifier(format!(
                "{} (unknown table; pass --columns)",
                args.table
            )));
        }
    };

    let source = build_source(&args, &table)?;
    source.ensure_exists()?;

    let mut cfg = Config::load()?;
    apply_overrides(&mut cfg, &args);
    let database = cfg.database.target()?;

    info!(
        path = %source.path().display(),
        kind = ?source.kind(),
        table = %table.name(),
        "starting import"
    );

    let job = ImportJob::new(source, table);
    let report = run_import(&job, &database, cfg.database.connect_timeout()).await?;
    info!(
        "Inserted {} rows from {} into the {} table",
        report.inserted,
        job.source.path().display(),
        report.table
    );
    Ok(())
}

fn apply_overrides(cfg: &mut Config, args: &Args) {
    let db = &mut cfg.database;
    if args.database_url.is_some() {
        db.url = args.database_url.clone();
    }
    if args.host.is_some() {
        db.host = args.host.clone();
    }
    if let Some(port) = args.port {
        db.port = port;
    }
    if args.dbname.is_some() {
        db.dbname = args.dbname.clone();
    }
    if args.user.is_some() {
        db.user = args.user.clone();
    }
    if args.password.is_some() {
        db.password = args.password.clone();
    }
    if let Some(mode) = &args.sslmode {
        db.sslmode = mode.clone();
    }
}

fn build_source(args: &Args, table: &TableSpec) -> Result<TabularSource, ImportError> {
    let requested = args.format.map(SourceKind::from);

    let path = if args.file.is_dir() {
        let spreadsheet = requested == Some(SourceKind::Spreadsheet);
        let name = table
            .default_file(spreadsheet)
            .ok_or_else(|| ImportError::NotFound(args.file.clone()))?;
        args.file.join(name)
    } else {
        args.file.clone()
    };

    let kind = requested.unwrap_or_else(|| SourceKind::from_path(&path));
    Ok(match kind {
        SourceKind::Delimited => TabularSource::Delimited {
            path,
            headers: if args.trim_headers {
                HeaderPolicy::Trim
            } else {
                HeaderPolicy::Exact
            },
        },
        SourceKind::Spreadsheet => {
            let sheet = args.sheet.clone().unwrap_or_else(|| table.name().to_string());
            TabularSource::spreadsheet(path, sheet)
        }
    })
}

use crate::error::ImportError;
use crate::importer::record::{FieldValue, RawRow};
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Spreadsheet,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Self {
        let is_spreadsheet = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                SPREADSHEET_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            == Some(true);
        if is_spreadsheet {
            SourceKind::Spreadsheet
        } else {
            SourceKind::Delimited
        }
    }
}

/// How header names are matched against the table's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// Use header cells as written.
    Exact,
    /// Strip leading and trailing whitespace first.
    Trim,
}

/// A tabular input file. Spreadsheet headers are always trimmed; delimited
/// headers are taken as written unless [`HeaderPolicy::Trim`] is asked for.
#[derive(Debug, Clone)]
pub enum TabularSource {
    Delimited {
        path: PathBuf,
        headers: HeaderPolicy,
    },
    Spreadsheet {
        path: PathBuf,
        sheet: String,
    },
}

impl TabularSource {
    pub fn delimited(path: impl Into<PathBuf>) -> Self {
        TabularSource::Delimited {
            path: path.into(),
            headers: HeaderPolicy::Exact,
        }
    }

    pub fn spreadsheet(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        TabularSource::Spreadsheet {
            path: path.into(),
            sheet: sheet.into(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TabularSource::Delimited { path, .. } | TabularSource::Spreadsheet { path, .. } => {
                path
            }
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            TabularSource::Delimited { .. } => SourceKind::Delimited,
            TabularSource::Spreadsheet { .. } => SourceKind::Spreadsheet,
        }
    }

    /// `NotFound` unless the path names an existing file.
    pub fn ensure_exists(&self) -> Result<(), ImportError> {
        let path = self.path();
        if path.is_file() {
            Ok(())
        } else {
            Err(ImportError::NotFound(path.to_path_buf()))
        }
    }

    /// Parse the whole file. Fails with `NotFound` before opening anything
    /// when the path does not exist.
    pub fn read_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        self.ensure_exists()?;
        let path = self.path();
        let rows = match self {
            TabularSource::Delimited { path, headers } => read_delimited(path, *headers)?,
            TabularSource::Spreadsheet { path, sheet } => read_spreadsheet(path, sheet)?,
        };
        debug!(path = %path.display(), rows = rows.len(), "parsed input file");
        Ok(rows)
    }
}

fn read_delimited(path: &Path, policy: HeaderPolicy) -> Result<Vec<RawRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| match policy {
            HeaderPolicy::Exact => h.to_string(),
            HeaderPolicy::Trim => h.trim().to_string(),
        })
        .collect();

    if policy == HeaderPolicy::Exact {
        for header in headers.iter().filter(|h| h.trim() != h.as_str()) {
            warn!(
                path = %path.display(),
                header = ?header,
                "delimited header has surrounding whitespace and will not match a column; pass --trim-headers to strip it"
            );
        }
    }

    reader
        .records()
        .enumerate()
        .map(|(i, record)| -> Result<RawRow, ImportError> {
            let record = record?;
            // Short rows simply lack the trailing keys and fail validation later.
            let fields = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), FieldValue::infer(v)))
                .collect::<HashMap<_, _>>();
            Ok(RawRow {
                index: i + 1,
                fields,
            })
        })
        .collect()
}

fn read_spreadsheet(path: &Path, sheet: &str) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(ImportError::SheetNotFound {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
        });
    }
    let range = workbook.worksheet_range(sheet)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    Ok(rows
        .enumerate()
        .map(|(i, cells)| {
            let fields = headers
                .iter()
                .zip(cells.iter())
                .map(|(h, cell)| (h.clone(), cell_value(cell)))
                .collect::<HashMap<_, _>>();
            RawRow {
                index: i + 1,
                fields,
            }
        })
        .collect())
}

fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty => FieldValue::Null,
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::Int(i) => FieldValue::Integer(*i),
        Data::Float(f) => FieldValue::from_number(*f),
        Data::String(s) => FieldValue::Text(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(FieldValue::from_datetime)
            .unwrap_or_else(|| FieldValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => FieldValue::infer(s),
        other => FieldValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_extension() {
        assert_eq!(
            SourceKind::from_path(Path::new("customers-data.xlsx")),
            SourceKind::Spreadsheet
        );
        assert_eq!(
            SourceKind::from_path(Path::new("PRODUCTS.ODS")),
            SourceKind::Spreadsheet
        );
        assert_eq!(
            SourceKind::from_path(Path::new("products.csv")),
            SourceKind::Delimited
        );
        assert_eq!(
            SourceKind::from_path(Path::new("no_extension")),
            SourceKind::Delimited
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let source = TabularSource::delimited("/definitely/not/here.csv");
        assert!(matches!(source.read_rows(), Err(ImportError::NotFound(_))));

        let source = TabularSource::spreadsheet("/definitely/not/here.xlsx", "customers");
        assert!(matches!(source.read_rows(), Err(ImportError::NotFound(_))));
    }

    #[test]
    fn directory_is_not_an_input_file() {
        let dir = std::env::temp_dir();
        let source = TabularSource::delimited(&dir);
        assert!(matches!(source.ensure_exists(), Err(ImportError::NotFound(_))));
    }

    #[test]
    fn spreadsheet_cells_map_to_values() {
        assert_eq!(cell_value(&Data::Empty), FieldValue::Null);
        assert_eq!(cell_value(&Data::Float(3.0)), FieldValue::Integer(3));
        assert_eq!(
            cell_value(&Data::String("1990-01-01".into())),
            FieldValue::Text("1990-01-01".into())
        );
        assert_eq!(
            cell_value(&Data::DateTimeIso("1990-01-01".into())),
            FieldValue::infer("1990-01-01")
        );
    }
}

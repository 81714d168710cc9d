use crate::error::ImportError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::fmt;

/// One scalar cell as read from the input file.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    /// Type a raw text cell the way a dataframe reader would: empty is null,
    /// then bool, integer, float, ISO date, ISO datetime, else text.
    /// Zero-padded numbers (`"007"`, postcodes) stay text so the padding survives.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return FieldValue::Null;
        }
        if raw.eq_ignore_ascii_case("true") {
            return FieldValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return FieldValue::Bool(false);
        }
        if is_zero_padded(raw) {
            return FieldValue::Text(raw.to_string());
        }
        if let Ok(i) = raw.parse::<i64>() {
            return FieldValue::Integer(i);
        }
        // `parse::<f64>` also accepts "inf" and "NaN"; those stay text.
        if let Ok(f) = raw.parse::<f64>()
            && f.is_finite()
            && raw.bytes().any(|b| b.is_ascii_digit())
        {
            return FieldValue::Float(f);
        }
        if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return FieldValue::Date(d);
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return FieldValue::DateTime(dt);
            }
        }
        FieldValue::Text(raw.to_string())
    }

    /// Whole-valued floats become integers, as spreadsheets store every number as a float.
    pub fn from_number(f: f64) -> Self {
        if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
            FieldValue::Integer(f as i64)
        } else {
            FieldValue::Float(f)
        }
    }

    /// Midnight timestamps are plain dates.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        if dt.time() == NaiveTime::MIN {
            FieldValue::Date(dt.date())
        } else {
            FieldValue::DateTime(dt)
        }
    }
}

fn is_zero_padded(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw).as_bytes();
    matches!(digits, [b'0', next, ..] if next.is_ascii_digit())
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Date(d) => write!(f, "{d}"),
            FieldValue::DateTime(dt) => write!(f, "{dt}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed row before validation: header name -> value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based position among the data rows (header excluded).
    pub index: usize,
    pub fields: HashMap<String, FieldValue>,
}

/// A row that carries every required column, values in declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    index: usize,
    values: Vec<FieldValue>,
}

impl RecordRow {
    pub fn from_raw(mut raw: RawRow, spec: &TableSpec) -> Result<Self, ImportError> {
        let values = spec
            .columns()
            .iter()
            .map(|column| {
                raw.fields
                    .remove(column)
                    .ok_or_else(|| ImportError::MissingField {
                        row: raw.index,
                        field: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index: raw.index,
            values,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

/// Target table plus the columns every row must supply, in insert order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    columns: Vec<String>,
}

/// Built-in tables and the file names their loaders read by default.
struct Preset {
    table: &'static str,
    columns: &'static [&'static str],
    csv_file: &'static str,
    spreadsheet_file: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        table: "customers",
        columns: &[
            "id",
            "first_name",
            "last_name",
            "gender",
            "date_of_birth",
            "age",
            "email",
            "phone",
            "post_address",
            "membership",
        ],
        csv_file: "customers-data-csv.csv",
        spreadsheet_file: "customers-data.xlsx",
    },
    Preset {
        table: "products",
        columns: &[
            "id",
            "product_name",
            "price",
            "category",
            "brand",
            "product_description",
        ],
        csv_file: "products.csv",
        spreadsheet_file: "products-data.xlsx",
    },
];

impl TableSpec {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        validate_identifier(&name)?;
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(ImportError::InvalidIdentifier(format!("{name}()")));
        }
        for column in &columns {
            validate_identifier(column)?;
        }
        Ok(Self { name, columns })
    }

    /// One of the built-in tables (`customers`, `products`).
    pub fn preset(name: &str) -> Option<Self> {
        PRESETS.iter().find(|p| p.table == name).map(|p| Self {
            name: p.table.to_string(),
            columns: p.columns.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub fn customers() -> Self {
        Self::preset("customers").expect("built-in preset")
    }

    pub fn products() -> Self {
        Self::preset("products").expect("built-in preset")
    }

    /// Default input file name for a built-in table.
    pub fn default_file(&self, spreadsheet: bool) -> Option<&'static str> {
        PRESETS
            .iter()
            .find(|p| p.table == self.name)
            .map(|p| if spreadsheet { p.spreadsheet_file } else { p.csv_file })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `INSERT INTO t (a, b) VALUES (<p1>, <p2>)` with backend-specific placeholders.
    pub fn insert_statement(&self, placeholder: impl Fn(usize, &str) -> String) -> InsertStatement {
        let columns = self.columns.join(", ");
        let params = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| placeholder(i + 1, c))
            .collect::<Vec<_>>()
            .join(", ");
        InsertStatement {
            sql: format!("INSERT INTO {} ({columns}) VALUES ({params})", self.name),
            arity: self.columns.len(),
        }
    }
}

/// Table and column names go into the statement text, so only plain
/// identifiers are accepted.
fn validate_identifier(ident: &str) -> Result<(), ImportError> {
    let mut chars = ident.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ImportError::InvalidIdentifier(ident.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    sql: String,
    arity: usize,
}

impl InsertStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Every row of one input file, validated against one table.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    spec: TableSpec,
    rows: Vec<RecordRow>,
}

impl ImportBatch {
    /// Validate all rows up front; the first row missing a column fails the batch.
    pub fn validate(spec: TableSpec, raw_rows: Vec<RawRow>) -> Result<Self, ImportError> {
        let rows = raw_rows
            .into_iter()
            .map(|raw| RecordRow::from_raw(raw, &spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { spec, rows })
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn rows(&self) -> &[RecordRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(index: usize, pairs: &[(&str, &str)]) -> RawRow {
        RawRow {
            index,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), FieldValue::infer(v)))
                .collect(),
        }
    }

    #[test]
    fn zero_padded_numbers_keep_their_digits() {
        assert_eq!(FieldValue::infer("007"), FieldValue::Text("007".into()));
        assert_eq!(FieldValue::infer("02134"), FieldValue::Text("02134".into()));
        assert_eq!(FieldValue::infer("-01"), FieldValue::Text("-01".into()));
        assert_eq!(FieldValue::infer("00.5"), FieldValue::Text("00.5".into()));
    }

    #[test]
    fn infer_types_cells() {
        assert_eq!(FieldValue::infer(""), FieldValue::Null);
        assert_eq!(FieldValue::infer("34"), FieldValue::Integer(34));
        assert_eq!(FieldValue::infer("-7"), FieldValue::Integer(-7));
        assert_eq!(FieldValue::infer("19.99"), FieldValue::Float(19.99));
        assert_eq!(FieldValue::infer("TRUE"), FieldValue::Bool(true));
        assert_eq!(
            FieldValue::infer("1990-01-01"),
            FieldValue::Date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
        );
        assert_eq!(
            FieldValue::infer("2025-03-27 10:30:00"),
            FieldValue::DateTime(
                NaiveDate::from_ymd_opt(2025, 3, 27)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            FieldValue::infer("555-1234"),
            FieldValue::Text("555-1234".into())
        );
        assert_eq!(FieldValue::infer("NaN"), FieldValue::Text("NaN".into()));
        assert_eq!(FieldValue::infer("0"), FieldValue::Integer(0));
        assert_eq!(FieldValue::infer("0.5"), FieldValue::Float(0.5));
        assert_eq!(FieldValue::infer("inf"), FieldValue::Text("inf".into()));
    }

    #[test]
    fn cells_keep_surrounding_whitespace() {
        assert_eq!(FieldValue::infer(" gold"), FieldValue::Text(" gold".into()));
    }

    #[test]
    fn spreadsheet_numbers_and_dates_normalize() {
        assert_eq!(FieldValue::from_number(34.0), FieldValue::Integer(34));
        assert_eq!(FieldValue::from_number(2.5), FieldValue::Float(2.5));
        let midnight = NaiveDate::from_ymd_opt(1990, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            FieldValue::from_datetime(midnight),
            FieldValue::Date(midnight.date())
        );
    }

    #[test]
    fn record_row_orders_values_by_declared_columns() {
        let spec = TableSpec::new("t", ["b", "a"]).unwrap();
        let row = RecordRow::from_raw(raw(1, &[("a", "1"), ("b", "x"), ("extra", "y")]), &spec)
            .unwrap();
        assert_eq!(
            row.values(),
            &[FieldValue::Text("x".into()), FieldValue::Integer(1)]
        );
    }

    #[test]
    fn missing_column_names_row_and_field() {
        let spec = TableSpec::products();
        let rows = vec![
            raw(
                1,
                &[
                    ("id", "1"),
                    ("product_name", "Lamp"),
                    ("price", "19.99"),
                    ("category", "home"),
                    ("brand", "Acme"),
                    ("product_description", "desk lamp"),
                ],
            ),
            raw(2, &[("id", "2"), ("product_name", "Mug")]),
        ];
        let err = ImportBatch::validate(spec, rows).unwrap_err();
        match err {
            ImportError::MissingField { row, field } => {
                assert_eq!(row, 2);
                assert_eq!(field, "price");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(TableSpec::new("customers", ["id"]).is_ok());
        assert!(matches!(
            TableSpec::new("customers; drop table x", ["id"]),
            Err(ImportError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            TableSpec::new("t", ["id", "first name"]),
            Err(ImportError::InvalidIdentifier(_))
        ));
        assert!(TableSpec::new("t", Vec::<String>::new()).is_err());
    }

    #[test]
    fn statement_lists_columns_in_order() {
        let stmt = TableSpec::products().insert_statement(|i, _| format!("${i}"));
        assert_eq!(
            stmt.sql(),
            "INSERT INTO products (id, product_name, price, category, brand, product_description) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        assert_eq!(stmt.arity(), 6);
    }

    #[test]
    fn presets_know_their_input_files() {
        let customers = TableSpec::customers();
        assert_eq!(customers.columns().len(), 10);
        assert_eq!(customers.default_file(false), Some("customers-data-csv.csv"));
        assert_eq!(customers.default_file(true), Some("customers-data.xlsx"));
        assert_eq!(TableSpec::preset("orders"), None);
    }
}

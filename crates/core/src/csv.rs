//! RFC 4180 CSV writing and parsing.
//!
//! Every export (orders, customers, stock, products, analytics) is described
//! by a list of [`CsvColumn`]s: a header label, an extractor that pulls a
//! [`CsvCell`] out of a row, and a [`CsvFormat`] that decides how the cell is
//! rendered. Imports go through [`CsvTable::parse`], which reads the header
//! row and lets callers look fields up by label.
//!
//! Quoting rules: a field is quoted when it contains a comma, a double quote,
//! CR or LF; inner quotes are doubled. Records end with CRLF. A record made of
//! a single empty field is written as `""` so it survives a round trip
//! instead of turning into a blank line.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::money::round_money;

/// Errors produced while parsing CSV input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    /// A quoted field was still open at end of input.
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote {
        /// Line where the input ended.
        line: usize,
    },
    /// A quote appeared inside an unquoted field, or text followed a closing quote.
    #[error("unexpected quote or character after quote on line {line}")]
    MisplacedQuote {
        /// Offending line.
        line: usize,
    },
    /// The input has no header row.
    #[error("CSV input is empty")]
    Empty,
    /// A column required by the importer is missing from the header row.
    #[error("missing required column: {0}")]
    MissingColumn(String),
    /// A required field is empty in a data row.
    #[error("missing value for {0}")]
    MissingValue(String),
    /// A field could not be converted to the expected type.
    #[error("invalid value for {column}: {value:?}")]
    InvalidValue {
        /// Column label.
        column: String,
        /// Raw field value.
        value: String,
    },
}

// =============================================================================
// Writing
// =============================================================================

/// A typed cell value produced by a column extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvCell {
    /// Free text.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Exact decimal (prices, totals).
    Decimal(Decimal),
    /// Timestamp.
    DateTime(DateTime<Utc>),
    /// Boolean flag.
    Bool(bool),
    /// No value.
    Empty,
}

impl From<String> for CsvCell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CsvCell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for CsvCell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for CsvCell {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Decimal> for CsvCell {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<DateTime<Utc>> for CsvCell {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<bool> for CsvCell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for CsvCell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// How a cell is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvFormat {
    /// Natural representation.
    #[default]
    Plain,
    /// Decimals rounded to exactly two places.
    Currency,
    /// Timestamps as `YYYY-MM-DD`.
    Date,
    /// Timestamps as `YYYY-MM-DD HH:MM:SS` (UTC).
    DateTime,
}

impl CsvFormat {
    /// Render a cell.
    #[must_use]
    pub fn render(self, cell: &CsvCell) -> String {
        match (cell, self) {
            (CsvCell::Text(s), _) => s.clone(),
            (CsvCell::Integer(i), _) => i.to_string(),
            (CsvCell::Decimal(d), Self::Currency) => format!("{:.2}", round_money(*d)),
            (CsvCell::Decimal(d), _) => d.normalize().to_string(),
            (CsvCell::DateTime(dt), Self::Date) => dt.format("%Y-%m-%d").to_string(),
            (CsvCell::DateTime(dt), Self::Plain | Self::Currency) => dt.to_rfc3339(),
            (CsvCell::DateTime(dt), Self::DateTime) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            (CsvCell::Bool(b), _) => b.to_string(),
            (CsvCell::Empty, _) => String::new(),
        }
    }
}

/// One column of an export: header label, extractor, formatter.
pub struct CsvColumn<T> {
    label: &'static str,
    extract: fn(&T) -> CsvCell,
    format: CsvFormat,
}

impl<T> CsvColumn<T> {
    /// A plain column.
    #[must_use]
    pub const fn new(label: &'static str, extract: fn(&T) -> CsvCell) -> Self {
        Self {
            label,
            extract,
            format: CsvFormat::Plain,
        }
    }

    /// A column rendered as money.
    #[must_use]
    pub const fn currency(label: &'static str, extract: fn(&T) -> CsvCell) -> Self {
        Self {
            label,
            extract,
            format: CsvFormat::Currency,
        }
    }

    /// A column rendered as a calendar date.
    #[must_use]
    pub const fn date(label: &'static str, extract: fn(&T) -> CsvCell) -> Self {
        Self {
            label,
            extract,
            format: CsvFormat::Date,
        }
    }

    /// A column rendered as a full timestamp.
    #[must_use]
    pub const fn datetime(label: &'static str, extract: fn(&T) -> CsvCell) -> Self {
        Self {
            label,
            extract,
            format: CsvFormat::DateTime,
        }
    }

    /// Header label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Render this column for a row.
    #[must_use]
    pub fn render(&self, row: &T) -> String {
        self.format.render(&(self.extract)(row))
    }
}

/// Quote a field if it needs quoting.
#[must_use]
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Append one record (with trailing CRLF) to `out`.
pub fn write_record<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let fields: Vec<S> = fields.into_iter().collect();
    if let [only] = fields.as_slice()
        && only.as_ref().is_empty()
    {
        out.push_str("\"\"\r\n");
        return;
    }
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(field.as_ref()));
    }
    out.push_str("\r\n");
}

/// Render rows as a CSV document with a header row.
#[must_use]
pub fn to_csv<T>(rows: &[T], columns: &[CsvColumn<T>]) -> String {
    let mut out = String::new();
    write_record(&mut out, columns.iter().map(CsvColumn::label));
    for row in rows {
        write_record(&mut out, columns.iter().map(|c| c.render(row)));
    }
    out
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse CSV text into records.
///
/// Accepts CRLF or LF line endings, a leading UTF-8 BOM, quoted fields with
/// doubled quotes and embedded newlines. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`CsvError::UnterminatedQuote`] or [`CsvError::MisplacedQuote`]
/// for malformed quoting.
pub fn parse(input: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut closed_quote = false;
    let mut line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => {
                    in_quotes = false;
                    closed_quote = true;
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                record.push(std::mem::take(&mut field));
                was_quoted = false;
                closed_quote = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                let blank = record.is_empty() && field.is_empty() && !was_quoted;
                if !blank {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                was_quoted = false;
                closed_quote = false;
                line += 1;
            }
            '"' if field.is_empty() && !was_quoted => {
                in_quotes = true;
                was_quoted = true;
            }
            '"' => return Err(CsvError::MisplacedQuote { line }),
            _ if closed_quote => return Err(CsvError::MisplacedQuote { line }),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line });
    }
    if !record.is_empty() || !field.is_empty() || was_quoted {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// A parsed CSV document with a header row.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse a document whose first record is the header row.
    ///
    /// Header lookups are case-insensitive and ignore surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Empty`] when there is no header row, or any
    /// error from [`parse`].
    pub fn parse(input: &str) -> Result<Self, CsvError> {
        let mut records = parse(input)?.into_iter();
        let headers = records.next().ok_or(CsvError::Empty)?;
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (normalize_header(h), i))
            .collect();
        Ok(Self {
            headers,
            index,
            rows: records.collect(),
        })
    }

    /// Header labels as written in the file.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Fail unless every label is present in the header row.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::MissingColumn`] naming the first absent label.
    pub fn require_columns(&self, labels: &[&str]) -> Result<(), CsvError> {
        match labels
            .iter()
            .find(|l| !self.index.contains_key(&normalize_header(l)))
        {
            Some(missing) => Err(CsvError::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }

    /// Iterate data rows. Row numbers are 1-based and count the header as row 1,
    /// matching what a spreadsheet shows.
    pub fn records(&self) -> impl Iterator<Item = (usize, CsvRecord<'_>)> {
        self.rows.iter().enumerate().map(move |(i, fields)| {
            (
                i + 2,
                CsvRecord {
                    index: &self.index,
                    fields,
                },
            )
        })
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One data row of a [`CsvTable`].
#[derive(Debug, Clone, Copy)]
pub struct CsvRecord<'a> {
    index: &'a HashMap<String, usize>,
    fields: &'a [String],
}

impl CsvRecord<'_> {
    /// Trimmed value for a column, or `None` when the column is absent or blank.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        let i = *self.index.get(&normalize_header(label))?;
        self.fields
            .get(i)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Value for a column that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::MissingValue`] when blank or absent.
    pub fn require(&self, label: &str) -> Result<&str, CsvError> {
        self.get(label)
            .ok_or_else(|| CsvError::MissingValue(label.to_string()))
    }

    /// Parse an optional column with `FromStr`.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::InvalidValue`] when present but unparseable.
    pub fn parse_opt<T: std::str::FromStr>(&self, label: &str) -> Result<Option<T>, CsvError> {
        self.get(label)
            .map(|raw| {
                raw.parse().map_err(|_| CsvError::InvalidValue {
                    column: label.to_string(),
                    value: raw.to_string(),
                })
            })
            .transpose()
    }

    /// Parse a required column with `FromStr`.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::MissingValue`] or [`CsvError::InvalidValue`].
    pub fn parse_required<T: std::str::FromStr>(&self, label: &str) -> Result<T, CsvError> {
        self.parse_opt(label)?
            .ok_or_else(|| CsvError::MissingValue(label.to_string()))
    }

    /// Parse an optional boolean column (`true/false`, `yes/no`, `1/0`).
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::InvalidValue`] for anything else.
    pub fn parse_bool(&self, label: &str) -> Result<Option<bool>, CsvError> {
        self.get(label)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(true),
                "false" | "no" | "n" | "0" => Ok(false),
                _ => Err(CsvError::InvalidValue {
                    column: label.to_string(),
                    value: raw.to_string(),
                }),
            })
            .transpose()
    }

    /// Parse an optional `YYYY-MM-DD` column.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::InvalidValue`] for malformed dates.
    pub fn parse_date(&self, label: &str) -> Result<Option<NaiveDate>, CsvError> {
        self.get(label)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| CsvError::InvalidValue {
                    column: label.to_string(),
                    value: raw.to_string(),
                })
            })
            .transpose()
    }
}

fn normalize_header(label: &str) -> String {
    label.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    struct Line {
        sku: &'static str,
        name: &'static str,
        price: Decimal,
        qty: i32,
        at: DateTime<Utc>,
        note: Option<&'static str>,
    }

    fn columns() -> Vec<CsvColumn<Line>> {
        vec![
            CsvColumn::new("SKU", |l: &Line| l.sku.into()),
            CsvColumn::new("Name", |l: &Line| l.name.into()),
            CsvColumn::currency("Price", |l: &Line| l.price.into()),
            CsvColumn::new("Quantity", |l: &Line| l.qty.into()),
            CsvColumn::date("Date", |l: &Line| l.at.into()),
            CsvColumn::new("Note", |l: &Line| l.note.into()),
        ]
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_to_csv_formats_columns() {
        let rows = vec![Line {
            sku: "TS-01",
            name: "Tee, \"Classic\"",
            price: Decimal::new(4995, 2),
            qty: 3,
            at: Utc.with_ymd_and_hms(2025, 3, 9, 14, 0, 0).unwrap(),
            note: None,
        }];
        let csv = to_csv(&rows, &columns());
        assert_eq!(
            csv,
            "SKU,Name,Price,Quantity,Date,Note\r\n\
             TS-01,\"Tee, \"\"Classic\"\"\",49.95,3,2025-03-09,\r\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_awkward_fields() {
        let rows = vec![
            vec!["comma, inside".to_string(), "quote \" inside".to_string()],
            vec!["multi\r\nline".to_string(), String::new()],
            vec![String::new()],
            vec!["  padded  ".to_string(), "\"".to_string()],
        ];
        let mut out = String::new();
        for row in &rows {
            write_record(&mut out, row);
        }
        assert_eq!(parse(&out).unwrap(), rows);
    }

    #[test]
    fn test_parse_lf_bom_and_blank_lines() {
        let input = "\u{feff}a,b\n\n1,2\n3,\"x\ny\"";
        let records = parse(input).unwrap();
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["1".to_string(), "2".to_string()],
                vec!["3".to_string(), "x\ny".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_quoting() {
        assert_eq!(
            parse("a,\"open\n"),
            Err(CsvError::UnterminatedQuote { line: 2 })
        );
        assert_eq!(parse("ab\"c\n"), Err(CsvError::MisplacedQuote { line: 1 }));
        assert_eq!(
            parse("x\n\"done\" trailing\n"),
            Err(CsvError::MisplacedQuote { line: 2 })
        );
    }

    #[test]
    fn test_table_lookup_by_header() {
        let table = CsvTable::parse(" SKU ,Quantity,Active,Restock\nTS-01, 12 ,yes,2025-01-31\nTS-02,,no,\n").unwrap();
        assert_eq!(table.len(), 2);
        table.require_columns(&["sku", "QUANTITY"]).unwrap();
        assert_eq!(
            table.require_columns(&["Price"]),
            Err(CsvError::MissingColumn("Price".to_string()))
        );

        let rows: Vec<_> = table.records().collect();
        let (row_no, first) = rows[0];
        assert_eq!(row_no, 2);
        assert_eq!(first.require("sku").unwrap(), "TS-01");
        assert_eq!(first.parse_required::<i32>("Quantity").unwrap(), 12);
        assert_eq!(first.parse_bool("Active").unwrap(), Some(true));
        assert_eq!(
            first.parse_date("Restock").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31)
        );

        let (_, second) = rows[1];
        assert_eq!(second.parse_opt::<i32>("Quantity").unwrap(), None);
        assert_eq!(
            second.parse_required::<i32>("Quantity"),
            Err(CsvError::MissingValue("Quantity".to_string()))
        );
        assert_eq!(second.get("Restock"), None);
    }

    #[test]
    fn test_table_requires_header() {
        assert!(matches!(CsvTable::parse("\n\n"), Err(CsvError::Empty)));
    }
}

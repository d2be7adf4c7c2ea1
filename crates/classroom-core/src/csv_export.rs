//! Spreadsheet-safe CSV rendering.
//!
//! Output starts with a UTF-8 byte-order mark, every header and cell is
//! neutralized against formula injection, and fields that would break
//! quoting are wrapped in double quotes. Lines are joined with `\n` and the
//! payload has no trailing newline.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;

/// UTF-8 byte-order mark.
pub const BOM: char = '\u{FEFF}';

/// Leading characters a spreadsheet would evaluate as a formula.
const FORMULA_TRIGGERS: &[char] = &['=', '+', '-', '@', '\t', '\r'];

/// Characters that force the field to be quoted.
const QUOTE_TRIGGERS: &[char] = &[',', '"', '\n', '\r', '\''];

/// One output column: `key` is looked up in each row, `header` is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumn {
    pub key: String,
    pub header: String,
}

impl CsvColumn {
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
        }
    }
}

/// A row that can be rendered by [`to_csv`].
pub trait CsvRecord {
    /// Value for `key`, or `None` when missing.
    fn field(&self, key: &str) -> Option<String>;
}

impl CsvRecord for serde_json::Map<String, Value> {
    fn field(&self, key: &str) -> Option<String> {
        self.get(key).and_then(render_value)
    }
}

impl CsvRecord for Value {
    fn field(&self, key: &str) -> Option<String> {
        self.as_object().and_then(|obj| obj.field(key))
    }
}

impl CsvRecord for HashMap<String, String> {
    fn field(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(render_number(n)),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Integral floats print without a fractional part (`17.0` becomes `17`).
fn render_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Escape a single header or cell.
///
/// The quoting decision is made on the value as given; the formula guard
/// prefix does not by itself force quoting.
pub fn escape_field(value: &str) -> String {
    let needs_quoting = value.contains(QUOTE_TRIGGERS);

    let mut field = String::with_capacity(value.len() + 3);
    if value.starts_with(FORMULA_TRIGGERS) {
        field.push('\'');
    }
    field.push_str(value);

    if needs_quoting {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

/// Render `rows` as CSV using `columns` for ordering and headers.
pub fn to_csv<R: CsvRecord>(rows: &[R], columns: &[CsvColumn]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);

    lines.push(
        columns
            .iter()
            .map(|c| escape_field(&c.header))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        lines.push(
            columns
                .iter()
                .map(|c| escape_field(&row.field(&c.key).unwrap_or_default()))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\n"));
    out
}

/// Render any serializable rows; each row must serialize to a JSON object.
pub fn to_csv_serialized<T: Serialize>(rows: &[T], columns: &[CsvColumn]) -> AppResult<String> {
    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(to_csv(&values, columns))
}

/// Download file name: unsafe characters become `-`, `.csv` is appended.
pub fn csv_filename(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "export.csv".to_string()
    } else {
        format!("{}.csv", stem)
    }
}

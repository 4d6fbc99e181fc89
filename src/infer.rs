//! Column typing from sampled rows.
//!
//! Types are decided once, from the sample, and held fixed for the whole
//! load. A later row whose value cannot be coerced into the sampled type
//! fails its batch at load time; that is accepted behavior, not something
//! this module papers over.

use chrono::{NaiveDate, NaiveDateTime};

use crate::source::{Cell, Row};

/// The closed set of column types the target table can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    DoublePrecision,
    Timestamp,
    Text,
}

impl SqlType {
    /// DDL spelling of the type.
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Text => "TEXT",
        }
    }
}

/// A target column: sanitized identifier plus inferred type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
}

/// Derive one [`ColumnSpec`] per header column from the sampled rows.
///
/// Classification per non-null value: integral numerics map to INTEGER,
/// other numerics to DOUBLE PRECISION, datetime cells and date-like strings
/// to TIMESTAMP, everything else to TEXT. Values widen across the sample:
/// INTEGER and DOUBLE PRECISION combine to DOUBLE PRECISION, any other
/// disagreement falls back to TEXT. Columns that are entirely null in the
/// sample are TEXT. Deterministic: the same sample always yields the same
/// specs.
pub fn infer_columns(header: &[String], sample: &[Row]) -> Vec<ColumnSpec> {
    header
        .iter()
        .enumerate()
        .map(|(idx, raw_name)| {
            let sql_type = sample
                .iter()
                .filter_map(|row| row.cells.get(idx))
                .filter_map(classify)
                .reduce(widen)
                .unwrap_or(SqlType::Text);

            ColumnSpec {
                name: column_ident(raw_name, idx),
                sql_type,
            }
        })
        .collect()
}

fn classify(cell: &Cell) -> Option<SqlType> {
    match cell {
        Cell::Null => None,
        Cell::Int(_) => Some(SqlType::Integer),
        Cell::Float(f) => {
            if f.fract() == 0.0 {
                Some(SqlType::Integer)
            } else {
                Some(SqlType::DoublePrecision)
            }
        }
        Cell::Timestamp(_) => Some(SqlType::Timestamp),
        Cell::Bool(_) => Some(SqlType::Text),
        Cell::Text(s) => classify_text(s),
    }
}

fn classify_text(s: &str) -> Option<SqlType> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.parse::<i64>().is_ok() {
        return Some(SqlType::Integer);
    }
    if trimmed.parse::<f64>().is_ok_and(|v| v.is_finite()) {
        return Some(SqlType::DoublePrecision);
    }
    if parse_timestamp_text(trimmed).is_some() {
        return Some(SqlType::Timestamp);
    }
    Some(SqlType::Text)
}

/// Parse a date-like string deterministically: ISO date/datetime forms map
/// through chrono (date-only means midnight), anything else goes through
/// dateparser's broader format table.
pub fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    dateparser::parse(trimmed).ok().map(|ts| ts.naive_utc())
}

fn widen(a: SqlType, b: SqlType) -> SqlType {
    use SqlType::*;
    match (a, b) {
        _ if a == b => a,
        (Integer, DoublePrecision) | (DoublePrecision, Integer) => DoublePrecision,
        _ => Text,
    }
}

/// Turn a header cell into a safe SQL identifier: non-alphanumerics become
/// `_`, everything lowercased, a leading digit gets a `_` prefix, and empty
/// headers fall back to a positional `col_N` name.
pub fn column_ident(raw: &str, index: usize) -> String {
    let mut ident: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if ident.is_empty() {
        ident = format!("col_{}", index + 1);
    } else if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }

    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(cells: Vec<Cell>) -> Row {
        Row { number: 2, cells }
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_row_sample_classifies_each_column() {
        let sample = vec![row(vec![
            Cell::Float(1.0),
            Cell::Float(10.5),
            Cell::Text("2024-01-01".to_string()),
        ])];

        let specs = infer_columns(&header(&["id", "amount", "ts"]), &sample);

        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[1].sql_type, SqlType::DoublePrecision);
        assert_eq!(specs[2].sql_type, SqlType::Timestamp);
    }

    #[test]
    fn inference_is_deterministic() {
        let sample = vec![row(vec![
            Cell::Int(7),
            Cell::Text("maybe a date? no".to_string()),
        ])];
        let names = header(&["a", "b"]);

        assert_eq!(infer_columns(&names, &sample), infer_columns(&names, &sample));
    }

    #[test]
    fn integers_widen_to_double_across_the_sample() {
        let sample = vec![
            row(vec![Cell::Float(2.0)]),
            row(vec![Cell::Float(2.5)]),
            row(vec![Cell::Int(3)]),
        ];

        let specs = infer_columns(&header(&["n"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::DoublePrecision);
    }

    #[test]
    fn mixed_kinds_widen_to_text() {
        let sample = vec![
            row(vec![Cell::Int(1)]),
            row(vec![Cell::Text("n/a".to_string())]),
        ];

        let specs = infer_columns(&header(&["n"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::Text);
    }

    #[test]
    fn nulls_are_skipped_and_all_null_columns_are_text() {
        let sample = vec![
            row(vec![Cell::Null, Cell::Null]),
            row(vec![Cell::Int(4), Cell::Null]),
        ];

        let specs = infer_columns(&header(&["some", "none"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[1].sql_type, SqlType::Text);
    }

    #[test]
    fn native_datetime_cells_classify_as_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let sample = vec![row(vec![Cell::Timestamp(ts)])];

        let specs = infer_columns(&header(&["when"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::Timestamp);
    }

    #[test]
    fn numeric_strings_classify_before_dates() {
        let sample = vec![row(vec![
            Cell::Text("42".to_string()),
            Cell::Text("3.25".to_string()),
        ])];

        let specs = infer_columns(&header(&["a", "b"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::Integer);
        assert_eq!(specs[1].sql_type, SqlType::DoublePrecision);
    }

    #[test]
    fn booleans_classify_as_text() {
        let sample = vec![row(vec![Cell::Bool(true)])];
        let specs = infer_columns(&header(&["flag"]), &sample);
        assert_eq!(specs[0].sql_type, SqlType::Text);
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(column_ident("Order ID", 0), "order_id");
        assert_eq!(column_ident("amount ($)", 1), "amount____");
        assert_eq!(column_ident("2nd col", 2), "_2nd_col");
        assert_eq!(column_ident("", 3), "col_4");
        assert_eq!(column_ident("   ", 4), "col_5");
    }
}

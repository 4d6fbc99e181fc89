//! Row extraction from Excel workbooks.
//!
//! Wraps calamine behind a forward-only iterator: the header row is consumed
//! once at open time to fix column order and width, then data rows stream out
//! in source order. The decoder holds the sheet range in memory (that is its
//! contract); everything downstream of this module sees one row at a time.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDateTime;

use crate::error::DecodeError;

/// A single scalar value from the source, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Cell {
    /// Short kind name used in coercion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Bool(_) => "bool",
            Cell::Timestamp(_) => "timestamp",
            Cell::Text(_) => "text",
        }
    }

    /// Raw display form, used when reporting a value that failed coercion.
    pub fn display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// One data row: its 1-based sheet row number plus cells in header order.
///
/// Every row carries exactly the header's column count; the decoded range is
/// rectangular, so short rows come back padded with empty cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub number: usize,
    pub cells: Vec<Cell>,
}

/// Streaming row source over the first sheet of a workbook.
#[derive(Debug)]
pub struct ExcelSource {
    sheet: String,
    header: Vec<String>,
    range: calamine::Range<Data>,
    next_row: usize,
    width: usize,
}

impl ExcelSource {
    /// Open a workbook (format auto-detected), select the first sheet and
    /// consume its header row.
    ///
    /// Fails with [`DecodeError`] when the file cannot be decoded, the
    /// workbook has no sheets, or no header row exists.
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let started = Instant::now();

        let mut workbook = open_workbook_auto(path).map_err(|source| DecodeError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| DecodeError::NoSheets {
                path: path.to_path_buf(),
            })?;

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|source| DecodeError::Workbook {
                path: path.to_path_buf(),
                source,
            })?;

        // First non-empty row is the header; an entirely empty sheet has none.
        let header_idx = range
            .rows()
            .position(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
            .ok_or_else(|| DecodeError::MissingHeader {
                sheet: sheet.clone(),
            })?;

        let width = range.width();
        let header: Vec<String> = (0..width)
            .map(|col| header_cell_to_string(range.get((header_idx, col)).unwrap_or(&Data::Empty)))
            .collect();

        let source = Self {
            sheet,
            header,
            next_row: header_idx + 1,
            width,
            range,
        };

        log::info!(
            "decoded sheet '{}' in {:.2}s: {} columns, {} data rows",
            source.sheet,
            started.elapsed().as_secs_f64(),
            source.width,
            source.remaining()
        );

        Ok(source)
    }

    /// Column names exactly as they appear in the header row.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows not yet yielded.
    pub fn remaining(&self) -> usize {
        self.range.height().saturating_sub(self.next_row)
    }
}

impl Iterator for ExcelSource {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.next_row >= self.range.height() {
            return None;
        }

        let idx = self.next_row;
        self.next_row += 1;

        let cells = (0..self.width)
            .map(|col| convert_cell(self.range.get((idx, col)).unwrap_or(&Data::Empty)))
            .collect();

        Some(Row {
            number: idx + 1,
            cells,
        })
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Cell::Timestamp(ts),
            // Out-of-range serial date; keep the raw number rather than drop it.
            None => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match data.as_datetime() {
            Some(ts) => Cell::Timestamp(ts),
            None => Cell::Text(s.clone()),
        },
        Data::DurationIso(s) => Cell::Text(s.clone()),
        // Error cells (#DIV/0! and friends) surface as their display text so
        // they fail typed columns visibly instead of vanishing as NULL.
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

fn header_cell_to_string(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        other => other.to_string(),
    }
}

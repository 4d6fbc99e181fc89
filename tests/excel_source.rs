use std::path::PathBuf;

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use sheetload::infer::{infer_columns, SqlType};
use sheetload::source::{Cell, ExcelSource};

fn fixture_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(format!("{name}.xlsx"))
}

fn write_people_xlsx(path: &PathBuf) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();

    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();
    ws.write_string(0, 4, "joined").unwrap();

    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "Ada").unwrap();
    ws.write_number(1, 2, 98.5).unwrap();
    ws.write_boolean(1, 3, true).unwrap();
    ws.write_string(1, 4, "2024-01-01").unwrap();

    ws.write_number(2, 0, 2).unwrap();
    ws.write_string(2, 1, "Grace").unwrap();
    ws.write_number(2, 2, 87.25).unwrap();
    ws.write_boolean(2, 3, false).unwrap();
    ws.write_string(2, 4, "2024-01-02").unwrap();

    wb.save(path).unwrap();
}

#[test]
fn header_and_rows_stream_in_source_order() {
    let dir = TempDir::new().unwrap();
    let path = fixture_path(&dir, "people");
    write_people_xlsx(&path);

    let mut source = ExcelSource::open(&path).unwrap();
    assert_eq!(source.header(), ["id", "name", "score", "active", "joined"]);
    assert_eq!(source.remaining(), 2);

    let first = source.next().unwrap();
    assert_eq!(first.number, 2);
    assert_eq!(first.cells[0], Cell::Float(1.0));
    assert_eq!(first.cells[1], Cell::Text("Ada".to_string()));
    assert_eq!(first.cells[2], Cell::Float(98.5));
    assert_eq!(first.cells[3], Cell::Bool(true));
    assert_eq!(first.cells[4], Cell::Text("2024-01-01".to_string()));

    let second = source.next().unwrap();
    assert_eq!(second.number, 3);
    assert_eq!(second.cells[1], Cell::Text("Grace".to_string()));

    assert!(source.next().is_none());
    assert_eq!(source.remaining(), 0);
}

#[test]
fn first_row_sample_from_a_real_workbook_types_all_columns() {
    let dir = TempDir::new().unwrap();
    let path = fixture_path(&dir, "typed");
    write_people_xlsx(&path);

    let mut source = ExcelSource::open(&path).unwrap();
    let header = source.header().to_vec();
    let sample: Vec<_> = source.by_ref().take(1).collect();

    let specs = infer_columns(&header, &sample);
    let types: Vec<SqlType> = specs.iter().map(|s| s.sql_type).collect();
    assert_eq!(
        types,
        [
            SqlType::Integer,
            SqlType::Text,
            SqlType::DoublePrecision,
            SqlType::Text,
            SqlType::Timestamp,
        ]
    );
    assert_eq!(specs[4].name, "joined");
}

#[test]
fn workbook_without_rows_reports_missing_header() {
    let dir = TempDir::new().unwrap();
    let path = fixture_path(&dir, "empty");

    let mut wb = Workbook::new();
    wb.add_worksheet();
    wb.save(&path).unwrap();

    let err = ExcelSource::open(&path).unwrap_err();
    assert!(err.to_string().contains("no header row"));
}

#[test]
fn unreadable_file_reports_decode_failure() {
    let dir = TempDir::new().unwrap();
    let path = fixture_path(&dir, "garbage");
    std::fs::write(&path, b"this is not a workbook").unwrap();

    assert!(ExcelSource::open(&path).is_err());
}

#[test]
fn header_only_workbook_yields_no_rows() {
    let dir = TempDir::new().unwrap();
    let path = fixture_path(&dir, "header-only");

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    wb.save(&path).unwrap();

    let mut source = ExcelSource::open(&path).unwrap();
    assert_eq!(source.header(), ["id", "name"]);
    assert_eq!(source.remaining(), 0);
    assert!(source.next().is_none());
}

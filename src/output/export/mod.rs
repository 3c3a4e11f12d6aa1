//! Spreadsheet export sinks.

pub mod csv;
pub mod ods;
pub mod xls;

use indexmap::IndexMap;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ODS packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Ods,
    Xls,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "ods" => Some(ExportFormat::Ods),
            "xls" => Some(ExportFormat::Xls),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Ods => "ods",
            ExportFormat::Xls => "xls",
        }
    }
}

/// A column of the exported table: row key and header text.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: &'static str,
    pub header: &'static str,
}

/// One exported row, keyed by column key. Missing keys export as empty cells.
pub type ExportRow = IndexMap<&'static str, String>;

pub trait ExportSink {
    fn write_table(&mut self, columns: &[Column], rows: &[ExportRow]) -> Result<(), ExportError>;
}

/// Cell values of `row` in column order.
pub(crate) fn cells<'a>(columns: &[Column], row: &'a ExportRow) -> Vec<&'a str> {
    columns
        .iter()
        .map(|c| row.get(c.key).map(String::as_str).unwrap_or(""))
        .collect()
}

/// Default download name for a format.
pub fn file_name(format: ExportFormat) -> String {
    format!("report_approvalindicator.{}", format.extension())
}

/// Write `rows` to `out` in `format`.
pub fn write_export<W: Write>(
    format: ExportFormat,
    out: W,
    columns: &[Column],
    rows: &[ExportRow],
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => csv::CsvSink::new(out).write_table(columns, rows),
        ExportFormat::Ods => ods::OdsSink::new(out).write_table(columns, rows),
        ExportFormat::Xls => xls::XlsSink::new(out).write_table(columns, rows),
    }
}

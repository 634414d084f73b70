//! Tabular file loading and saving
//!
//! Input: JSON array of objects, CSV, TSV, or an Excel workbook. Output:
//! JSON, CSV, TSV, or XLSX. Columns are written in first-encounter order so
//! the output layout is deterministic for a given input.

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Number, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::core::record::Record;
use crate::utils::error::{PipelineError, Result};

/// Supported output serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON array of records
    Json,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Excel workbook
    #[value(alias = "excel")]
    Xlsx,
}

impl OutputFormat {
    /// File extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "xlsx" | "excel" => Ok(OutputFormat::Xlsx),
            other => Err(PipelineError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Load a tabular file into records, dispatching on its extension
pub fn load(path: &Path) -> Result<Vec<Record>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    info!(path = %path.display(), "loading input file");
    match extension.as_str() {
        "json" => load_json(path),
        "csv" => load_delimited(path, b','),
        "tsv" => load_delimited(path, b'\t'),
        "xlsx" | "xls" => load_spreadsheet(path),
        other => Err(PipelineError::UnsupportedExtension(other.to_string())),
    }
}

fn load_json(path: &Path) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn load_delimited(path: &Path, delimiter: u8) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.to_string(), parse_cell(cell)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Load the first worksheet of an Excel workbook, first row as headers
fn load_spreadsheet(path: &Path) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range_at(0).ok_or_else(|| {
        PipelineError::Validation(format!("{}: workbook has no worksheets", path.display()))
    })??;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in rows {
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.clone(), spreadsheet_cell(cell)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Type a spreadsheet cell. Text cells go through the same typing as
/// delimited-text cells; whole-number floats come back as integers since
/// workbooks store every number as a float.
fn spreadsheet_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Value::Number((*f as i64).into())
            } else {
                Number::from_f64(*f)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(f.to_string()))
            }
        }
        Data::String(s) => parse_cell(s),
        other => parse_cell(&other.to_string()),
    }
}

/// Type a raw text cell: numeric-looking cells become numbers, everything
/// else stays a string. Leading-zero codes (UPCs) are kept as strings.
fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.contains('.') {
        return Value::String(cell.to_string());
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(cell.to_string())
}

/// Save records to `base_path` with the format's extension appended
///
/// Returns the path actually written.
pub fn save(records: &[Record], base_path: &Path, format: OutputFormat) -> Result<PathBuf> {
    let path = base_path.with_extension(format.extension());
    match format {
        OutputFormat::Json => save_json(records, &path)?,
        OutputFormat::Csv => save_delimited(records, &path, b',')?,
        OutputFormat::Tsv => save_delimited(records, &path, b'\t')?,
        OutputFormat::Xlsx => save_xlsx(records, &path)?,
    }
    info!(path = %path.display(), rows = records.len(), "wrote output table");
    Ok(path)
}

/// Union of all field names across the records, in first-encounter order
fn column_order(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for (field, _) in record.iter() {
            if !columns.iter().any(|c| c == field) {
                columns.push(field.clone());
            }
        }
    }
    columns
}

fn save_json(records: &[Record], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn save_delimited(records: &[Record], path: &Path, delimiter: u8) -> Result<()> {
    let columns = column_order(records);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| cell_text(record.get(column)))
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn save_xlsx(records: &[Record], path: &Path) -> Result<()> {
    let columns = column_order(records);
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, column) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, column.as_str())?;
    }
    for (row, record) in records.iter().enumerate() {
        let row = (row + 1) as u32;
        for (col, column) in columns.iter().enumerate() {
            let col = col as u16;
            match record.get(column) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => {
                    worksheet.write_number(row, col, n.as_f64().unwrap_or_default())?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Some(Value::String(s)) => {
                    worksheet.write_string(row, col, s.as_str())?;
                }
                Some(other) => {
                    worksheet.write_string(row, col, other.to_string())?;
                }
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

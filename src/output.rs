//! Persists scraped rows, one file per run.

use crate::models::ScrapedRow;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Columns written ahead of the extracted fields
pub const CONTEXT_COLUMNS: [&str; 7] = [
    "ota",
    "identifier",
    "checkin",
    "checkout",
    "page",
    "url",
    "scraped_at",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Receives each page's rows as soon as they are extracted
pub trait RowSink {
    fn write_rows(&mut self, rows: Vec<ScrapedRow>) -> Result<()>;
}

/// Keeps every row in memory, in arrival order
impl RowSink for Vec<ScrapedRow> {
    fn write_rows(&mut self, rows: Vec<ScrapedRow>) -> Result<()> {
        self.extend(rows);
        Ok(())
    }
}

/// Appends each page's rows to one CSV file, so an interrupted run keeps
/// everything written before it stopped.
#[derive(Debug, Clone)]
pub struct CsvAppender {
    path: PathBuf,
    fields: Vec<String>,
    written: usize,
}

impl CsvAppender {
    pub fn new(path: PathBuf, fields: Vec<String>) -> Self {
        Self {
            path,
            fields,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl RowSink for CsvAppender {
    fn write_rows(&mut self, rows: Vec<ScrapedRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        append_csv(&self.path, &self.fields, &rows)?;
        self.written += rows.len();
        Ok(())
    }
}

/// File name for a run started at `started`
pub fn run_file_path(dir: &Path, started: DateTime<Local>, format: OutputFormat) -> PathBuf {
    dir.join(format!(
        "ota_scrape_{}.{}",
        started.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Append rows to a CSV file, writing the header only into an empty file.
///
/// `fields` fixes the extracted columns; a row without a field gets an empty cell.
pub fn append_csv(path: &Path, fields: &[String], rows: &[ScrapedRow]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let is_empty = file
        .metadata()
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len()
        == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_empty {
        let header = CONTEXT_COLUMNS
            .iter()
            .copied()
            .chain(fields.iter().map(String::as_str));
        writer.write_record(header)?;
    }

    for row in rows {
        writer.write_record(csv_record(row, fields))?;
    }
    writer.flush()?;

    debug!("Appended {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn csv_record(row: &ScrapedRow, fields: &[String]) -> Vec<String> {
    let optional = |value: Option<String>| value.unwrap_or_default();
    let mut record = vec![
        row.ota_id.clone(),
        row.params.identifier.clone(),
        optional(row.params.checkin.map(|d| d.to_string())),
        optional(row.params.checkout.map(|d| d.to_string())),
        optional(row.params.page.map(|p| p.to_string())),
        row.url.clone(),
        row.scraped_at.to_rfc3339(),
    ];
    record.extend(
        fields
            .iter()
            .map(|field| row.record.get(field).unwrap_or_default().to_string()),
    );
    record
}

/// Write all rows as a pretty-printed JSON array
pub async fn write_json(path: &Path, rows: &[ScrapedRow]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Saved {} rows to {}", rows.len(), path.display());
    Ok(())
}

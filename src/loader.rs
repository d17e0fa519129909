//! Owns the enriched table for the session.
//!
//! The table is built on first access and then served from memory until
//! `refresh` or `invalidate` is called.

use std::fs::File;
use std::io;
use std::path::Path;

use polars::prelude::*;
use tracing::{error, info};

use crate::config::InsightConfig;
use crate::error::InsightError;
use crate::table::EnrichedTable;

pub struct DatasetLoader {
    config: InsightConfig,
    table: Option<EnrichedTable>,
}

impl DatasetLoader {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            config,
            table: None,
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    /// The cached table without triggering a load.
    pub fn cached(&self) -> Option<&EnrichedTable> {
        self.table.as_ref()
    }

    /// The enriched table, loading it on first use.
    pub fn table(&mut self) -> Result<&EnrichedTable, InsightError> {
        if self.table.is_none() {
            self.table = Some(self.load()?);
        }
        self.table
            .as_ref()
            .ok_or_else(|| InsightError::NotLoaded("enriched table".into()))
    }

    /// Reload from the source. On failure the previous table stays cached.
    pub fn refresh(&mut self) -> Result<&EnrichedTable, InsightError> {
        let fresh = self.load()?;
        Ok(self.table.insert(fresh))
    }

    pub fn invalidate(&mut self) {
        self.table = None;
    }

    fn load(&self) -> Result<EnrichedTable, InsightError> {
        let path = self.config.source_path();
        let raw = read_source(&path).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load source table");
        })?;
        let table = EnrichedTable::from_raw(raw, &self.config.date_formats)?.with_source(&path);
        info!(
            path = %path.display(),
            rows = table.height(),
            invalid_dates = table.report().invalid_dates,
            synthesized = table.report().synthesized_columns.len(),
            "loaded enriched table"
        );
        Ok(table)
    }
}

/// Read a source file into a raw frame, choosing the reader by extension.
pub fn read_source(path: &Path) -> Result<DataFrame, InsightError> {
    if !path.is_file() {
        return Err(InsightError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source file not found: {}", path.display()),
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => read_csv_as_strings(path),
        Some("parquet") => Ok(ParquetReader::new(File::open(path)?).finish()?),
        other => Err(InsightError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame, InsightError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

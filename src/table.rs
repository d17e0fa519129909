use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::InsightError;
use crate::filter::{self, FilterMask};
use crate::pipeline::{self, EnrichReport};
use crate::record::{self, EnrichedRecord};
use crate::schema::identity;

/// The enriched dataset. Immutable once built; views are new frames.
#[derive(Debug, Clone)]
pub struct EnrichedTable {
    frame: DataFrame,
    report: EnrichReport,
    source: Option<PathBuf>,
}

impl EnrichedTable {
    /// Run the derivation pipeline over a raw frame.
    pub fn from_raw(raw: DataFrame, date_formats: &[String]) -> Result<Self, InsightError> {
        let (frame, report) = pipeline::enrich(raw, date_formats)?;
        Ok(Self {
            frame,
            report,
            source: None,
        })
    }

    pub(crate) fn with_source(mut self, source: &Path) -> Self {
        self.source = Some(source.to_path_buf());
        self
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn report(&self) -> &EnrichReport {
        &self.report
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn records(&self) -> Result<Vec<EnrichedRecord>, InsightError> {
        record::records_from_frame(&self.frame)
    }

    /// Earliest and latest valid dates, `None` if no row has one.
    pub fn date_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>, InsightError> {
        let dates = record::dates(&self.frame)?;
        let mut valid = dates.into_iter().flatten();
        let Some(first) = valid.next() else {
            return Ok(None);
        };
        let (min, max) = valid.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Ok(Some((min, max)))
    }

    /// Sorted distinct state names.
    pub fn states(&self) -> Result<Vec<String>, InsightError> {
        let states: BTreeSet<String> = self
            .frame
            .column(identity::STATE)?
            .str()?
            .into_iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        Ok(states.into_iter().collect())
    }

    /// Rows selected by the control-panel mask.
    pub fn filtered(&self, mask: &FilterMask) -> Result<DataFrame, InsightError> {
        filter::apply_mask(&self.frame, mask)
    }
}

use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use tracing::warn;

use crate::analytics;
use crate::config::InsightConfig;
use crate::diagnostics::{self, AnomalyLabel, HoltLinear, StandardScoreDetector};
use crate::error::InsightError;
use crate::filter::FilterMask;
use crate::loader::DatasetLoader;

/// Python handle over the loader and the analytics views.
///
/// View methods take the (filtered) frame returned by `filter`, so the
/// dashboard decides what slice every chart sees.
#[pyclass]
pub struct InsightModel {
    loader: DatasetLoader,
}

#[pymethods]
impl InsightModel {
    #[new]
    #[pyo3(signature = (base_path, file_name=None))]
    fn new(base_path: String, file_name: Option<String>) -> Self {
        let mut config = InsightConfig::with_base_path(PathBuf::from(base_path));
        if let Some(name) = file_name {
            config.file_name = name;
        }
        Self {
            loader: DatasetLoader::new(config),
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Enriched table, loaded on first call and cached afterwards.
    fn load(&mut self) -> PyResult<PyDataFrame> {
        let table = self.loader.table()?;
        Ok(PyDataFrame(table.frame().clone()))
    }

    /// Re-read the source file and replace the cached table.
    fn refresh(&mut self) -> PyResult<PyDataFrame> {
        let table = self.loader.refresh()?;
        Ok(PyDataFrame(table.frame().clone()))
    }

    fn invalidate(&mut self) {
        self.loader.invalidate();
    }

    #[getter]
    fn is_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    /// (rows, invalid_dates, synthesized_columns) of the current load.
    fn load_report(&mut self) -> PyResult<(usize, usize, Vec<String>)> {
        let report = self.loader.table()?.report().clone();
        Ok((report.rows, report.invalid_dates, report.synthesized_columns))
    }

    // ── Control panel ───────────────────────────────────────────────────────

    fn states(&mut self) -> PyResult<Vec<String>> {
        Ok(self.loader.table()?.states()?)
    }

    fn date_bounds(&mut self) -> PyResult<Option<(NaiveDate, NaiveDate)>> {
        Ok(self.loader.table()?.date_bounds()?)
    }

    /// Rows inside [start, end] for the given states.
    /// Both dates must be given to restrict by date.
    #[pyo3(signature = (start=None, end=None, states=None))]
    fn filter(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        states: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        let date_range = match (start, end) {
            (Some(s), Some(e)) => Some((s, e)),
            (None, None) => None,
            _ => {
                return Err(InsightError::InvalidInput(
                    "start and end must be given together".to_string(),
                )
                .into())
            }
        };
        let mask = FilterMask { date_range, states };
        Ok(PyDataFrame(self.loader.table()?.filtered(&mask)?))
    }

    // ── Views ───────────────────────────────────────────────────────────────

    /// (total_enrolments, total_updates, compliance_risk_areas, migration_hotspots)
    fn kpis(&self, df: PyDataFrame) -> PyResult<(f64, f64, usize, usize)> {
        let k = analytics::kpi_summary(&df.0, &self.loader.config().thresholds)?;
        Ok((
            k.total_enrolments,
            k.total_updates,
            k.compliance_risk_areas,
            k.migration_hotspots,
        ))
    }

    /// ([(district, enrolments, cumulative_pct)], head_share_pct)
    fn pareto(&self, df: PyDataFrame) -> PyResult<(Vec<(String, f64, f64)>, f64)> {
        let fraction = self.loader.config().thresholds.pareto_head_fraction;
        let report = analytics::pareto(&df.0, fraction)?;
        let rows = report
            .entries
            .into_iter()
            .map(|e| (e.district, e.enrolments, e.cumulative_pct))
            .collect();
        Ok((rows, report.head_share_pct))
    }

    /// [(metric, scaled_a, scaled_b)]
    #[staticmethod]
    fn head_to_head(
        df: PyDataFrame,
        state_a: &str,
        state_b: &str,
    ) -> PyResult<Vec<(String, f64, f64)>> {
        let h = analytics::head_to_head(&df.0, state_a, state_b)?;
        Ok(h.axes
            .into_iter()
            .map(|a| (a.metric.to_string(), a.scaled_a, a.scaled_b))
            .collect())
    }

    /// [(day_of_week, enrolments)] Monday first
    #[staticmethod]
    fn day_of_week(df: PyDataFrame) -> PyResult<Vec<(String, f64)>> {
        Ok(analytics::day_of_week(&df.0)?
            .into_iter()
            .map(|d| (d.day_of_week.to_string(), d.enrolments))
            .collect())
    }

    /// (columns, row-major matrix with None where undefined)
    #[staticmethod]
    fn correlation(df: PyDataFrame) -> PyResult<(Vec<String>, Vec<Vec<Option<f64>>>)> {
        let m = analytics::correlation_matrix(&df.0)?;
        let columns = m.columns.iter().map(|c| c.to_string()).collect();
        Ok((columns, m.values))
    }

    fn migration_churn(&self, df: PyDataFrame) -> PyResult<Vec<(String, f64)>> {
        let top_n = self.loader.config().thresholds.churn_top_n;
        Ok(analytics::migration_churn(&df.0, top_n)?)
    }

    /// [(district, urgency)] most urgent first
    fn resource_allocation(&self, df: PyDataFrame) -> PyResult<Vec<(String, f64)>> {
        let top_n = self.loader.config().thresholds.allocation_top_n;
        Ok(analytics::resource_allocation(&df.0, top_n)?
            .into_iter()
            .map(|s| (s.district, s.urgency))
            .collect())
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// [(pincode, total_enrolments, total_updates, bio_age_5_17, is_anomaly)]
    fn anomaly_scan(&self, df: PyDataFrame) -> PyResult<Vec<(String, f64, f64, f64, bool)>> {
        let detector = StandardScoreDetector::new(self.loader.config().thresholds.contamination)?;
        let scan = diagnostics::anomaly_scan(&df.0, &detector)?;
        Ok(scan
            .pincodes
            .into_iter()
            .map(|p| {
                let [enrol, updates, bio] = p.features.values;
                (
                    p.features.pincode,
                    enrol,
                    updates,
                    bio,
                    p.label == AnomalyLabel::Anomaly,
                )
            })
            .collect())
    }

    /// (forecast_dates, values) or None when history is too short.
    fn forecast(&self, df: PyDataFrame) -> PyResult<Option<(Vec<NaiveDate>, Vec<f64>)>> {
        let horizon = self.loader.config().thresholds.forecast_horizon;
        forecast_or_warn(&df.0, horizon)
    }
}

fn forecast_or_warn(
    frame: &DataFrame,
    horizon: usize,
) -> PyResult<Option<(Vec<NaiveDate>, Vec<f64>)>> {
    match diagnostics::demand_forecast(frame, &HoltLinear::default(), horizon) {
        Ok(f) => Ok(Some((f.dates, f.values))),
        Err(e) if e.is_degenerate() => {
            warn!(error = %e, "insufficient data for forecast");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

//! Anomaly scan and demand forecast.
//!
//! The statistical models sit behind [`AnomalyDetector`] and [`Forecaster`];
//! this module prepares their inputs from the enriched frame and shapes
//! their outputs. The bundled implementations are simple models that
//! honour the same contracts.

use chrono::{Days, NaiveDate};
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::analytics::{self, DailySeries, PincodeFeatures};
use crate::error::InsightError;

// ── Anomaly detection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyLabel {
    Normal,
    Anomaly,
}

/// Binary outlier classifier over standardised feature rows.
pub trait AnomalyDetector {
    /// One label per input row, in input order.
    fn classify(&self, rows: &[Vec<f64>]) -> Result<Vec<AnomalyLabel>, InsightError>;
}

/// Flags the `ceil(contamination * n)` rows furthest from the origin of
/// the standardised feature space. Rows at the origin are never flagged.
#[derive(Debug, Clone, Copy)]
pub struct StandardScoreDetector {
    contamination: f64,
}

impl StandardScoreDetector {
    pub fn new(contamination: f64) -> Result<Self, InsightError> {
        if !(0.0..=0.5).contains(&contamination) {
            return Err(InsightError::InvalidInput(format!(
                "contamination must be within [0, 0.5], got {contamination}"
            )));
        }
        Ok(Self { contamination })
    }
}

impl Default for StandardScoreDetector {
    fn default() -> Self {
        Self {
            contamination: 0.05,
        }
    }
}

impl AnomalyDetector for StandardScoreDetector {
    fn classify(&self, rows: &[Vec<f64>]) -> Result<Vec<AnomalyLabel>, InsightError> {
        let mut labels = vec![AnomalyLabel::Normal; rows.len()];
        if rows.len() < 2 {
            return Ok(labels);
        }

        let budget = (self.contamination * rows.len() as f64).ceil() as usize;
        let mut norms: Vec<(usize, f64)> = rows
            .iter()
            .map(|r| r.iter().map(|v| v * v).sum::<f64>().sqrt())
            .enumerate()
            .collect();
        norms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (index, norm) in norms.into_iter().take(budget) {
            if norm > 0.0 {
                labels[index] = AnomalyLabel::Anomaly;
            }
        }
        Ok(labels)
    }
}

/// Column-wise z-scores (population standard deviation). Columns with no
/// spread standardise to zero.
pub fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(width) = rows.first().map(|r| r.len()) else {
        return Vec::new();
    };
    let n = rows.len() as f64;

    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut stds = vec![0.0; width];
    for row in rows {
        for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
            *s += (v - m) * (v - m) / n;
        }
    }
    for s in stds.iter_mut() {
        *s = s.sqrt();
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(means.iter().zip(&stds))
                .map(|(v, (m, s))| if *s > 0.0 { (v - m) / s } else { 0.0 })
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PincodeAnomaly {
    pub features: PincodeFeatures,
    pub label: AnomalyLabel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyScan {
    pub pincodes: Vec<PincodeAnomaly>,
}

impl AnomalyScan {
    pub fn anomalies(&self) -> impl Iterator<Item = &PincodeAnomaly> {
        self.pincodes
            .iter()
            .filter(|p| p.label == AnomalyLabel::Anomaly)
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies().count()
    }
}

/// Aggregate per pincode, standardise, and label every pincode.
pub fn anomaly_scan(
    frame: &DataFrame,
    detector: &dyn AnomalyDetector,
) -> Result<AnomalyScan, InsightError> {
    let features = analytics::pincode_features(frame)?;
    let rows: Vec<Vec<f64>> = features.iter().map(|f| f.values.to_vec()).collect();
    let labels = detector.classify(&standardize(&rows))?;
    if labels.len() != features.len() {
        return Err(InsightError::InvalidInput(format!(
            "detector returned {} labels for {} pincodes",
            labels.len(),
            features.len()
        )));
    }

    let scan = AnomalyScan {
        pincodes: features
            .into_iter()
            .zip(labels)
            .map(|(features, label)| PincodeAnomaly { features, label })
            .collect(),
    };
    info!(
        pincodes = scan.pincodes.len(),
        anomalies = scan.anomaly_count(),
        "anomaly scan complete"
    );
    Ok(scan)
}

// ── Forecasting ─────────────────────────────────────────────────────────────

/// Fixed-horizon forecaster over an evenly spaced daily history.
pub trait Forecaster {
    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>, InsightError>;
}

/// Holt's linear method: additive trend, no seasonality.
#[derive(Debug, Clone, Copy)]
pub struct HoltLinear {
    /// Level smoothing
    pub alpha: f64,
    /// Trend smoothing
    pub beta: f64,
}

impl Default for HoltLinear {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.1,
        }
    }
}

impl Forecaster for HoltLinear {
    fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>, InsightError> {
        if history.len() < 2 {
            return Err(InsightError::InsufficientData(format!(
                "trend forecast needs at least 2 observations, got {}",
                history.len()
            )));
        }

        let mut level = history[0];
        let mut trend = history[1] - history[0];
        for &y in &history[1..] {
            let previous = level;
            level = self.alpha * y + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - previous) + (1.0 - self.beta) * trend;
        }

        Ok((1..=horizon)
            .map(|h| level + h as f64 * trend)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemandForecast {
    pub history: DailySeries,
    /// Days following the last observed day
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl DemandForecast {
    /// Whole enrolments expected over the horizon.
    pub fn expected_load(&self) -> i64 {
        self.values.iter().sum::<f64>() as i64
    }
}

/// Forecast daily enrolments `horizon` days past the last observed date.
///
/// Too little history is reported as `InsufficientData`; callers treat it
/// as a warning.
pub fn demand_forecast(
    frame: &DataFrame,
    forecaster: &dyn Forecaster,
    horizon: usize,
) -> Result<DemandForecast, InsightError> {
    let history = analytics::daily_series(frame)?;
    let Some(last) = history.last_date() else {
        warn!("no dated rows available for forecasting");
        return Err(InsightError::InsufficientData(
            "no dated rows to forecast from".to_string(),
        ));
    };

    let values = forecaster.forecast(&history.values, horizon).inspect_err(|e| {
        warn!(observations = history.len(), error = %e, "forecast skipped");
    })?;

    let dates = (1..=horizon as u64)
        .map_while(|d| last.checked_add_days(Days::new(d)))
        .collect::<Vec<_>>();
    if dates.len() != values.len() {
        return Err(InsightError::InvalidInput(format!(
            "forecaster returned {} values for a {}-day horizon",
            values.len(),
            horizon
        )));
    }

    Ok(DemandForecast {
        history,
        dates,
        values,
    })
}

//! Runtime configuration for loading and analysing the dataset.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DATA_DIR_ENV: &str = "INSIGHT_DATA_DIR";
pub const DATA_FILE_ENV: &str = "INSIGHT_DATA_FILE";

/// Loader and analytics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Directory the source file is resolved against
    pub base_path: PathBuf,
    /// Source file name (`.csv` or `.parquet`)
    pub file_name: String,
    /// Date formats tried in order; first successful parse wins
    pub date_formats: Vec<String>,
    pub thresholds: Thresholds,
}

/// Cut-offs and sizes used by the analytics views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Pincodes with MBU gap index below this are compliance risks
    pub mbu_risk_below: f64,
    /// Pincodes with migration intensity above this are hotspots
    pub migration_hotspot_above: f64,
    /// Fraction of districts treated as the "vital few"
    pub pareto_head_fraction: f64,
    pub churn_top_n: usize,
    pub allocation_top_n: usize,
    /// Expected share of anomalous pincodes
    pub contamination: f64,
    pub forecast_horizon: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mbu_risk_below: 0.2,
            migration_hotspot_above: 5.0,
            pareto_head_fraction: 0.2,
            churn_top_n: 10,
            allocation_top_n: 15,
            contamination: 0.05,
            forecast_horizon: 30,
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            file_name: "unified_enrolment_data.csv".to_string(),
            date_formats: vec![
                "%d-%m-%Y".to_string(),
                "%Y-%m-%d".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
            ],
            thresholds: Thresholds::default(),
        }
    }
}

impl InsightConfig {
    /// Config rooted at `base_path` with defaults elsewhere
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `INSIGHT_DATA_DIR` / `INSIGHT_DATA_FILE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            config.base_path = PathBuf::from(dir);
        }
        if let Ok(file) = env::var(DATA_FILE_ENV) {
            if !file.trim().is_empty() {
                config.file_name = file.trim().to_string();
            }
        }
        config
    }

    pub fn source_path(&self) -> PathBuf {
        self.base_path.join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_path() {
        let config = InsightConfig::with_base_path("/data");
        assert_eq!(
            config.source_path(),
            PathBuf::from("/data/unified_enrolment_data.csv")
        );
        assert_eq!(config.thresholds.forecast_horizon, 30);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: InsightConfig =
            serde_json::from_str(r#"{"file_name": "march.parquet", "thresholds": {"churn_top_n": 5}}"#)
                .unwrap();
        assert_eq!(config.file_name, "march.parquet");
        assert_eq!(config.thresholds.churn_top_n, 5);
        assert_eq!(config.thresholds.allocation_top_n, 15);
        assert_eq!(config.date_formats.len(), 4);
    }
}

use tracing_subscriber::EnvFilter;

use crate::error::InsightError;

/// Environment variable holding the log filter, e.g. `aadhaar_insight=debug`.
pub const LOG_ENV: &str = "INSIGHT_LOG";

/// Install a global fmt subscriber. Fails if one is already installed.
pub fn init_tracing() -> Result<(), InsightError> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| InsightError::Logging(e.to_string()))
}

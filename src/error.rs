use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Logging: {0}")]
    Logging(String),
}

impl InsightError {
    /// Degenerate aggregates are reported to the analyst as warnings, not failures.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, InsightError::InsufficientData(_))
    }
}

#[cfg(feature = "python")]
impl From<InsightError> for pyo3::PyErr {
    fn from(err: InsightError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}

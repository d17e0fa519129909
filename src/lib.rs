pub mod analytics;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod table;

#[cfg(feature = "python")]
mod model;

pub use config::{InsightConfig, Thresholds};
pub use error::InsightError;
pub use filter::FilterMask;
pub use loader::DatasetLoader;
pub use pipeline::{enrich, EnrichReport};
pub use record::{Counters, DerivedMetrics, EnrichedRecord, RawRecord};
pub use table::EnrichedTable;

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export column names as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Identity
    let identity = PyModule::new(m.py(), "identity")?;
    identity.add("DATE", schema::identity::DATE)?;
    identity.add("STATE", schema::identity::STATE)?;
    identity.add("DISTRICT", schema::identity::DISTRICT)?;
    identity.add("PINCODE", schema::identity::PINCODE)?;
    m.add_submodule(&identity)?;

    // Raw counters
    let raw = PyModule::new(m.py(), "raw")?;
    raw.add("BIO_AGE_5_17", schema::raw::BIO_AGE_5_17)?;
    raw.add("BIO_AGE_17_", schema::raw::BIO_AGE_17_)?;
    raw.add("DEMO_AGE_5_17", schema::raw::DEMO_AGE_5_17)?;
    raw.add("DEMO_AGE_17_", schema::raw::DEMO_AGE_17_)?;
    raw.add("AGE_0_5", schema::raw::AGE_0_5)?;
    raw.add("AGE_5_17", schema::raw::AGE_5_17)?;
    raw.add("AGE_18_GREATER", schema::raw::AGE_18_GREATER)?;
    m.add_submodule(&raw)?;

    // Derived
    let derived = PyModule::new(m.py(), "derived")?;
    derived.add("BIOMETRIC_UPDATES", schema::derived::BIOMETRIC_UPDATES)?;
    derived.add("DEMOGRAPHIC_UPDATES", schema::derived::DEMOGRAPHIC_UPDATES)?;
    derived.add("TOTAL_UPDATES", schema::derived::TOTAL_UPDATES)?;
    derived.add("TOTAL_ENROLMENTS", schema::derived::TOTAL_ENROLMENTS)?;
    derived.add("MBU_GAP_INDEX", schema::derived::MBU_GAP_INDEX)?;
    derived.add("MIGRATION_INTENSITY", schema::derived::MIGRATION_INTENSITY)?;
    derived.add("WEIGHTED_EFFORT", schema::derived::WEIGHTED_EFFORT)?;
    derived.add("EFFICIENCY_GAP", schema::derived::EFFICIENCY_GAP)?;
    derived.add("DAY_OF_WEEK", schema::derived::DAY_OF_WEEK)?;
    derived.add("DAY_INDEX", schema::derived::DAY_INDEX)?;
    m.add_submodule(&derived)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn aadhaar_insight(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // The host process may already own a subscriber
    let _ = logging::init_tracing();
    m.add_class::<model::InsightModel>()?;
    add_schema_exports(m)?;
    Ok(())
}

/// Column-name constants for the enrolment dataset.
/// Single source of truth - exported to Python via PyO3.

// ── Identity columns ────────────────────────────────────────────────────────
pub mod identity {
    pub const DATE: &str = "date";
    pub const STATE: &str = "state";
    pub const DISTRICT: &str = "district";
    pub const PINCODE: &str = "pincode";

    /// Location columns that must be present in every source.
    pub const LOCATION: [&str; 3] = [STATE, DISTRICT, PINCODE];
}

// ── Raw counter columns ─────────────────────────────────────────────────────
pub mod raw {
    pub const BIO_AGE_5_17: &str = "bio_age_5_17";
    pub const BIO_AGE_17_: &str = "bio_age_17_";
    pub const DEMO_AGE_5_17: &str = "demo_age_5_17";
    pub const DEMO_AGE_17_: &str = "demo_age_17_";
    pub const AGE_0_5: &str = "age_0_5";
    pub const AGE_5_17: &str = "age_5_17";
    pub const AGE_18_GREATER: &str = "age_18_greater";

    pub const ALL: [&str; 7] = [
        BIO_AGE_5_17,
        BIO_AGE_17_,
        DEMO_AGE_5_17,
        DEMO_AGE_17_,
        AGE_0_5,
        AGE_5_17,
        AGE_18_GREATER,
    ];
}

// ── Derived columns ─────────────────────────────────────────────────────────
pub mod derived {
    pub const BIOMETRIC_UPDATES: &str = "biometric_updates";
    pub const DEMOGRAPHIC_UPDATES: &str = "demographic_updates";
    pub const TOTAL_UPDATES: &str = "total_updates";
    pub const TOTAL_ENROLMENTS: &str = "total_enrolments";
    pub const MBU_GAP_INDEX: &str = "mbu_gap_index";
    pub const MIGRATION_INTENSITY: &str = "migration_intensity";
    pub const WEIGHTED_EFFORT: &str = "weighted_effort";
    pub const EFFICIENCY_GAP: &str = "efficiency_gap";
    pub const DAY_OF_WEEK: &str = "day_of_week";
    pub const DAY_INDEX: &str = "day_index";

    pub const ALL: [&str; 10] = [
        BIOMETRIC_UPDATES,
        DEMOGRAPHIC_UPDATES,
        TOTAL_UPDATES,
        TOTAL_ENROLMENTS,
        MBU_GAP_INDEX,
        MIGRATION_INTENSITY,
        WEIGHTED_EFFORT,
        EFFICIENCY_GAP,
        DAY_OF_WEEK,
        DAY_INDEX,
    ];
}

// ── Weekday names, indexed Monday = 0 ───────────────────────────────────────
pub mod weekday {
    pub const NAMES: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
}

/// Canonical output column order of the enriched table.
pub fn enriched_columns() -> Vec<&'static str> {
    let mut cols = vec![identity::DATE];
    cols.extend(identity::LOCATION);
    cols.extend(raw::ALL);
    cols.extend(derived::ALL);
    cols
}

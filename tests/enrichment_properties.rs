use aadhaar_insight::pipeline::enrich;
use aadhaar_insight::record::{raw_frame, records_from_frame};
use aadhaar_insight::{Counters, InsightConfig, RawRecord};
use chrono::NaiveDate;
use proptest::prelude::*;

fn formats() -> Vec<String> {
    InsightConfig::default().date_formats
}

fn counters_strategy() -> impl Strategy<Value = Counters> {
    proptest::collection::vec(0u32..5_000, 7).prop_map(|v| Counters {
        bio_age_5_17: v[0] as f64,
        bio_age_17_: v[1] as f64,
        demo_age_5_17: v[2] as f64,
        demo_age_17_: v[3] as f64,
        age_0_5: v[4] as f64,
        age_5_17: v[5] as f64,
        age_18_greater: v[6] as f64,
    })
}

fn record_strategy() -> impl Strategy<Value = RawRecord> {
    (
        0u64..730,
        prop_oneof![Just("Goa"), Just("Sikkim"), Just("Kerala")],
        0usize..4,
        counters_strategy(),
    )
        .prop_map(|(offset, state, district, counters)| RawRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.checked_add_days(chrono::Days::new(offset))),
            state: state.to_string(),
            district: format!("{state}-D{district}"),
            pincode: format!("40{district}00{}", offset % 10),
            counters,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn derived_metrics_hold_row_invariants(records in proptest::collection::vec(record_strategy(), 1..20)) {
        let (df, report) = enrich(raw_frame(&records).unwrap(), &formats()).unwrap();
        prop_assert_eq!(report.rows, records.len());
        prop_assert_eq!(report.invalid_dates, 0);

        for row in records_from_frame(&df).unwrap() {
            let c = row.raw.counters;
            let d = &row.derived;
            prop_assert_eq!(d.biometric_updates, c.bio_age_5_17 + c.bio_age_17_);
            prop_assert_eq!(d.demographic_updates, c.demo_age_5_17 + c.demo_age_17_);
            prop_assert_eq!(d.total_updates, d.biometric_updates + d.demographic_updates);
            prop_assert_eq!(d.total_enrolments, c.age_0_5 + c.age_5_17 + c.age_18_greater);
            if c.age_5_17 == 0.0 {
                prop_assert_eq!(d.mbu_gap_index, 0.0);
            }
            prop_assert!(d.mbu_gap_index.is_finite());
            prop_assert!(d.migration_intensity.is_finite());
            prop_assert!(d.efficiency_gap.is_finite());
            prop_assert!(d.efficiency_gap >= 0.0 && d.efficiency_gap <= 3.0);
            prop_assert!(d.day_index.is_some_and(|i| i <= 6));
        }
    }

    #[test]
    fn enrichment_is_idempotent(records in proptest::collection::vec(record_strategy(), 1..12)) {
        let (first, _) = enrich(raw_frame(&records).unwrap(), &formats()).unwrap();
        let first = records_from_frame(&first).unwrap();

        let raw_again: Vec<RawRecord> = first.iter().map(|r| r.raw.clone()).collect();
        let (second, _) = enrich(raw_frame(&raw_again).unwrap(), &formats()).unwrap();
        let second = records_from_frame(&second).unwrap();

        prop_assert_eq!(first, second);
    }
}

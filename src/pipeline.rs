//! Feature derivation: raw enrolment/update counters → enriched table.
//!
//! Every derived column is a row-wise polars expression, so the whole
//! transform is a single lazy plan with no cross-row state.

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::InsightError;
use crate::schema::{self, derived, identity, raw, weekday};

const WHITESPACE: &str = " \t\r\n";

/// What the pipeline had to normalise while enriching a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub rows: usize,
    /// Rows whose date was missing or matched none of the formats
    pub invalid_dates: usize,
    /// Counter columns absent from the input, filled with zeros
    pub synthesized_columns: Vec<String>,
}

/// Enrich a raw table.
///
/// Required columns: date, state, district, pincode.
/// Counter columns are optional; absent ones are synthesized as zero and
/// unparseable values become zero. Dates that match none of
/// `date_formats` become null. Columns outside the schema are kept, after
/// the canonical ones.
pub fn enrich(
    raw_df: DataFrame,
    date_formats: &[String],
) -> Result<(DataFrame, EnrichReport), InsightError> {
    if date_formats.is_empty() {
        return Err(InsightError::InvalidInput(
            "at least one date format is required".to_string(),
        ));
    }

    let mut required = vec![identity::DATE];
    required.extend(identity::LOCATION);
    require_columns(&raw_df, &required)?;

    let schema = raw_df.schema();
    let canonical = schema::enriched_columns();
    let extras: Vec<String> = raw_df
        .get_column_names_str()
        .iter()
        .filter(|name| !canonical.iter().any(|c| *c == **name))
        .map(|name| name.to_string())
        .collect();

    let mut synthesized = Vec::new();
    let mut cleaned: Vec<Expr> = identity::LOCATION.iter().map(|c| trimmed(c)).collect();
    for &counter in &raw::ALL {
        if schema.contains(counter) {
            cleaned.push(numeric(counter));
        } else {
            debug!(column = counter, "synthesizing missing counter column as zero");
            synthesized.push(counter.to_string());
            cleaned.push(lit(0.0).alias(counter));
        }
    }
    let date_is_temporal = matches!(
        schema.get(identity::DATE),
        Some(DataType::Date | DataType::Datetime(_, _))
    );
    cleaned.push(if date_is_temporal {
        col(identity::DATE).cast(DataType::Date)
    } else {
        parse_date(date_formats)
    });

    let mut output: Vec<Expr> = canonical.iter().map(|c| col(*c)).collect();
    output.extend(extras.iter().map(|c| col(c.as_str())));

    let df = raw_df
        .lazy()
        .with_columns(cleaned)
        .with_columns([
            (col(raw::BIO_AGE_5_17) + col(raw::BIO_AGE_17_)).alias(derived::BIOMETRIC_UPDATES),
            (col(raw::DEMO_AGE_5_17) + col(raw::DEMO_AGE_17_))
                .alias(derived::DEMOGRAPHIC_UPDATES),
            (col(raw::AGE_0_5) + col(raw::AGE_5_17) + col(raw::AGE_18_GREATER))
                .alias(derived::TOTAL_ENROLMENTS),
            when(col(raw::AGE_5_17).gt(lit(0.0)))
                .then(col(raw::BIO_AGE_5_17) / col(raw::AGE_5_17))
                .otherwise(lit(0.0))
                .alias(derived::MBU_GAP_INDEX),
            (col(raw::DEMO_AGE_17_) / (col(raw::AGE_18_GREATER) + lit(1.0)))
                .alias(derived::MIGRATION_INTENSITY),
            (col(identity::DATE).dt().weekday() - lit(1))
                .cast(DataType::Int32)
                .alias(derived::DAY_INDEX),
        ])
        .with_columns([
            (col(derived::BIOMETRIC_UPDATES) + col(derived::DEMOGRAPHIC_UPDATES))
                .alias(derived::TOTAL_UPDATES),
            (col(derived::TOTAL_ENROLMENTS) * lit(3.0)
                + col(derived::BIOMETRIC_UPDATES) * lit(2.0)
                + col(derived::DEMOGRAPHIC_UPDATES) * lit(1.0))
            .alias(derived::WEIGHTED_EFFORT),
            day_name(),
        ])
        .with_columns([(col(derived::WEIGHTED_EFFORT)
            / (col(derived::TOTAL_UPDATES) + col(derived::TOTAL_ENROLMENTS) + lit(1.0)))
        .alias(derived::EFFICIENCY_GAP)])
        .select(output)
        .collect()?;

    let invalid_dates = df.column(identity::DATE)?.null_count();
    if invalid_dates > 0 {
        warn!(
            invalid_dates,
            rows = df.height(),
            "rows with unparseable dates kept with a null date"
        );
    }

    let report = EnrichReport {
        rows: df.height(),
        invalid_dates,
        synthesized_columns: synthesized,
    };
    Ok((df, report))
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), InsightError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(InsightError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Column as a whitespace-trimmed string.
fn trimmed(column: &str) -> Expr {
    col(column)
        .cast(DataType::String)
        .str()
        .strip_chars(lit(WHITESPACE))
}

/// Column as Float64; anything that does not parse, or is negative, becomes 0.
fn numeric(column: &str) -> Expr {
    let value = trimmed(column)
        .cast(DataType::Float64)
        .fill_nan(lit(0.0))
        .fill_null(lit(0.0));
    when(value.clone().lt(lit(0.0)))
        .then(lit(0.0))
        .otherwise(value)
        .alias(column)
}

/// First format that parses wins; no match gives a null date.
fn parse_date(formats: &[String]) -> Expr {
    let source = trimmed(identity::DATE);
    let mut parsed = lit(NULL).cast(DataType::Date);
    for format in formats.iter().rev() {
        let options = StrptimeOptions {
            format: Some(format.as_str().into()),
            strict: false,
            exact: true,
            ..Default::default()
        };
        let attempt = if has_time_of_day(format) {
            source
                .clone()
                .str()
                .to_datetime(Some(TimeUnit::Microseconds), None, options, lit("raise"))
                .cast(DataType::Date)
        } else {
            source.clone().str().to_date(options)
        };
        parsed = when(attempt.clone().is_not_null())
            .then(attempt)
            .otherwise(parsed);
    }
    parsed.alias(identity::DATE)
}

fn has_time_of_day(format: &str) -> bool {
    ["%H", "%M", "%S", "%T", "%R"]
        .iter()
        .any(|spec| format.contains(spec))
}

fn day_name() -> Expr {
    let mut name = lit(NULL).cast(DataType::String);
    for (index, day) in weekday::NAMES.iter().enumerate().rev() {
        name = when(col(derived::DAY_INDEX).eq(lit(index as i32)))
            .then(lit(*day))
            .otherwise(name);
    }
    name.alias(derived::DAY_OF_WEEK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsightConfig;

    fn formats() -> Vec<String> {
        InsightConfig::default().date_formats
    }

    fn row_frame(date: &str, counters: &[(&str, &str)]) -> DataFrame {
        let mut columns = vec![
            Column::new(identity::DATE.into(), [date]),
            Column::new(identity::STATE.into(), ["Karnataka"]),
            Column::new(identity::DISTRICT.into(), ["Mysuru"]),
            Column::new(identity::PINCODE.into(), ["570001"]),
        ];
        for (name, value) in counters {
            columns.push(Column::new((*name).into(), [*value]));
        }
        DataFrame::new(columns).unwrap()
    }

    fn value(df: &DataFrame, column: &str) -> f64 {
        df.column(column).unwrap().f64().unwrap().get(0).unwrap()
    }

    #[test]
    fn test_mbu_gap_index_ratio() {
        let df = row_frame(
            "03-03-2025",
            &[(raw::BIO_AGE_5_17, "10"), (raw::AGE_5_17, "20")],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert!((value(&out, derived::MBU_GAP_INDEX) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mbu_gap_index_zero_denominator() {
        let df = row_frame(
            "03-03-2025",
            &[(raw::BIO_AGE_5_17, "40"), (raw::AGE_5_17, "0")],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert_eq!(value(&out, derived::MBU_GAP_INDEX), 0.0);
    }

    #[test]
    fn test_migration_intensity_smoothing() {
        let df = row_frame(
            "03-03-2025",
            &[(raw::DEMO_AGE_17_, "6"), (raw::AGE_18_GREATER, "2")],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert!((value(&out, derived::MIGRATION_INTENSITY) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_effort_and_efficiency_gap() {
        let df = row_frame(
            "03-03-2025",
            &[
                (raw::AGE_0_5, "50"),
                (raw::AGE_5_17, "30"),
                (raw::AGE_18_GREATER, "20"),
                (raw::BIO_AGE_5_17, "0"),
                (raw::BIO_AGE_17_, "10"),
                (raw::DEMO_AGE_5_17, "5"),
                (raw::DEMO_AGE_17_, "0"),
            ],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert_eq!(value(&out, derived::TOTAL_ENROLMENTS), 100.0);
        assert_eq!(value(&out, derived::TOTAL_UPDATES), 15.0);
        assert_eq!(value(&out, derived::WEIGHTED_EFFORT), 325.0);
        assert!((value(&out, derived::EFFICIENCY_GAP) - 325.0 / 116.0).abs() < 1e-12);
    }

    #[test]
    fn test_unparseable_counter_becomes_zero() {
        let df = row_frame(
            "03-03-2025",
            &[(raw::AGE_0_5, "n/a"), (raw::AGE_5_17, " 7 ")],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert_eq!(value(&out, raw::AGE_0_5), 0.0);
        assert_eq!(value(&out, raw::AGE_5_17), 7.0);
        assert_eq!(value(&out, derived::TOTAL_ENROLMENTS), 7.0);
    }

    #[test]
    fn test_missing_counters_are_synthesized() {
        let df = row_frame("03-03-2025", &[(raw::AGE_0_5, "4")]);
        let (out, report) = enrich(df, &formats()).unwrap();
        assert_eq!(report.synthesized_columns.len(), 6);
        assert!(!report
            .synthesized_columns
            .contains(&raw::AGE_0_5.to_string()));
        assert_eq!(value(&out, raw::BIO_AGE_17_), 0.0);
        assert_eq!(value(&out, derived::TOTAL_UPDATES), 0.0);
        assert_eq!(value(&out, derived::TOTAL_ENROLMENTS), 4.0);
    }

    #[test]
    fn test_day_index_monday_and_sunday() {
        // 2025-03-03 was a Monday, 2025-03-09 a Sunday
        for (date, expected, name) in [
            ("03-03-2025", 0, "Monday"),
            ("2025-03-09", 6, "Sunday"),
        ] {
            let (out, report) = enrich(row_frame(date, &[]), &formats()).unwrap();
            assert_eq!(report.invalid_dates, 0);
            let index = out.column(derived::DAY_INDEX).unwrap().i32().unwrap().get(0);
            assert_eq!(index, Some(expected));
            let day = out.column(derived::DAY_OF_WEEK).unwrap().str().unwrap().get(0);
            assert_eq!(day, Some(name));
        }
    }

    #[test]
    fn test_invalid_date_kept_as_null() {
        let (out, report) = enrich(row_frame("not a date", &[]), &formats()).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(out.column(derived::DAY_INDEX).unwrap().null_count(), 1);
        assert_eq!(out.column(derived::DAY_OF_WEEK).unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_location_column_is_fatal() {
        let df = DataFrame::new(vec![
            Column::new(identity::DATE.into(), ["03-03-2025"]),
            Column::new(identity::STATE.into(), ["Goa"]),
        ])
        .unwrap();
        match enrich(df, &formats()) {
            Err(InsightError::MissingColumn(name)) => assert_eq!(name, identity::DISTRICT),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn test_output_column_order_is_stable() {
        let df = row_frame("03-03-2025", &[("operator", "X7"), (raw::AGE_0_5, "1")]);
        let (out, _) = enrich(df, &formats()).unwrap();
        let mut expected: Vec<String> = schema::enriched_columns()
            .into_iter()
            .map(String::from)
            .collect();
        expected.push("operator".to_string());
        let actual: Vec<String> = out
            .get_column_names_str()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_enriching_own_output_is_a_no_op() {
        let df = row_frame(
            "09-03-2025",
            &[(raw::BIO_AGE_5_17, "3"), (raw::AGE_5_17, "4"), (raw::DEMO_AGE_17_, "9")],
        );
        let (first, _) = enrich(df, &formats()).unwrap();
        let (second, report) = enrich(first.clone(), &formats()).unwrap();
        assert!(report.synthesized_columns.is_empty());
        assert_eq!(report.invalid_dates, 0);
        assert!(first.equals_missing(&second));
    }

    fn single_date_frame(date: Series) -> DataFrame {
        DataFrame::new(vec![
            date.into_column(),
            Column::new(identity::STATE.into(), ["Goa"]),
            Column::new(identity::DISTRICT.into(), ["North Goa"]),
            Column::new(identity::PINCODE.into(), ["403001"]),
        ])
        .unwrap()
    }

    fn day_index(df: &DataFrame) -> Option<i32> {
        df.column(derived::DAY_INDEX).unwrap().i32().unwrap().get(0)
    }

    #[test]
    fn test_datetime_column_keeps_its_date() {
        let monday = chrono::NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros();
        let date = Series::new(identity::DATE.into(), [monday])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let (out, report) = enrich(single_date_frame(date), &formats()).unwrap();
        assert_eq!(report.invalid_dates, 0);
        assert_eq!(out.column(identity::DATE).unwrap().dtype(), &DataType::Date);
        assert_eq!(day_index(&out), Some(0));
    }

    #[test]
    fn test_date_column_is_used_as_is() {
        // 2025-03-09 is 20156 days after the epoch
        let date = Series::new(identity::DATE.into(), [20156i32])
            .cast(&DataType::Date)
            .unwrap();
        let (out, report) = enrich(single_date_frame(date), &formats()).unwrap();
        assert_eq!(report.invalid_dates, 0);
        assert_eq!(day_index(&out), Some(6));
    }

    #[test]
    fn test_timestamp_string_parses_to_its_date() {
        let df = row_frame("2025-03-03 00:00:00", &[]);
        let (out, report) = enrich(df, &formats()).unwrap();
        assert_eq!(report.invalid_dates, 0);
        assert_eq!(day_index(&out), Some(0));
    }

    #[test]
    fn test_negative_counter_becomes_zero() {
        let df = row_frame(
            "03-03-2025",
            &[(raw::DEMO_AGE_17_, "5"), (raw::AGE_18_GREATER, "-1")],
        );
        let (out, _) = enrich(df, &formats()).unwrap();
        assert_eq!(value(&out, raw::AGE_18_GREATER), 0.0);
        assert_eq!(value(&out, derived::MIGRATION_INTENSITY), 5.0);
        assert_eq!(value(&out, derived::TOTAL_ENROLMENTS), 0.0);
        assert!(value(&out, derived::EFFICIENCY_GAP).is_finite());
    }
}

//! Strongly-typed views of raw and enriched rows.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::InsightError;
use crate::schema::{derived, identity, raw};

/// The seven age-bucketed counters of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Counters {
    pub bio_age_5_17: f64,
    pub bio_age_17_: f64,
    pub demo_age_5_17: f64,
    pub demo_age_17_: f64,
    pub age_0_5: f64,
    pub age_5_17: f64,
    pub age_18_greater: f64,
}

impl Counters {
    /// Values in `raw::ALL` order.
    pub fn values(&self) -> [f64; 7] {
        [
            self.bio_age_5_17,
            self.bio_age_17_,
            self.demo_age_5_17,
            self.demo_age_17_,
            self.age_0_5,
            self.age_5_17,
            self.age_18_greater,
        ]
    }

    fn from_values(v: [f64; 7]) -> Self {
        Self {
            bio_age_5_17: v[0],
            bio_age_17_: v[1],
            demo_age_5_17: v[2],
            demo_age_17_: v[3],
            age_0_5: v[4],
            age_5_17: v[5],
            age_18_greater: v[6],
        }
    }
}

/// One date × location row as it arrives from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub date: Option<NaiveDate>,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub counters: Counters,
}

/// Metrics derived from a record's counters and date.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub biometric_updates: f64,
    pub demographic_updates: f64,
    pub total_updates: f64,
    pub total_enrolments: f64,
    pub mbu_gap_index: f64,
    pub migration_intensity: f64,
    pub weighted_effort: f64,
    pub efficiency_gap: f64,
    pub day_of_week: Option<String>,
    /// Monday = 0 … Sunday = 6
    pub day_index: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    pub derived: DerivedMetrics,
}

/// Build a raw table (dates rendered as `%Y-%m-%d`) from typed records.
pub fn raw_frame(records: &[RawRecord]) -> Result<DataFrame, InsightError> {
    let dates: Vec<Option<String>> = records
        .iter()
        .map(|r| r.date.map(|d| d.format("%Y-%m-%d").to_string()))
        .collect();
    let states: Vec<&str> = records.iter().map(|r| r.state.as_str()).collect();
    let districts: Vec<&str> = records.iter().map(|r| r.district.as_str()).collect();
    let pincodes: Vec<&str> = records.iter().map(|r| r.pincode.as_str()).collect();

    let mut columns = vec![
        Column::new(identity::DATE.into(), dates),
        Column::new(identity::STATE.into(), states),
        Column::new(identity::DISTRICT.into(), districts),
        Column::new(identity::PINCODE.into(), pincodes),
    ];
    for (i, name) in raw::ALL.iter().enumerate() {
        let values: Vec<f64> = records.iter().map(|r| r.counters.values()[i]).collect();
        columns.push(Column::new((*name).into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

fn floats<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked, InsightError> {
    Ok(df.column(name)?.f64()?)
}

fn strings<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked, InsightError> {
    Ok(df.column(name)?.str()?)
}

/// Valid dates of the `date` column, null where the date did not parse.
pub(crate) fn dates(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>, InsightError> {
    Ok(df
        .column(identity::DATE)?
        .as_materialized_series()
        .date()?
        .as_date_iter()
        .collect())
}

/// Materialise typed records from an enriched frame.
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<EnrichedRecord>, InsightError> {
    let dates = dates(df)?;
    let states = strings(df, identity::STATE)?;
    let districts = strings(df, identity::DISTRICT)?;
    let pincodes = strings(df, identity::PINCODE)?;
    let counters: Vec<&Float64Chunked> = raw::ALL
        .iter()
        .map(|name| floats(df, name))
        .collect::<Result<_, _>>()?;
    let metrics: Vec<&Float64Chunked> = derived::ALL[..8]
        .iter()
        .map(|name| floats(df, name))
        .collect::<Result<_, _>>()?;
    let day_names = strings(df, derived::DAY_OF_WEEK)?;
    let day_index = df.column(derived::DAY_INDEX)?.i32()?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut values = [0.0f64; 7];
        for (j, c) in counters.iter().enumerate() {
            values[j] = c.get(i).unwrap_or(0.0);
        }
        let m: Vec<f64> = metrics.iter().map(|c| c.get(i).unwrap_or(0.0)).collect();

        records.push(EnrichedRecord {
            raw: RawRecord {
                date: dates[i],
                state: states.get(i).unwrap_or_default().to_string(),
                district: districts.get(i).unwrap_or_default().to_string(),
                pincode: pincodes.get(i).unwrap_or_default().to_string(),
                counters: Counters::from_values(values),
            },
            derived: DerivedMetrics {
                biometric_updates: m[0],
                demographic_updates: m[1],
                total_updates: m[2],
                total_enrolments: m[3],
                mbu_gap_index: m[4],
                migration_intensity: m[5],
                weighted_effort: m[6],
                efficiency_gap: m[7],
                day_of_week: day_names.get(i).map(|s| s.to_string()),
                day_index: day_index.get(i).map(|d| d as u8),
            },
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsightConfig;
    use crate::pipeline::enrich;

    fn record(date: Option<NaiveDate>, counters: Counters) -> RawRecord {
        RawRecord {
            date,
            state: "Bihar".to_string(),
            district: "Patna".to_string(),
            pincode: "800001".to_string(),
            counters,
        }
    }

    #[test]
    fn test_typed_round_trip_through_pipeline() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9);
        let counters = Counters {
            bio_age_5_17: 10.0,
            age_5_17: 20.0,
            demo_age_17_: 6.0,
            age_18_greater: 2.0,
            ..Default::default()
        };
        let frame = raw_frame(&[record(date, counters), record(None, Counters::default())]).unwrap();
        let (enriched, _) = enrich(frame, &InsightConfig::default().date_formats).unwrap();
        let records = records_from_frame(&enriched).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.raw.date, date);
        assert_eq!(first.raw.counters, counters);
        assert_eq!(first.derived.total_enrolments, 22.0);
        assert_eq!(first.derived.mbu_gap_index, 0.5);
        assert_eq!(first.derived.migration_intensity, 2.0);
        assert_eq!(first.derived.day_index, Some(6));
        assert_eq!(first.derived.day_of_week.as_deref(), Some("Sunday"));

        let second = &records[1];
        assert_eq!(second.raw.date, None);
        assert_eq!(second.derived.day_index, None);
        assert_eq!(second.derived.efficiency_gap, 0.0);
    }
}

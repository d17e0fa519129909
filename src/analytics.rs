//! Read-only views computed over a (filtered) enriched frame.
//!
//! Grouping runs in polars; ordering is done afterwards in Rust so that
//! ties resolve deterministically by key.

use chrono::{Days, NaiveDate};
use polars::prelude::*;

use crate::config::Thresholds;
use crate::error::InsightError;
use crate::record;
use crate::schema::{derived, identity, raw, weekday};

// ── KPI summary ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct KpiSummary {
    pub total_enrolments: f64,
    pub total_updates: f64,
    /// Distinct pincodes with a row below the MBU gap threshold
    pub compliance_risk_areas: usize,
    /// Distinct pincodes with a row above the migration threshold
    pub migration_hotspots: usize,
}

pub fn kpi_summary(frame: &DataFrame, thresholds: &Thresholds) -> Result<KpiSummary, InsightError> {
    let distinct_pincodes = |predicate: Expr, alias: &str| {
        col(identity::PINCODE)
            .filter(predicate)
            .drop_nulls()
            .n_unique()
            .cast(DataType::Int64)
            .alias(alias)
    };

    let out = frame
        .clone()
        .lazy()
        .select([
            col(derived::TOTAL_ENROLMENTS).sum().alias("enrolments"),
            col(derived::TOTAL_UPDATES).sum().alias("updates"),
            distinct_pincodes(
                col(derived::MBU_GAP_INDEX).lt(lit(thresholds.mbu_risk_below)),
                "risk",
            ),
            distinct_pincodes(
                col(derived::MIGRATION_INTENSITY).gt(lit(thresholds.migration_hotspot_above)),
                "hotspots",
            ),
        ])
        .collect()?;

    let count = |name: &str| -> Result<usize, InsightError> {
        Ok(out.column(name)?.i64()?.get(0).unwrap_or(0) as usize)
    };
    let total = |name: &str| -> Result<f64, InsightError> {
        Ok(out.column(name)?.f64()?.get(0).unwrap_or(0.0))
    };

    Ok(KpiSummary {
        total_enrolments: total("enrolments")?,
        total_updates: total("updates")?,
        compliance_risk_areas: count("risk")?,
        migration_hotspots: count("hotspots")?,
    })
}

// ── Grouping helpers ────────────────────────────────────────────────────────

/// Group by a string key, dropping null keys; returns `(key, [agg values])`.
fn grouped(
    frame: &DataFrame,
    key: &str,
    aggs: &[(&str, Expr)],
) -> Result<Vec<(String, Vec<f64>)>, InsightError> {
    let exprs: Vec<Expr> = aggs
        .iter()
        .map(|(alias, expr)| expr.clone().cast(DataType::Float64).alias(*alias))
        .collect();
    let out = frame
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg(exprs)
        .collect()?;

    let keys = out.column(key)?.str()?;
    let columns: Vec<&Float64Chunked> = aggs
        .iter()
        .map(|(alias, _)| out.column(alias).and_then(|c| c.f64()))
        .collect::<Result<_, _>>()?;

    let mut rows = Vec::with_capacity(out.height());
    for i in 0..out.height() {
        let Some(k) = keys.get(i) else { continue };
        let values: Vec<f64> = columns.iter().map(|c| c.get(i).unwrap_or(0.0)).collect();
        rows.push((k.to_string(), values));
    }
    Ok(rows)
}

/// Descending by value, ascending by key on ties.
fn rank_desc(rows: &mut [(String, f64)]) {
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

// ── Pareto ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ParetoEntry {
    pub district: String,
    pub enrolments: f64,
    /// Running share of all enrolments, in percent
    pub cumulative_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParetoReport {
    pub entries: Vec<ParetoEntry>,
    /// Percent of enrolments contributed by the head districts
    pub head_share_pct: f64,
}

pub fn pareto(frame: &DataFrame, head_fraction: f64) -> Result<ParetoReport, InsightError> {
    let mut rows: Vec<(String, f64)> = grouped(
        frame,
        identity::DISTRICT,
        &[("enrolments", col(derived::TOTAL_ENROLMENTS).sum())],
    )?
    .into_iter()
    .map(|(k, v)| (k, v[0]))
    .collect();
    rank_desc(&mut rows);

    let total: f64 = rows.iter().map(|(_, v)| v).sum();
    let mut running = 0.0;
    let entries: Vec<ParetoEntry> = rows
        .into_iter()
        .map(|(district, enrolments)| {
            running += enrolments;
            ParetoEntry {
                district,
                enrolments,
                cumulative_pct: if total > 0.0 { running / total * 100.0 } else { 0.0 },
            }
        })
        .collect();

    let head = (entries.len() as f64 * head_fraction) as usize;
    let head_volume: f64 = entries.iter().take(head).map(|e| e.enrolments).sum();
    let head_share_pct = if total > 0.0 { head_volume / total * 100.0 } else { 0.0 };

    Ok(ParetoReport {
        entries,
        head_share_pct,
    })
}

// ── Head-to-head ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RadarAxis {
    pub metric: &'static str,
    pub raw_a: f64,
    pub raw_b: f64,
    /// Scaled by max(raw_a, raw_b)
    pub scaled_a: f64,
    pub scaled_b: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadToHead {
    pub state_a: String,
    pub state_b: String,
    pub axes: Vec<RadarAxis>,
}

fn state_profile(frame: &DataFrame, state: &str) -> Result<[f64; 5], InsightError> {
    let out = frame
        .clone()
        .lazy()
        .filter(col(identity::STATE).eq(lit(state)))
        .select([
            col(derived::TOTAL_ENROLMENTS).sum(),
            col(derived::TOTAL_UPDATES).sum(),
            col(raw::AGE_0_5).sum(),
            col(derived::MIGRATION_INTENSITY).mean(),
            col(derived::WEIGHTED_EFFORT).mean(),
        ])
        .collect()?;

    let mut profile = [0.0; 5];
    for (slot, column) in profile.iter_mut().zip(out.get_columns()) {
        *slot = column
            .cast(&DataType::Float64)?
            .f64()?
            .get(0)
            .unwrap_or(0.0);
    }
    Ok(profile)
}

pub fn head_to_head(frame: &DataFrame, state_a: &str, state_b: &str) -> Result<HeadToHead, InsightError> {
    const METRICS: [&str; 5] = [
        "Volume",
        "Updates",
        "Child Enrolment",
        "Migration Score",
        "Efficiency",
    ];
    let a = state_profile(frame, state_a)?;
    let b = state_profile(frame, state_b)?;

    let axes = METRICS
        .iter()
        .enumerate()
        .map(|(i, metric)| {
            let peak = a[i].max(b[i]);
            let scale = if peak > 0.0 { peak } else { 1.0 };
            RadarAxis {
                metric: *metric,
                raw_a: a[i],
                raw_b: b[i],
                scaled_a: a[i] / scale,
                scaled_b: b[i] / scale,
            }
        })
        .collect();

    Ok(HeadToHead {
        state_a: state_a.to_string(),
        state_b: state_b.to_string(),
        axes,
    })
}

// ── Day of week ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DayOfWeekTotal {
    pub day_index: u8,
    pub day_of_week: &'static str,
    pub enrolments: f64,
}

/// Enrolment totals per weekday, Monday first; rows without a date are skipped.
pub fn day_of_week(frame: &DataFrame) -> Result<Vec<DayOfWeekTotal>, InsightError> {
    let out = frame
        .clone()
        .lazy()
        .filter(col(derived::DAY_INDEX).is_not_null())
        .group_by([col(derived::DAY_INDEX)])
        .agg([col(derived::TOTAL_ENROLMENTS).sum().alias("enrolments")])
        .collect()?;

    let index = out.column(derived::DAY_INDEX)?.i32()?;
    let totals = out.column("enrolments")?.f64()?;
    let mut days: Vec<DayOfWeekTotal> = index
        .into_iter()
        .zip(totals)
        .filter_map(|(i, total)| {
            let i = usize::try_from(i?).ok()?;
            Some(DayOfWeekTotal {
                day_index: i as u8,
                day_of_week: *weekday::NAMES.get(i)?,
                enrolments: total.unwrap_or(0.0),
            })
        })
        .collect();
    days.sort_by_key(|d| d.day_index);
    Ok(days)
}

// ── Correlation ─────────────────────────────────────────────────────────────

pub const CORRELATION_COLUMNS: [&str; 5] = [
    derived::TOTAL_ENROLMENTS,
    derived::TOTAL_UPDATES,
    raw::AGE_0_5,
    derived::MIGRATION_INTENSITY,
    derived::MBU_GAP_INDEX,
];

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<&'static str>,
    /// Row-major; `None` where a column has no variance
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| *c == a)?;
        let j = self.columns.iter().position(|c| *c == b)?;
        self.values[i][j]
    }
}

/// Pearson correlation; `None` with fewer than two points or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

pub fn correlation_matrix(frame: &DataFrame) -> Result<CorrelationMatrix, InsightError> {
    let series: Vec<Vec<f64>> = CORRELATION_COLUMNS
        .iter()
        .map(|name| -> Result<Vec<f64>, InsightError> {
            Ok(frame
                .column(name)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect())
        })
        .collect::<Result<_, _>>()?;

    let values = series
        .iter()
        .map(|x| series.iter().map(|y| pearson(x, y)).collect())
        .collect();

    Ok(CorrelationMatrix {
        columns: CORRELATION_COLUMNS.to_vec(),
        values,
    })
}

// ── Migration churn ─────────────────────────────────────────────────────────

/// Districts ranked by mean migration intensity, highest first.
pub fn migration_churn(frame: &DataFrame, top_n: usize) -> Result<Vec<(String, f64)>, InsightError> {
    let mut rows: Vec<(String, f64)> = grouped(
        frame,
        identity::DISTRICT,
        &[("migration", col(derived::MIGRATION_INTENSITY).mean())],
    )?
    .into_iter()
    .map(|(k, v)| (k, v[0]))
    .collect();
    rank_desc(&mut rows);
    rows.truncate(top_n);
    Ok(rows)
}

// ── Resource allocation ─────────────────────────────────────────────────────

pub const URGENCY_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationScore {
    pub district: String,
    pub mean_mbu_gap: f64,
    pub enrolments: f64,
    pub child_enrolments: f64,
    pub urgency: f64,
}

/// Min-max scaling to [0, 1]; a constant column scales to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}

pub fn resource_allocation(frame: &DataFrame, top_n: usize) -> Result<Vec<AllocationScore>, InsightError> {
    let rows = grouped(
        frame,
        identity::DISTRICT,
        &[
            ("mbu", col(derived::MBU_GAP_INDEX).mean()),
            ("enrolments", col(derived::TOTAL_ENROLMENTS).sum()),
            ("children", col(raw::AGE_0_5).sum()),
        ],
    )?;

    let column = |j: usize| rows.iter().map(|(_, v)| v[j]).collect::<Vec<f64>>();
    let mbu = min_max_normalize(&column(0));
    let enrolments = min_max_normalize(&column(1));
    let children = min_max_normalize(&column(2));

    let mut scores: Vec<AllocationScore> = rows
        .into_iter()
        .enumerate()
        .map(|(i, (district, v))| AllocationScore {
            district,
            mean_mbu_gap: v[0],
            enrolments: v[1],
            child_enrolments: v[2],
            urgency: URGENCY_WEIGHTS[0] * mbu[i]
                + URGENCY_WEIGHTS[1] * enrolments[i]
                + URGENCY_WEIGHTS[2] * children[i],
        })
        .collect();
    scores.sort_by(|a, b| {
        b.urgency
            .total_cmp(&a.urgency)
            .then_with(|| a.district.cmp(&b.district))
    });
    scores.truncate(top_n);
    Ok(scores)
}

// ── Daily series ────────────────────────────────────────────────────────────

/// Enrolments per calendar day over a contiguous range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// Total enrolments per valid date, gaps between first and last day filled with 0.
pub fn daily_series(frame: &DataFrame) -> Result<DailySeries, InsightError> {
    let out = frame
        .clone()
        .lazy()
        .filter(col(identity::DATE).is_not_null())
        .group_by([col(identity::DATE)])
        .agg([col(derived::TOTAL_ENROLMENTS).sum().alias("enrolments")])
        .collect()?;

    let dates = record::dates(&out)?;
    let totals = out.column("enrolments")?.f64()?;
    let mut points: Vec<(NaiveDate, f64)> = dates
        .into_iter()
        .zip(totals)
        .filter_map(|(d, v)| Some((d?, v.unwrap_or(0.0))))
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0));

    let (Some(&(first, _)), Some(&(last, _))) = (points.first(), points.last()) else {
        return Ok(DailySeries::default());
    };

    let mut series = DailySeries::default();
    let mut observed = points.into_iter().peekable();
    let mut day = first;
    while day <= last {
        let value = match observed.peek() {
            Some((d, v)) if *d == day => {
                let v = *v;
                observed.next();
                v
            }
            _ => 0.0,
        };
        series.dates.push(day);
        series.values.push(value);
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    Ok(series)
}

// ── Pincode features ────────────────────────────────────────────────────────

pub const ANOMALY_FEATURES: [&str; 3] = [
    derived::TOTAL_ENROLMENTS,
    derived::TOTAL_UPDATES,
    raw::BIO_AGE_5_17,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PincodeFeatures {
    pub pincode: String,
    /// Sums of `ANOMALY_FEATURES`, in that order
    pub values: [f64; 3],
}

pub fn pincode_features(frame: &DataFrame) -> Result<Vec<PincodeFeatures>, InsightError> {
    let aggs: Vec<(&str, Expr)> = ANOMALY_FEATURES
        .iter()
        .map(|name| (*name, col(*name).sum()))
        .collect();
    let mut rows: Vec<PincodeFeatures> = grouped(frame, identity::PINCODE, &aggs)?
        .into_iter()
        .map(|(pincode, v)| PincodeFeatures {
            pincode,
            values: [v[0], v[1], v[2]],
        })
        .collect();
    rows.sort_by(|a, b| a.pincode.cmp(&b.pincode));
    Ok(rows)
}

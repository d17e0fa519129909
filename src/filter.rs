//! Control-panel selection applied to the enriched table.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::InsightError;
use crate::schema::identity;

/// Date range and state selection chosen by the analyst.
///
/// `None` on either field selects everything along that axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMask {
    /// Inclusive on both ends
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub states: Option<Vec<String>>,
}

impl FilterMask {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = Some(states.into_iter().map(Into::into).collect());
        self
    }
}

/// Filter `frame` by `mask` without touching the source frame.
///
/// Rows with a null date never satisfy a date range.
pub fn apply_mask(frame: &DataFrame, mask: &FilterMask) -> Result<DataFrame, InsightError> {
    let mut predicate = lit(true);

    if let Some((start, end)) = mask.date_range {
        if start > end {
            return Err(InsightError::InvalidInput(format!(
                "date range start {start} is after end {end}"
            )));
        }
        predicate = predicate.and(
            col(identity::DATE)
                .gt_eq(lit(start))
                .and(col(identity::DATE).lt_eq(lit(end))),
        );
    }

    if let Some(states) = &mask.states {
        let selected = Series::new("selected_states".into(), states.clone());
        predicate = predicate.and(col(identity::STATE).is_in(lit(selected), false));
    }

    Ok(frame.clone().lazy().filter(predicate).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsightConfig;
    use crate::table::EnrichedTable;

    fn frame() -> DataFrame {
        let raw = df!(
            identity::DATE => ["01-02-2025", "15-02-2025", "01-03-2025", "??"],
            identity::STATE => ["Punjab", "Haryana", "Punjab", "Punjab"],
            identity::DISTRICT => ["Amritsar", "Hisar", "Ludhiana", "Patiala"],
            identity::PINCODE => ["143001", "125001", "141001", "147001"],
        )
        .unwrap();
        EnrichedTable::from_raw(raw, &InsightConfig::default().date_formats)
            .unwrap()
            .frame()
            .clone()
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_empty_mask_keeps_every_row() {
        let out = apply_mask(&frame(), &FilterMask::all()).unwrap();
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn test_date_range_is_inclusive_and_drops_null_dates() {
        let mask = FilterMask::all().between(day(2, 1), day(2, 15));
        let out = apply_mask(&frame(), &mask).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_state_selection() {
        let mask = FilterMask::all().states(["Punjab"]);
        let out = apply_mask(&frame(), &mask).unwrap();
        assert_eq!(out.height(), 3);

        let both = FilterMask::all()
            .between(day(2, 1), day(3, 1))
            .states(["Punjab"]);
        assert_eq!(apply_mask(&frame(), &both).unwrap().height(), 2);
    }

    #[test]
    fn test_empty_state_list_selects_nothing() {
        let mask = FilterMask::all().states(Vec::<String>::new());
        assert_eq!(apply_mask(&frame(), &mask).unwrap().height(), 0);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let mask = FilterMask::all().between(day(3, 1), day(2, 1));
        assert!(matches!(
            apply_mask(&frame(), &mask),
            Err(InsightError::InvalidInput(_))
        ));
    }
}

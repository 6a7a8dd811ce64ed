//! Daily return observations and calendar-month bucketing.

use crate::domain::error::CorrnetError;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

/// One (asset, day) log-return row. `log_return` is `None` when the source
/// row carries no value for that day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservation {
    pub asset_id: String,
    pub day: NaiveDate,
    pub log_return: Option<f64>,
}

impl DailyObservation {
    pub fn new(asset_id: impl Into<String>, day: NaiveDate, log_return: Option<f64>) -> Self {
        Self {
            asset_id: asset_id.into(),
            day,
            log_return,
        }
    }

    pub fn month(&self) -> NaiveDate {
        month_of(self.day)
    }
}

/// First day of the calendar month containing `day`.
pub fn month_of(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

pub fn is_month_start(day: NaiveDate) -> bool {
    day.day() == 1
}

/// Rejects the whole input on the first malformed row: empty asset ids,
/// non-finite returns, or a repeated (asset, day) pair.
///
/// Row numbers in errors are 1-based positions in `observations`.
pub fn validate_observations(observations: &[DailyObservation]) -> Result<(), CorrnetError> {
    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::with_capacity(observations.len());

    for (idx, obs) in observations.iter().enumerate() {
        let row = idx + 1;
        if obs.asset_id.trim().is_empty() {
            return Err(CorrnetError::InvalidObservation {
                row,
                reason: "empty asset_id".into(),
            });
        }
        if let Some(r) = obs.log_return {
            if !r.is_finite() {
                return Err(CorrnetError::InvalidObservation {
                    row,
                    reason: format!(
                        "non-finite log_return {} for asset {} on {}",
                        r, obs.asset_id, obs.day
                    ),
                });
            }
        }
        if !seen.insert((obs.asset_id.as_str(), obs.day)) {
            return Err(CorrnetError::DuplicateObservation {
                asset_id: obs.asset_id.clone(),
                day: obs.day,
            });
        }
    }

    Ok(())
}

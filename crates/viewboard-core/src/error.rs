use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    DateRange(#[from] DateRangeError),

    #[error("invalid month label {0:?}: expected \"<Month> <year>\"")]
    InvalidMonthLabel(String),
}

/// Reasons a draft date range cannot be committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("Start date must be before end date ({start} is after {end})")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("invalid {field} date {value:?}: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("both start and end date are required")]
    Incomplete,
}

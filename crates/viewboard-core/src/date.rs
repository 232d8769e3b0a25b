//! Date-range drafting and month navigation for the date picker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, DateRangeError};

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthDirection {
    Prev,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSide {
    Start,
    End,
}

/// Compute the label of the month adjacent to `current` (e.g. `"July 2025"`).
///
/// December rolls into January of the next year and January rolls back into
/// December of the previous one.
pub fn navigate_month(current: &str, direction: MonthDirection) -> Result<String, CoreError> {
    let invalid = || CoreError::InvalidMonthLabel(current.to_string());

    let (name, year) = current.trim().split_once(' ').ok_or_else(invalid)?;
    let index = MONTHS
        .iter()
        .position(|m| *m == name)
        .ok_or_else(invalid)?;
    let year: i32 = year.trim().parse().map_err(|_| invalid())?;

    let (index, year) = match (direction, index) {
        (MonthDirection::Next, 11) => (0, year + 1),
        (MonthDirection::Next, i) => (i + 1, year),
        (MonthDirection::Prev, 0) => (11, year - 1),
        (MonthDirection::Prev, i) => (i - 1, year),
    };
    Ok(format!("{} {}", MONTHS[index], year))
}

/// A committed date range. Both sides set, or neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Raw text of the two date inputs, kept exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftDateRange {
    pub start: String,
    pub end: String,
}

impl DraftDateRange {
    pub fn set(&mut self, side: DateSide, value: impl Into<String>) {
        match side {
            DateSide::Start => self.start = value.into(),
            DateSide::End => self.end = value.into(),
        }
    }

    /// Parse into a committable range. A half-filled draft is rejected.
    pub fn to_range(&self) -> Result<DateRange, DateRangeError> {
        validate_range(&self.start, &self.end)?;
        let start = parse_date("start", &self.start)?;
        let end = parse_date("end", &self.end)?;
        if start.is_some() != end.is_some() {
            return Err(DateRangeError::Incomplete);
        }
        Ok(DateRange { start, end })
    }
}

fn parse_date(field: &'static str, raw: &str) -> Result<Option<NaiveDate>, DateRangeError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| DateRangeError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

/// Check that `start` is not after `end`.
///
/// An empty side always passes; a non-empty side that is not `YYYY-MM-DD`
/// fails.
pub fn validate_range(start: &str, end: &str) -> Result<(), DateRangeError> {
    let start = parse_date("start", start)?;
    let end = parse_date("end", end)?;
    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            Err(DateRangeError::StartAfterEnd { start, end })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_from_december_rolls_year_forward() {
        let label = navigate_month("December 2025", MonthDirection::Next).expect("valid");
        assert_eq!(label, "January 2026");
    }

    #[test]
    fn prev_from_january_rolls_year_back() {
        let label = navigate_month("January 2025", MonthDirection::Prev).expect("valid");
        assert_eq!(label, "December 2024");
    }

    #[test]
    fn navigation_within_a_year() {
        assert_eq!(
            navigate_month("July 2025", MonthDirection::Next).expect("valid"),
            "August 2025"
        );
        assert_eq!(
            navigate_month("July 2025", MonthDirection::Prev).expect("valid"),
            "June 2025"
        );
    }

    #[test]
    fn twelve_steps_forward_advance_one_year() {
        let mut label = "March 2024".to_string();
        for _ in 0..12 {
            label = navigate_month(&label, MonthDirection::Next).expect("valid");
        }
        assert_eq!(label, "March 2025");
    }

    #[test]
    fn malformed_label_is_rejected() {
        for bad in ["", "July", "Juli 2025", "July twenty"] {
            assert!(matches!(
                navigate_month(bad, MonthDirection::Next),
                Err(CoreError::InvalidMonthLabel(_))
            ));
        }
    }

    #[test]
    fn start_after_end_is_invalid_with_message() {
        let err = validate_range("2025-09-10", "2025-09-01").expect_err("invalid");
        assert!(matches!(err, DateRangeError::StartAfterEnd { .. }));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn empty_and_ordered_ranges_are_valid() {
        assert!(validate_range("", "").is_ok());
        assert!(validate_range("2025-09-01", "2025-09-10").is_ok());
        assert!(validate_range("2025-09-01", "2025-09-01").is_ok());
        assert!(validate_range("2025-09-10", "").is_ok());
    }

    #[test]
    fn garbage_date_is_invalid() {
        let err = validate_range("2025-13-40", "").expect_err("invalid");
        assert!(matches!(
            err,
            DateRangeError::InvalidDate { field: "start", .. }
        ));
    }

    #[test]
    fn half_filled_draft_is_not_committable() {
        let mut draft = DraftDateRange::default();
        draft.set(DateSide::Start, "2025-09-01");
        assert_eq!(draft.to_range(), Err(DateRangeError::Incomplete));

        draft.set(DateSide::End, "2025-09-30");
        let range = draft.to_range().expect("complete");
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2025, 9, 30));
    }

    #[test]
    fn empty_draft_commits_as_empty_range() {
        let range = DraftDateRange::default().to_range().expect("empty ok");
        assert!(range.is_empty());
    }
}

//! Error types for the timeline calculator.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the workday, timeline and calendar layers.
///
/// None of these are fatal to a hosting application; every variant
/// describes a rejected input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// A workday count or window length outside its accepted range.
    #[error("invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: i64 },

    /// Stepping back `budget_days - 1` workdays from a Monday would not land
    /// on a Monday.
    #[error(
        "budget window of {budget_days} workdays cannot start on a Monday \
         (expected 1, 6, 11, ...)"
    )]
    MisalignedBudget { budget_days: i64 },

    #[error("stepping {steps} workdays from {date} leaves the supported date range")]
    OutOfRange { date: NaiveDate, steps: i64 },

    #[error("not a calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

pub type TimelineResult<T> = Result<T, TimelineError>;

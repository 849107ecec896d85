//! Business-day arithmetic over a plain Monday to Friday week.
//!
//! No holiday calendar is consulted anywhere in this module.

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};
use tracing::trace;

use crate::error::{
  TimelineError,
  TimelineResult
};

/// Workdays in a Monday to Friday week.
pub(crate) const WORKWEEK_LEN: i64 = 5;

/// Timezone-naive calendar day used throughout the calculator.
pub type CalendarDate = NaiveDate;

#[must_use]
pub fn is_workday(
  date: NaiveDate
) -> bool {
  !matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

/// Steps backward over calendar days and returns the day on which the
/// `n`th workday was reached. `n == 0` returns `date` itself.
pub fn step_back_workdays(
  date: NaiveDate,
  n: i64
) -> TimelineResult<NaiveDate> {
  walk_workdays(date, n, -1)
}

/// Forward counterpart of [`step_back_workdays`].
pub fn step_forward_workdays(
  date: NaiveDate,
  n: i64
) -> TimelineResult<NaiveDate> {
  walk_workdays(date, n, 1)
}

/// Every 7 consecutive calendar days hold exactly 5 workdays, so whole
/// weeks are skipped before walking the last 1..=5 workdays day by day.
fn walk_workdays(
  from: NaiveDate,
  n: i64,
  direction: i64
) -> TimelineResult<NaiveDate> {
  if n < 0 {
    return Err(
      TimelineError::InvalidArgument {
        what:  "workday count",
        value: n
      }
    );
  }
  if n == 0 {
    return Ok(from);
  }

  let out_of_range =
    TimelineError::OutOfRange {
      date:  from,
      steps: n * direction
    };

  let weeks = (n - 1) / WORKWEEK_LEN;
  let mut current = weeks
    .checked_mul(7 * direction)
    .and_then(|days| {
      add_days(from, days)
    })
    .ok_or_else(|| out_of_range.clone())?;
  let mut counted =
    weeks * WORKWEEK_LEN;

  while counted < n {
    current = add_days(
      current, direction
    )
    .ok_or_else(|| out_of_range.clone())?;
    if is_workday(current) {
      counted += 1;
    }
  }

  trace!(
    %from,
    n,
    direction,
    landed = %current,
    "walked workdays"
  );
  Ok(current)
}

/// The Monday on or before `date`.
pub fn previous_or_same_monday(
  date: NaiveDate
) -> TimelineResult<NaiveDate> {
  let back = i64::from(
    date
      .weekday()
      .num_days_from_monday()
  );
  add_days(date, -back).ok_or(
    TimelineError::OutOfRange {
      date,
      steps: -back
    }
  )
}

/// The Monday on or after `date`.
pub fn next_or_same_monday(
  date: NaiveDate
) -> TimelineResult<NaiveDate> {
  let ahead = (7
    - i64::from(
      date
        .weekday()
        .num_days_from_monday()
    ))
    % 7;
  add_days(date, ahead).ok_or(
    TimelineError::OutOfRange {
      date,
      steps: ahead
    }
  )
}

/// Workdays inside the inclusive range `start..=end`, in order.
pub fn workdays_between(
  start: NaiveDate,
  end: NaiveDate
) -> impl Iterator<Item = NaiveDate> {
  start
    .iter_days()
    .take_while(move |day| *day <= end)
    .filter(|day| is_workday(*day))
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  date.checked_add_signed(
    Duration::try_days(days)?
  )
}

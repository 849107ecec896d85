use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{TimelineError, TimelineResult};
use crate::workday::{
    WORKWEEK_LEN, is_workday, previous_or_same_monday, step_back_workdays,
    step_forward_workdays, workdays_between,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    Approver,
    Manager,
    Budget,
    Event,
    Review,
}

impl MilestoneKind {
    /// Order in which windows appear on the calendar.
    pub const CHRONOLOGICAL: [MilestoneKind; 5] = [
        MilestoneKind::Approver,
        MilestoneKind::Manager,
        MilestoneKind::Budget,
        MilestoneKind::Event,
        MilestoneKind::Review,
    ];

    /// Tie-break order when a day belongs to more than one window.
    pub const PRIORITY: [MilestoneKind; 5] = [
        MilestoneKind::Event,
        MilestoneKind::Approver,
        MilestoneKind::Manager,
        MilestoneKind::Budget,
        MilestoneKind::Review,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            MilestoneKind::Approver => "approver",
            MilestoneKind::Manager => "manager",
            MilestoneKind::Budget => "budget",
            MilestoneKind::Event => "event",
            MilestoneKind::Review => "review",
        }
    }

    fn priority_rank(self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(Self::PRIORITY.len())
    }
}

impl fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// One labelled span of the proposal timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneWindow {
    pub kind: MilestoneKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MilestoneWindow {
    pub fn new(kind: MilestoneKind, start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "{kind} window starts after it ends");
        Self { kind, start, end }
    }

    pub fn point(kind: MilestoneKind, date: NaiveDate) -> Self {
        Self::new(kind, date, date)
    }

    /// Whether `date` is highlighted for this window.
    ///
    /// Weekends inside a span are not part of it; the event day always is.
    pub fn contains(&self, date: NaiveDate) -> bool {
        if date < self.start || date > self.end {
            return false;
        }
        self.kind == MilestoneKind::Event || is_workday(date)
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        if self.kind == MilestoneKind::Event {
            return vec![self.start];
        }
        workdays_between(self.start, self.end).collect()
    }
}

/// Window lengths, in workdays, for each approval stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    pub approver_days: i64,
    pub manager_days: i64,
    pub budget_days: i64,
    pub review_days: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            approver_days: 3,
            manager_days: 2,
            budget_days: 6,
            review_days: 3,
        }
    }
}

impl TimelineConfig {
    /// Rejects lengths below one workday and budget windows that cannot
    /// start on a Monday when they end on one.
    pub fn validate(&self) -> TimelineResult<()> {
        for (what, value) in [
            ("approver window length", self.approver_days),
            ("manager window length", self.manager_days),
            ("budget window length", self.budget_days),
            ("review window length", self.review_days),
        ] {
            if value < 1 {
                return Err(TimelineError::InvalidArgument { what, value });
            }
        }

        if (self.budget_days - 1) % WORKWEEK_LEN != 0 {
            return Err(TimelineError::MisalignedBudget {
                budget_days: self.budget_days,
            });
        }

        Ok(())
    }

    pub fn days_for(&self, kind: MilestoneKind) -> Option<i64> {
        match kind {
            MilestoneKind::Approver => Some(self.approver_days),
            MilestoneKind::Manager => Some(self.manager_days),
            MilestoneKind::Budget => Some(self.budget_days),
            MilestoneKind::Review => Some(self.review_days),
            MilestoneKind::Event => None,
        }
    }
}

/// Result of back-chaining one event date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub event_date: NaiveDate,
    /// First day of the approver window.
    pub submit_by: NaiveDate,
    pub windows: Vec<MilestoneWindow>,
}

impl Timeline {
    pub fn window(&self, kind: MilestoneKind) -> Option<&MilestoneWindow> {
        self.windows.iter().find(|window| window.kind == kind)
    }

    /// The highlighted kind for `date`, if any.
    pub fn classify(&self, date: NaiveDate) -> Option<MilestoneKind> {
        classify_date(date, &self.windows)
    }
}

/// Linear scan of `windows`, resolving overlaps by [`MilestoneKind::PRIORITY`].
pub fn classify_date(date: NaiveDate, windows: &[MilestoneWindow]) -> Option<MilestoneKind> {
    windows
        .iter()
        .filter(|window| window.contains(date))
        .map(|window| window.kind)
        .min_by_key(|kind| kind.priority_rank())
}

#[instrument(skip(config), fields(event = %event_date))]
pub fn compute_milestones(
    event_date: NaiveDate,
    config: &TimelineConfig,
) -> TimelineResult<Timeline> {
    config.validate()?;

    let budget_end = previous_or_same_monday(step_back_workdays(event_date, 1)?)?;
    let budget_start = step_back_workdays(budget_end, config.budget_days - 1)?;

    let manager_end = step_back_workdays(budget_start, 1)?;
    let manager_start = step_back_workdays(budget_start, config.manager_days)?;

    let approver_end = step_back_workdays(manager_start, 1)?;
    let approver_start = step_back_workdays(manager_start, config.approver_days)?;

    let review_start = step_forward_workdays(event_date, 1)?;
    let review_end = step_forward_workdays(event_date, config.review_days)?;

    let windows = vec![
        MilestoneWindow::new(MilestoneKind::Approver, approver_start, approver_end),
        MilestoneWindow::new(MilestoneKind::Manager, manager_start, manager_end),
        MilestoneWindow::new(MilestoneKind::Budget, budget_start, budget_end),
        MilestoneWindow::point(MilestoneKind::Event, event_date),
        MilestoneWindow::new(MilestoneKind::Review, review_start, review_end),
    ];

    debug!(
        submit_by = %approver_start,
        budget_start = %budget_start,
        budget_end = %budget_end,
        review_end = %review_end,
        "computed milestones"
    );

    Ok(Timeline {
        event_date,
        submit_by: approver_start,
        windows,
    })
}

/// `None` when no event date has been picked yet.
pub fn plan(
    event_date: Option<NaiveDate>,
    config: &TimelineConfig,
) -> TimelineResult<Option<Timeline>> {
    match event_date {
        Some(date) => compute_milestones(date, config).map(Some),
        None => {
            debug!("no event date; timeline unavailable");
            Ok(None)
        }
    }
}

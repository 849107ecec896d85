use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{TimelineError, TimelineResult};
use crate::timeline::{MilestoneKind, MilestoneWindow, Timeline, TimelineConfig, classify_date};

pub const DEFAULT_TRAILING_MONTHS: u32 = 2;

pub const DISCLAIMER: &str = "Holidays are not considered; dates are an estimate.";

/// One month laid out on a Sunday-first grid of 7-day rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarMonthView {
    pub year: i32,
    pub month: u32,
    /// `None` pads the row before day 1 and after the last day.
    pub days: Vec<Option<u32>>,
}

impl CalendarMonthView {
    pub fn build(year: i32, month: u32) -> TimelineResult<Self> {
        let first = first_day_of_month(year, month)?;
        let leading = first.weekday().num_days_from_sunday() as usize;
        let last = days_in_month(first);

        let mut days = vec![None; leading];
        days.extend((1..=last).map(Some));
        while days.len() % 7 != 0 {
            days.push(None);
        }

        Ok(Self { year, month, days })
    }

    pub fn containing(date: NaiveDate) -> TimelineResult<Self> {
        Self::build(date.year(), date.month())
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[Option<u32>]> {
        self.days.chunks(7)
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// e.g. "June 2024".
    pub fn title(&self) -> String {
        self.date(1)
            .map(|first| first.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{:04}-{:02}", self.year, self.month))
    }
}

/// Months from the submit-by month through `trailing_months` after the event
/// month. Without a submit-by date the range starts at the event month.
#[instrument]
pub fn render_months(
    submit_by: Option<NaiveDate>,
    event_date: NaiveDate,
    trailing_months: u32,
) -> TimelineResult<Vec<CalendarMonthView>> {
    let start = submit_by.unwrap_or(event_date);
    let mut cursor = first_day_of_month(start.year(), start.month())?;
    let end = first_day_of_month(event_date.year(), event_date.month())?
        .checked_add_months(Months::new(trailing_months))
        .ok_or(TimelineError::OutOfRange {
            date: event_date,
            steps: i64::from(trailing_months),
        })?;

    let mut months = Vec::new();
    while cursor <= end {
        months.push(CalendarMonthView::build(cursor.year(), cursor.month())?);
        cursor = match cursor.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    debug!(count = months.len(), "laid out calendar months");
    Ok(months)
}

/// The single unhighlighted month shown when no timeline is available.
pub fn neutral_month(date: NaiveDate) -> TimelineResult<Vec<CalendarMonthView>> {
    Ok(vec![CalendarMonthView::containing(date)?])
}

/// Months for a computed timeline, or the neutral month around `fallback`.
pub fn months_for(
    timeline: Option<&Timeline>,
    fallback: NaiveDate,
    trailing_months: u32,
) -> TimelineResult<Vec<CalendarMonthView>> {
    match timeline {
        Some(timeline) => render_months(
            Some(timeline.submit_by),
            timeline.event_date,
            trailing_months,
        ),
        None => neutral_month(fallback),
    }
}

pub fn classify_day(
    year: i32,
    month: u32,
    day: u32,
    windows: &[MilestoneWindow],
) -> TimelineResult<Option<MilestoneKind>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(TimelineError::InvalidDate { year, month, day })?;
    Ok(classify_date(date, windows))
}

fn first_day_of_month(year: i32, month: u32) -> TimelineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(TimelineError::InvalidDate {
        year,
        month,
        day: 1,
    })
}

fn days_in_month(first: NaiveDate) -> u32 {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub kind: MilestoneKind,
    pub color: &'static str,
    pub label: String,
    /// Hover text for a highlighted cell.
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Legend {
    pub heading: &'static str,
    pub flow: &'static str,
    pub entries: Vec<LegendEntry>,
    pub disclaimer: &'static str,
}

impl Legend {
    pub fn new(config: &TimelineConfig) -> Self {
        let entries = MilestoneKind::CHRONOLOGICAL
            .into_iter()
            .map(|kind| legend_entry(kind, config))
            .collect();
        Self {
            heading: "Legend (workdays Mon-Fri)",
            flow: "Approver -> Manager -> Budget -> Event -> Review + recap",
            entries,
            disclaimer: DISCLAIMER,
        }
    }

    pub fn entry(&self, kind: MilestoneKind) -> Option<&LegendEntry> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }
}

fn legend_entry(kind: MilestoneKind, config: &TimelineConfig) -> LegendEntry {
    let days = config.days_for(kind).unwrap_or(1);
    let (color, label, tooltip) = match kind {
        MilestoneKind::Approver => (
            "amber",
            format!("Approver ({days} days)"),
            format!("Approver ({days} workdays)"),
        ),
        MilestoneKind::Manager => (
            "orange",
            format!("Manager approval ({days} days)"),
            format!("Manager approval ({days} workdays)"),
        ),
        MilestoneKind::Budget => (
            "green",
            format!("Budget processing ({days} days, starts Monday)"),
            format!("Budget processing ({days} workdays, starts Monday)"),
        ),
        MilestoneKind::Event => ("blue", "Event date".to_string(), "Event date".to_string()),
        MilestoneKind::Review => (
            "violet",
            format!("Event review + recap ({days} days after)"),
            format!("Event review + recap ({days} workdays after)"),
        ),
    };
    LegendEntry {
        kind,
        color,
        label,
        tooltip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::compute_milestones;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn grid_pads_to_sunday_and_full_weeks() {
        // June 2024 starts on a Saturday.
        let june = CalendarMonthView::build(2024, 6).expect("june");
        assert_eq!(june.days.len() % 7, 0);
        assert_eq!(june.days[..6], [None::<u32>; 6]);
        assert_eq!(june.days[6], Some(1));
        assert_eq!(june.days.iter().flatten().count(), 30);
        assert_eq!(june.weeks().count(), 6);

        // September 2024 starts on a Sunday.
        let september = CalendarMonthView::build(2024, 9).expect("september");
        assert_eq!(september.days[0], Some(1));
        assert_eq!(september.days.len(), 35);

        let february = CalendarMonthView::build(2024, 2).expect("february");
        assert_eq!(february.days.iter().flatten().max(), Some(&29));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert_eq!(
            CalendarMonthView::build(2024, 13),
            Err(TimelineError::InvalidDate {
                year: 2024,
                month: 13,
                day: 1
            })
        );
        assert!(classify_day(2024, 2, 30, &[]).is_err());
    }

    #[test]
    fn months_span_submit_by_through_two_trailing_months() {
        let timeline =
            compute_milestones(ymd(2024, 6, 21), &TimelineConfig::default()).expect("timeline");
        let months = months_for(Some(&timeline), ymd(2020, 1, 1), DEFAULT_TRAILING_MONTHS)
            .expect("months");
        let keys: Vec<_> = months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(keys, vec![(2024, 6), (2024, 7), (2024, 8)]);
    }

    #[test]
    fn months_cross_year_boundaries() {
        let timeline =
            compute_milestones(ymd(2025, 1, 6), &TimelineConfig::default()).expect("timeline");
        assert_eq!(timeline.submit_by, ymd(2024, 12, 16));

        let months = render_months(Some(timeline.submit_by), timeline.event_date, 2)
            .expect("months");
        let keys: Vec<_> = months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(keys, vec![(2024, 12), (2025, 1), (2025, 2), (2025, 3)]);
    }

    #[test]
    fn no_submit_date_starts_at_event_month() {
        let months = render_months(None, ymd(2024, 11, 15), 0).expect("months");
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].title(), "November 2024");
    }

    #[test]
    fn missing_timeline_falls_back_to_one_neutral_month() {
        let months = months_for(None, ymd(2024, 3, 9), DEFAULT_TRAILING_MONTHS).expect("months");
        assert_eq!(months.len(), 1);
        assert_eq!((months[0].year, months[0].month), (2024, 3));
    }

    #[test]
    fn classify_day_uses_window_membership() {
        let timeline =
            compute_milestones(ymd(2024, 6, 21), &TimelineConfig::default()).expect("timeline");
        let windows = &timeline.windows;
        let expect = |day, kind| {
            assert_eq!(
                classify_day(2024, 6, day, windows).expect("valid day"),
                kind,
                "june {day}"
            );
        };
        expect(3, Some(MilestoneKind::Approver));
        expect(5, Some(MilestoneKind::Approver));
        expect(6, Some(MilestoneKind::Manager));
        expect(7, Some(MilestoneKind::Manager));
        expect(8, None);
        expect(10, Some(MilestoneKind::Budget));
        expect(17, Some(MilestoneKind::Budget));
        expect(21, Some(MilestoneKind::Event));
        expect(24, Some(MilestoneKind::Review));
        expect(26, Some(MilestoneKind::Review));
        expect(27, None);
    }

    #[test]
    fn legend_reflects_configured_lengths() {
        let legend = Legend::new(&TimelineConfig {
            approver_days: 4,
            ..TimelineConfig::default()
        });
        let approver = legend.entry(MilestoneKind::Approver).expect("approver entry");
        assert_eq!(approver.color, "amber");
        assert_eq!(approver.tooltip, "Approver (4 workdays)");
        assert_eq!(
            legend.entry(MilestoneKind::Budget).map(|e| e.label.as_str()),
            Some("Budget processing (6 days, starts Monday)")
        );
        assert_eq!(legend.entries.len(), 5);
    }
}

use std::fs;

use chrono::{Datelike, NaiveDate, Weekday};
use leadtime_core::calendar::months_for;
use leadtime_core::cli::Invocation;
use leadtime_core::commands::dispatch;
use leadtime_core::config::Config;
use leadtime_core::render::Renderer;
use leadtime_core::{MilestoneKind, classify_day, compute_milestones, plan};
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn rc_file_with_include_drives_the_timeline() {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("policy.rc");
    fs::write(&extra, "timeline.budget_days = 11\n").expect("write include");
    let rc = temp.path().join("leadtimerc");
    fs::write(
        &rc,
        "# proposal policy\n\
         timeline.approver_days = 4  # one extra day for sign-off\n\
         include policy.rc\n\
         calendar.trailing_months = 1\n",
    )
    .expect("write rc");

    let mut cfg = Config::default();
    cfg.load_file(&rc).expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);

    let timeline_cfg = cfg.timeline_config().expect("timeline config");
    assert_eq!(timeline_cfg.approver_days, 4);
    assert_eq!(timeline_cfg.budget_days, 11);

    let timeline = compute_milestones(ymd(2024, 6, 21), &timeline_cfg).expect("timeline");
    let budget = timeline.window(MilestoneKind::Budget).expect("budget window");
    assert_eq!((budget.start, budget.end), (ymd(2024, 6, 3), ymd(2024, 6, 17)));
    assert_eq!(budget.start.weekday(), Weekday::Mon);
    // Manager 2024-05-30..31, approver four workdays before that.
    assert_eq!(timeline.submit_by, ymd(2024, 5, 24));

    let months = months_for(Some(&timeline), ymd(2024, 1, 1), cfg.trailing_months().expect("months"))
        .expect("calendar months");
    let keys: Vec<_> = months.iter().map(|m| (m.year, m.month)).collect();
    assert_eq!(keys, vec![(2024, 5), (2024, 6), (2024, 7)]);
    assert_eq!(
        classify_day(2024, 5, 24, &timeline.windows).expect("valid day"),
        Some(MilestoneKind::Approver)
    );
}

#[test]
fn malformed_rc_line_is_reported_with_location() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("leadtimerc");
    fs::write(&rc, "color = off\nnot a setting\n").expect("write rc");

    let mut cfg = Config::default();
    let err = cfg.load_file(&rc).expect_err("malformed line");
    assert!(err.to_string().contains(":2:"), "{err}");
}

#[test]
fn self_include_is_reported_as_a_cycle() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("leadtimerc");
    fs::write(&rc, "color = off\ninclude leadtimerc\n").expect("write rc");

    let mut cfg = Config::default();
    let err = cfg.load_file(&rc).expect_err("include cycle");
    let message = err.to_string();
    assert!(message.contains("include cycle at"), "{message}");
    assert!(message.contains(":2:"), "{message}");
}

#[test]
fn mutual_includes_are_reported_as_a_cycle() {
    let temp = tempdir().expect("tempdir");
    let first = temp.path().join("first.rc");
    let second = temp.path().join("second.rc");
    fs::write(&first, "include second.rc\n").expect("write first");
    fs::write(&second, "timeline.approver_days = 4\ninclude first.rc\n").expect("write second");

    let mut cfg = Config::default();
    let err = cfg.load_file(&first).expect_err("include cycle");
    assert!(err.to_string().contains("include cycle at"), "{err}");
}

#[test]
fn shared_include_is_not_a_cycle() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("shared.rc"), "timeline.review_days = 3\n")
        .expect("write shared");
    fs::write(temp.path().join("policy.rc"), "include shared.rc\n").expect("write policy");
    let rc = temp.path().join("leadtimerc");
    fs::write(&rc, "include shared.rc\ninclude policy.rc\n").expect("write rc");

    let mut cfg = Config::default();
    cfg.load_file(&rc).expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 4);
}

#[test]
fn missing_event_date_is_not_an_error() {
    let cfg = Config::default();
    let timeline_cfg = cfg.timeline_config().expect("timeline config");
    assert!(plan(None, &timeline_cfg).expect("plan").is_none());
}

#[test]
fn calendar_command_renders_the_whole_range() {
    let cfg = Config::default();
    let inv = Invocation::parse(&cfg, vec!["calendar".into(), "2024-06-21".into()])
        .expect("invocation");
    let mut buf = Vec::new();
    dispatch(&cfg, &Renderer::plain(), inv, ymd(2024, 5, 1), &mut buf).expect("dispatch");
    let text = String::from_utf8(buf).expect("utf8");

    assert!(text.starts_with("Submit proposal by: 2024-06-03\n"));
    for title in ["June 2024", "July 2024", "August 2024"] {
        assert!(text.contains(title), "missing {title}");
    }
    assert!(!text.contains("September 2024"));
    assert!(text.contains("Legend (workdays Mon-Fri)"));
    assert!(text.contains("Holidays are not considered"));
}

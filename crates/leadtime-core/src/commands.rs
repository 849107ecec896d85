use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::calendar::{CalendarMonthView, Legend, months_for};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{date_key, parse_date_expr, project_today};
use crate::render::Renderer;
use crate::timeline::{Timeline, TimelineConfig, plan};
use crate::workday::{
    next_or_same_monday, previous_or_same_monday, step_back_workdays, step_forward_workdays,
};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "timeline", "calendar", "export", "workdays", "monday", "show", "commands", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, renderer, inv, out))]
pub fn dispatch<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();

    debug!(command, args = ?args, %today, "dispatching command");

    match command {
        "timeline" => cmd_timeline(cfg, renderer, args, today, out),
        "calendar" => cmd_calendar(cfg, renderer, args, today, out),
        "export" => cmd_export(cfg, args, today, out),
        "workdays" => cmd_workdays(args, today, out),
        "monday" => cmd_monday(args, today, out),
        "show" => cmd_show(cfg, out),
        "commands" => cmd_commands(out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Convenience wrapper that resolves "today" in the project timezone.
pub fn dispatch_now<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    out: &mut W,
) -> anyhow::Result<()> {
    dispatch(cfg, renderer, inv, project_today(), out)
}

fn event_date_arg(args: &[String], today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    if args.is_empty() {
        return Ok(None);
    }
    let expr = args.join(" ");
    parse_date_expr(&expr, today)
        .with_context(|| format!("invalid event date: {expr}"))
        .map(Some)
}

fn planned_timeline(
    cfg: &Config,
    args: &[String],
    today: NaiveDate,
) -> anyhow::Result<(TimelineConfig, Option<Timeline>)> {
    let timeline_cfg = cfg.timeline_config()?;
    let event_date = event_date_arg(args, today)?;
    let timeline = plan(event_date, &timeline_cfg)?;
    Ok((timeline_cfg, timeline))
}

#[instrument(skip(cfg, renderer, out))]
fn cmd_timeline<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command timeline");

    let (timeline_cfg, timeline) = planned_timeline(cfg, args, today)?;
    let Some(timeline) = timeline else {
        writeln!(out, "No event date set; no timeline available.")?;
        return Ok(());
    };

    renderer.write_timeline(out, &timeline, &Legend::new(&timeline_cfg))
}

#[instrument(skip(cfg, renderer, out))]
fn cmd_calendar<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command calendar");

    let (timeline_cfg, timeline) = planned_timeline(cfg, args, today)?;
    let months = months_for(timeline.as_ref(), today, cfg.trailing_months()?)?;
    renderer.write_calendar(out, &months, timeline.as_ref(), &Legend::new(&timeline_cfg))
}

#[derive(Debug, Serialize)]
struct TimelineExport {
    config: TimelineConfig,
    timeline: Option<Timeline>,
    months: Vec<CalendarMonthView>,
    legend: Legend,
}

#[instrument(skip(cfg, out))]
fn cmd_export<W: Write>(
    cfg: &Config,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command export");

    let (timeline_cfg, timeline) = planned_timeline(cfg, args, today)?;
    let months = months_for(timeline.as_ref(), today, cfg.trailing_months()?)?;
    let export = TimelineExport {
        config: timeline_cfg,
        legend: Legend::new(&timeline_cfg),
        timeline,
        months,
    };

    let json = serde_json::to_string_pretty(&export)?;
    writeln!(out, "{json}")?;
    Ok(())
}

#[instrument(skip(out))]
fn cmd_workdays<W: Write>(args: &[String], today: NaiveDate, out: &mut W) -> anyhow::Result<()> {
    let [direction, date, count] = args else {
        return Err(anyhow!("usage: workdays back|forward <date> <count>"));
    };

    let date = parse_date_expr(date, today)?;
    let count: i64 = count
        .parse()
        .with_context(|| format!("workday count is not an integer: {count}"))?;

    let landed = match direction.as_str() {
        "back" | "backward" => step_back_workdays(date, count)?,
        "forward" | "fwd" => step_forward_workdays(date, count)?,
        other => return Err(anyhow!("unknown direction {other}; expected back or forward")),
    };

    writeln!(out, "{}", date_key(landed))?;
    Ok(())
}

#[instrument(skip(out))]
fn cmd_monday<W: Write>(args: &[String], today: NaiveDate, out: &mut W) -> anyhow::Result<()> {
    let [direction, date] = args else {
        return Err(anyhow!("usage: monday prev|next <date>"));
    };

    let date = parse_date_expr(date, today)?;
    let monday = match direction.as_str() {
        "prev" | "previous" => previous_or_same_monday(date)?,
        "next" => next_or_same_monday(date)?,
        other => return Err(anyhow!("unknown direction {other}; expected prev or next")),
    };

    writeln!(out, "{}", date_key(monday))?;
    Ok(())
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_commands<W: Write>(out: &mut W) -> anyhow::Result<()> {
    for command in known_command_names() {
        writeln!(out, "{command}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Usage: leadtime [--rc KEY=VALUE] <command> [args]\n\
         \n\
         Commands:\n\
         \x20 timeline <date>                  proposal milestones for an event\n\
         \x20 calendar [<date>]                multi-month calendar overlay\n\
         \x20 export [<date>]                  timeline, months and legend as JSON\n\
         \x20 workdays back|forward <date> <n> step n workdays (Mon-Fri)\n\
         \x20 monday prev|next <date>          snap to a Monday\n\
         \x20 show                             effective configuration\n\
         \x20 commands, help, version\n\
         \n\
         Dates: today, tomorrow, yesterday, weekday names, YYYY-MM-DD, YYYYMMDD,\n\
         +Nd, +Nw, +Nwd (workdays). Holidays are not considered."
    )?;
    Ok(())
}

use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarMonthView, Legend};
use crate::config::Config;
use crate::datetime::date_key;
use crate::timeline::{MilestoneKind, Timeline};

const WEEKDAY_LABELS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    /// Renderer that never emits escape codes.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn write_timeline<W: Write>(
        &self,
        mut out: W,
        timeline: &Timeline,
        legend: &Legend,
    ) -> anyhow::Result<()> {
        writeln!(out, "Submit proposal by: {}", date_key(timeline.submit_by))?;
        writeln!(out, "Event date: {}", date_key(timeline.event_date))?;
        writeln!(out)?;

        let headers = vec![
            "Stage".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Workdays".to_string(),
        ];

        let rows = timeline
            .windows
            .iter()
            .map(|window| {
                let label = legend
                    .entry(window.kind)
                    .map(|entry| entry.label.clone())
                    .unwrap_or_else(|| window.kind.to_string());
                vec![
                    self.paint_kind(&label, window.kind),
                    window.start.format("%a %Y-%m-%d").to_string(),
                    window.end.format("%a %Y-%m-%d").to_string(),
                    window.days().len().to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "{}", legend.disclaimer)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(months = months.len()))]
    pub fn write_calendar<W: Write>(
        &self,
        mut out: W,
        months: &[CalendarMonthView],
        timeline: Option<&Timeline>,
        legend: &Legend,
    ) -> anyhow::Result<()> {
        if let Some(timeline) = timeline {
            writeln!(out, "Submit proposal by: {}", date_key(timeline.submit_by))?;
            writeln!(out)?;
        }

        for (idx, month) in months.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", month.title())?;
            writeln!(out, "{}", WEEKDAY_LABELS.map(|label| format!("{label} ")).join(" "))?;

            for week in month.weeks() {
                let cells: Vec<String> = week
                    .iter()
                    .map(|cell| self.calendar_cell(month, *cell, timeline))
                    .collect();
                writeln!(out, "{}", cells.join(" ").trim_end())?;
            }
        }

        if let Some(timeline) = timeline {
            writeln!(out)?;
            writeln!(out, "Event date: {}", date_key(timeline.event_date))?;
            self.write_legend(&mut out, legend)?;
        }

        Ok(())
    }

    pub fn write_legend<W: Write>(&self, mut out: W, legend: &Legend) -> anyhow::Result<()> {
        writeln!(out, "{}", legend.heading)?;
        writeln!(out, "Flow: {}", legend.flow)?;
        for entry in &legend.entries {
            let swatch = self.paint_kind(&format!("[{}]", kind_mark(entry.kind)), entry.kind);
            writeln!(out, "  {swatch} {:<7} {}", entry.color, entry.label)?;
        }
        writeln!(out, "{}", legend.disclaimer)?;
        Ok(())
    }

    fn calendar_cell(
        &self,
        month: &CalendarMonthView,
        cell: Option<u32>,
        timeline: Option<&Timeline>,
    ) -> String {
        let Some(day) = cell else {
            return "   ".to_string();
        };

        let kind = timeline.and_then(|timeline| {
            month
                .date(day)
                .and_then(|date| timeline.classify(date))
        });

        match kind {
            Some(kind) if self.color => format!("{} ", self.paint_kind(&format!("{day:>2}"), kind)),
            Some(kind) => format!("{day:>2}{}", kind_mark(kind)),
            None => format!("{day:>2} "),
        }
    }

    fn paint_kind(&self, text: &str, kind: MilestoneKind) -> String {
        self.paint(text, ansi_code(kind))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn kind_mark(kind: MilestoneKind) -> char {
    match kind {
        MilestoneKind::Approver => 'a',
        MilestoneKind::Manager => 'm',
        MilestoneKind::Budget => 'b',
        MilestoneKind::Event => '*',
        MilestoneKind::Review => 'r',
    }
}

fn ansi_code(kind: MilestoneKind) -> &'static str {
    match kind {
        MilestoneKind::Approver => "30;48;5;221",
        MilestoneKind::Manager => "30;48;5;215",
        MilestoneKind::Budget => "30;48;5;114",
        MilestoneKind::Event => "1;97;48;5;26",
        MilestoneKind::Review => "30;48;5;141",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

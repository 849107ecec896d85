use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::workday::{
  step_back_workdays,
  step_forward_workdays
};

const TIMEZONE_CONFIG_FILE: &str =
  "leadtime-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "LEADTIME_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "LEADTIME_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Asia/Jakarta";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// Today's calendar date in the project
/// timezone.
#[must_use]
pub fn project_today() -> NaiveDate {
  Utc::now()
    .with_timezone(project_timezone())
    .date_naive()
}

/// `YYYY-MM-DD`, the key used for every
/// displayed date.
#[must_use]
pub fn date_key(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return tz;
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let timezone =
    match timezone_from_toml(&raw) {
      | Ok(timezone) => timezone,
      | Err(err) => {
        tracing::error!(
          file = %path.display(),
          error = %err,
          "failed parsing timezone config file"
        );
        return None;
      }
    };
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

/// Accepts either a top-level
/// `timezone` key or a `[time]` table.
fn timezone_from_toml(
  raw: &str
) -> anyhow::Result<Option<String>> {
  let parsed =
    toml::from_str::<TimezoneConfig>(
      raw
    )?;
  Ok(parsed.timezone.or_else(|| {
    parsed.time.and_then(|section| {
      section.timezone
    })
  }))
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a command-line date
/// expression relative to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  if let Some(date) =
    parse_relative_offset(&lower, today)?
  {
    return Ok(date);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if token.len() == 8
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    return NaiveDate::parse_from_str(
      token, "%Y%m%d"
    )
    .with_context(|| {
      format!(
        "invalid compact date: {token}"
      )
    });
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}. Supported: today, \
     tomorrow, yesterday, weekday \
     names (e.g. friday), +Nd/-Nd, \
     +Nw/-Nw, +Nwd/-Nwd (workdays), \
     YYYY-MM-DD, YYYYMMDD"
  ))
}

fn parse_relative_offset(
  token: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>> {
  let offset_re = Regex::new(
    r"^(?P<sign>[+-])(?P<count>\d+)(?P<unit>wd|d|w)$",
  )
  .context("invalid offset pattern")?;
  let Some(captures) =
    offset_re.captures(token)
  else {
    return Ok(None);
  };

  let count: i64 = captures["count"]
    .parse()
    .with_context(|| {
      format!(
        "offset too large: {token}"
      )
    })?;
  let backward =
    &captures["sign"] == "-";

  let date = match &captures["unit"] {
    | "wd" => {
      if backward {
        step_back_workdays(
          today, count
        )?
      } else {
        step_forward_workdays(
          today, count
        )?
      }
    }
    | unit => {
      let days = if unit == "w" {
        count.saturating_mul(7)
      } else {
        count
      };
      shift_days(
        today,
        if backward {
          -days
        } else {
          days
        }
      )?
    }
  };

  Ok(Some(date))
}

fn shift_days(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .ok_or_else(|| {
      anyhow!(
        "date offset of {days} days \
         from {date} is out of range"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    date_key,
    parse_date_expr,
    timezone_from_toml
  };

  fn today() -> NaiveDate {
    // A Tuesday.
    NaiveDate::from_ymd_opt(
      2026, 2, 17
    )
    .expect("valid today")
  }

  fn parsed(input: &str) -> String {
    date_key(
      parse_date_expr(input, today())
        .expect("parse date expr")
    )
  }

  #[test]
  fn parses_named_days() {
    assert_eq!(
      parsed("today"),
      "2026-02-17"
    );
    assert_eq!(
      parsed("Tomorrow"),
      "2026-02-18"
    );
    assert_eq!(
      parsed("yesterday"),
      "2026-02-16"
    );
  }

  #[test]
  fn parses_weekday_name() {
    assert_eq!(
      parsed("wednesday"),
      "2026-02-18"
    );
    assert_eq!(
      parsed("tue"),
      "2026-02-24"
    );
  }

  #[test]
  fn parses_absolute_dates() {
    assert_eq!(
      parsed("2024-06-21"),
      "2024-06-21"
    );
    assert_eq!(
      parsed("20240621"),
      "2024-06-21"
    );
    assert!(
      parse_date_expr(
        "20241341",
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn parses_relative_offsets() {
    assert_eq!(
      parsed("+3d"),
      "2026-02-20"
    );
    assert_eq!(
      parsed("-1w"),
      "2026-02-10"
    );
    // Tuesday + 4 workdays crosses the
    // weekend.
    assert_eq!(
      parsed("+4wd"),
      "2026-02-23"
    );
    assert_eq!(
      parsed("-2wd"),
      "2026-02-13"
    );
  }

  #[test]
  fn rejects_unknown_expressions() {
    let err = parse_date_expr(
      "someday",
      today()
    )
    .expect_err("unknown expr");
    assert!(
      err
        .to_string()
        .contains("unrecognized")
    );
  }

  #[test]
  fn reads_timezone_from_either_layout()
  {
    assert_eq!(
      timezone_from_toml(
        "timezone = \"UTC\""
      )
      .expect("flat toml"),
      Some("UTC".to_string())
    );
    assert_eq!(
      timezone_from_toml(
        "[time]\ntimezone = \
         \"Asia/Jakarta\""
      )
      .expect("table toml"),
      Some("Asia/Jakarta".to_string())
    );
    assert_eq!(
      timezone_from_toml("")
        .expect("empty toml"),
      None
    );
  }
}

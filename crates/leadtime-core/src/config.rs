use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::DEFAULT_TRAILING_MONTHS;
use crate::timeline::TimelineConfig;

const RC_ENV_VAR: &str = "LEADTIMERC";
const RC_FILE_NAME: &str =
  ".leadtimerc";

#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let defaults = TimelineConfig::default();
    let mut map = BTreeMap::new();
    for (key, value) in [
      (
        "timeline.approver_days",
        defaults.approver_days.to_string()
      ),
      (
        "timeline.manager_days",
        defaults.manager_days.to_string()
      ),
      (
        "timeline.budget_days",
        defaults.budget_days.to_string()
      ),
      (
        "timeline.review_days",
        defaults.review_days.to_string()
      ),
      (
        "calendar.trailing_months",
        DEFAULT_TRAILING_MONTHS
          .to_string()
      ),
      ("color", "on".to_string()),
      (
        "default.command",
        "help".to_string()
      )
    ] {
      map.insert(key.to_string(), value);
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading leadtimerc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no leadtimerc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      })
  }

  pub fn get_i64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<i64>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<i64>().with_context(
          || {
            format!(
              "config key {key} is \
               not an integer: {v}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// Window lengths from the
  /// `timeline.*` keys, validated.
  pub fn timeline_config(
    &self
  ) -> anyhow::Result<TimelineConfig> {
    let defaults =
      TimelineConfig::default();
    let timeline = TimelineConfig {
      approver_days: self
        .get_i64(
          "timeline.approver_days"
        )?
        .unwrap_or(
          defaults.approver_days
        ),
      manager_days:  self
        .get_i64("timeline.manager_days")?
        .unwrap_or(
          defaults.manager_days
        ),
      budget_days:   self
        .get_i64("timeline.budget_days")?
        .unwrap_or(defaults.budget_days),
      review_days:   self
        .get_i64("timeline.review_days")?
        .unwrap_or(defaults.review_days)
    };

    timeline.validate().context(
      "invalid timeline configuration"
    )?;
    Ok(timeline)
  }

  pub fn trailing_months(
    &self
  ) -> anyhow::Result<u32> {
    let Some(raw) = self.get_i64(
      "calendar.trailing_months"
    )?
    else {
      return Ok(
        DEFAULT_TRAILING_MONTHS
      );
    };
    u32::try_from(raw).map_err(|_| {
      anyhow!(
        "calendar.trailing_months \
         must be non-negative, got \
         {raw}"
      )
    })
  }

  #[tracing::instrument(skip(self))]
  pub fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    self.load_file_nested(
      path,
      &mut Vec::new()
    )
  }

  /// `chain` holds the canonical paths of the files currently being read,
  /// outermost first.
  fn load_file_nested(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    let canonical =
      fs::canonicalize(&path)
        .with_context(|| {
          format!(
            "failed to resolve {}",
            path.display()
          )
        })?;
    chain.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          let target = fs::canonicalize(
            &include_path
          )
          .with_context(|| {
            format!(
              "failed to resolve {}",
              include_path.display()
            )
          })?;
          if chain.contains(&target) {
            return Err(anyhow!(
              "include cycle at {}:{}: {}",
              path.display(),
              line_num + 1,
              include_path.display()
            ));
          }
          self.load_file_nested(
            &include_path,
            chain
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    chain.pop();
    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       leadtimerc lookup"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use super::Config;
  use crate::timeline::TimelineConfig;

  #[test]
  fn defaults_match_the_reference_policy()
  {
    let cfg = Config::default();
    assert_eq!(
      cfg
        .timeline_config()
        .expect("timeline config"),
      TimelineConfig::default()
    );
    assert_eq!(
      cfg
        .trailing_months()
        .expect("trailing months"),
      2
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color flag"),
      Some(true)
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.timeline.approver_days"
          .to_string(),
        "4".to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      ),
    ]);
    assert_eq!(
      cfg
        .timeline_config()
        .expect("timeline config")
        .approver_days,
      4
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color flag"),
      Some(false)
    );
  }

  #[test]
  fn misaligned_budget_is_a_config_error()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "timeline.budget_days".to_string(),
      "7".to_string()
    )]);
    let err = cfg
      .timeline_config()
      .expect_err("misaligned budget");
    assert!(
      format!("{err:#}")
        .contains("cannot start on a Monday")
    );
  }

  #[test]
  fn non_numeric_lengths_are_rejected() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "timeline.review_days".to_string(),
      "three".to_string()
    )]);
    assert!(
      cfg.timeline_config().is_err()
    );

    cfg.apply_overrides(vec![(
      "calendar.trailing_months"
        .to_string(),
      "-1".to_string()
    )]);
    assert!(
      cfg.trailing_months().is_err()
    );
  }

  #[test]
  fn unknown_flag_values_are_rejected() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "color".to_string(),
      "maybe".to_string()
    )]);
    assert!(
      cfg.get_bool("color").is_err()
    );
    assert_eq!(
      cfg
        .get_bool("missing.key")
        .expect("absent flag"),
      None
    );
  }
}

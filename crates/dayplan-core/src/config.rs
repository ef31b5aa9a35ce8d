use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::WeekStart;
use crate::holiday::{
  DEFAULT_BASE_URL,
  DEFAULT_COUNTRY
};
use crate::transfer::EXPORT_FILE_NAME;

const CONFIG_FILE: &str = "dayplan.toml";
const CONFIG_ENV_VAR: &str =
  "DAYPLAN_CONFIG";
const DATA_ENV_VAR: &str =
  "DAYPLAN_DATA";

fn config_true() -> bool {
  true
}

fn default_week_start() -> String {
  "sunday".to_string()
}

fn default_export_file() -> String {
  EXPORT_FILE_NAME.to_string()
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_country() -> String {
  DEFAULT_COUNTRY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HolidayConfig {
  #[serde(default = "config_true")]
  pub enabled:  bool,
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default = "default_country")]
  pub country:  String
}

impl Default for HolidayConfig {
  fn default() -> Self {
    Self {
      enabled:  true,
      base_url: default_base_url(),
      country:  default_country()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  #[serde(default)]
  pub data_dir:    Option<PathBuf>,
  #[serde(default = "config_true")]
  pub color:       bool,
  #[serde(default = "default_week_start")]
  pub week_start:  String,
  #[serde(default = "default_export_file")]
  pub export_file: String,
  #[serde(default)]
  pub holidays:    HolidayConfig,

  #[serde(skip)]
  pub loaded_from: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir:    None,
      color:       true,
      week_start:  default_week_start(),
      export_file: default_export_file(),
      holidays:    HolidayConfig::default(),
      loaded_from: None
    }
  }
}

impl Config {
  /// Resolution order: explicit path, `DAYPLAN_CONFIG`, then the user
  /// config directory. A missing file means defaults; an explicit path
  /// that does not exist is an error.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    if let Some(path) = override_path {
      if !path.exists() {
        return Err(anyhow!(
          "config file {} does not \
           exist",
          path.display()
        ));
      }
      return Self::load_file(path);
    }

    match default_config_path() {
      | Some(path) if path.exists() => {
        Self::load_file(&path)
      }
      | Some(path) => {
        debug!(
          file = %path.display(),
          "no config file; using defaults"
        );
        Ok(Self::default())
      }
      | None => {
        warn!(
          "cannot locate a config \
           directory; using defaults"
        );
        Ok(Self::default())
      }
    }
  }

  #[tracing::instrument]
  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg = Self::parse(&text)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })?;
    cfg.loaded_from =
      Some(path.to_path_buf());

    info!(
      file = %path.display(),
      week_start = %cfg.week_start,
      holidays = cfg.holidays.enabled,
      "loaded config"
    );
    Ok(cfg)
  }

  pub fn parse(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Config =
      toml::from_str(text)?;
    cfg.sanitize();
    Ok(cfg)
  }

  fn sanitize(&mut self) {
    if WeekStart::parse(&self.week_start)
      .is_none()
    {
      warn!(
        week_start = %self.week_start,
        "unknown week start; using \
         sunday"
      );
      self.week_start =
        default_week_start();
    }

    if self.export_file.trim().is_empty()
    {
      self.export_file =
        default_export_file();
    }

    if self
      .holidays
      .base_url
      .trim()
      .is_empty()
    {
      self.holidays.base_url =
        default_base_url();
    }

    if self
      .holidays
      .country
      .trim()
      .is_empty()
    {
      self.holidays.country =
        default_country();
    }
  }

  pub fn week_start(&self) -> WeekStart {
    WeekStart::parse(&self.week_start)
      .unwrap_or_default()
  }
}

fn default_config_path()
-> Option<PathBuf> {
  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir.join("dayplan").join(CONFIG_FILE)
  })
}

/// Data directory: `--data`, then `DAYPLAN_DATA`, then the config value,
/// then the platform data directory. Created when missing.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let env_dir = std::env::var(DATA_ENV_VAR)
    .ok()
    .filter(|raw| !raw.trim().is_empty())
    .map(PathBuf::from);

  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(path) = env_dir {
    expand_tilde(&path)
  } else if let Some(path) =
    cfg.data_dir.as_ref()
  {
    expand_tilde(path)
  } else {
    dirs::data_dir()
      .map(|dir| dir.join("dayplan"))
      .ok_or_else(|| {
        anyhow!(
          "cannot determine a data \
           directory; pass --data"
        )
      })?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn expand_tilde(path: &Path) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

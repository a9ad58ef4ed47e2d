use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;

/// User preferences persisted to `prefs.toml` in the platform config dir.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_key: Option<String>,
  pub theme_name: Option<String>,
  pub volume: Option<u8>,
  pub region_code: Option<String>,
  pub relevance_language: Option<String>,
  /// Seconds of playback before advancing to the next video. `0` disables.
  pub auto_advance_secs: Option<f64>,
}

/// `prefs.toml` in the platform config dir, if one can be determined.
pub fn prefs_path() -> Option<PathBuf> {
  ProjectDirs::from("", "", "genrebox").map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    prefs_path().map(|path| Self::load_from(&path)).unwrap_or_default()
  }

  pub fn load_from(path: &Path) -> Self {
    let Ok(content) = std::fs::read_to_string(path) else {
      debug!(path = %path.display(), "no prefs file, using defaults");
      return Self::default();
    };
    match toml::from_str(&content) {
      Ok(config) => config,
      Err(e) => {
        warn!(path = %path.display(), err = %e, "ignoring malformed prefs file");
        Self::default()
      }
    }
  }

  pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize prefs")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }
}

/// Values supplied on the command line (or environment) that win over `prefs.toml`.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub api_key: Option<String>,
  pub region_code: Option<String>,
  pub relevance_language: Option<String>,
  pub no_autoplay: bool,
}

/// Resolved runtime settings, built once in `main` and handed to the search
/// client and the session controller.
#[derive(Debug, Clone)]
pub struct Settings {
  pub api_key: Option<String>,
  pub search_endpoint: String,
  pub result_limit: u32,
  pub region_code: String,
  pub relevance_language: String,
  pub request_timeout: Duration,
  pub connect_timeout: Duration,
  pub cache_ttl: Duration,
  pub cache_capacity: usize,
  /// `None` disables auto-advance.
  pub auto_advance_after: Option<f64>,
  pub initial_volume: u8,
}

impl Settings {
  pub fn resolve(overrides: Overrides, config: &Config) -> Self {
    let c = constants();
    let non_empty = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let auto_advance_after = if overrides.no_autoplay {
      None
    } else {
      match config.auto_advance_secs {
        Some(secs) if secs <= 0.0 => None,
        Some(secs) => Some(secs),
        None => Some(c.auto_advance_secs),
      }
    };

    Self {
      api_key: non_empty(&overrides.api_key).or_else(|| non_empty(&config.api_key)),
      search_endpoint: c.search_endpoint.clone(),
      result_limit: c.result_limit,
      region_code: non_empty(&overrides.region_code)
        .or_else(|| non_empty(&config.region_code))
        .unwrap_or_else(|| c.region_code.clone()),
      relevance_language: non_empty(&overrides.relevance_language)
        .or_else(|| non_empty(&config.relevance_language))
        .unwrap_or_else(|| c.relevance_language.clone()),
      request_timeout: Duration::from_secs(c.request_timeout_secs),
      connect_timeout: Duration::from_secs(c.connect_timeout_secs),
      cache_ttl: Duration::from_secs(c.search_cache_ttl_secs),
      cache_capacity: c.search_cache_capacity,
      auto_advance_after,
      initial_volume: config.volume.unwrap_or(c.default_volume).min(100),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_come_from_constants() {
    let settings = Settings::resolve(Overrides::default(), &Config::default());
    assert_eq!(settings.api_key, None);
    assert_eq!(settings.region_code, "KR");
    assert_eq!(settings.relevance_language, "ko");
    assert_eq!(settings.auto_advance_after, Some(5.0));
    assert_eq!(settings.initial_volume, 50);
  }

  #[test]
  fn overrides_win_over_prefs() {
    let config = Config {
      api_key: Some("from-prefs".into()),
      region_code: Some("US".into()),
      ..Config::default()
    };
    let overrides = Overrides { api_key: Some("from-cli".into()), ..Overrides::default() };
    let settings = Settings::resolve(overrides, &config);
    assert_eq!(settings.api_key.as_deref(), Some("from-cli"));
    assert_eq!(settings.region_code, "US");
  }

  #[test]
  fn blank_api_key_falls_through() {
    let config = Config { api_key: Some("prefs-key".into()), ..Config::default() };
    let overrides = Overrides { api_key: Some("   ".into()), ..Overrides::default() };
    let settings = Settings::resolve(overrides, &config);
    assert_eq!(settings.api_key.as_deref(), Some("prefs-key"));
  }

  #[test]
  fn autoplay_can_be_disabled() {
    let zero = Config { auto_advance_secs: Some(0.0), ..Config::default() };
    assert_eq!(Settings::resolve(Overrides::default(), &zero).auto_advance_after, None);

    let flag = Overrides { no_autoplay: true, ..Overrides::default() };
    assert_eq!(Settings::resolve(flag, &Config::default()).auto_advance_after, None);

    let custom = Config { auto_advance_secs: Some(30.0), ..Config::default() };
    assert_eq!(Settings::resolve(Overrides::default(), &custom).auto_advance_after, Some(30.0));
  }

  #[test]
  fn volume_pref_is_clamped() {
    let config = Config { volume: Some(180), ..Config::default() };
    assert_eq!(Settings::resolve(Overrides::default(), &config).initial_volume, 100);
  }

  #[test]
  fn prefs_round_trip_through_disk() {
    let dir = std::env::temp_dir().join(format!("genrebox-prefs-{}", std::process::id()));
    let path = dir.join("prefs.toml");
    let config = Config { theme_name: Some("Paper".into()), volume: Some(35), ..Config::default() };
    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path), config);
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn malformed_prefs_fall_back_to_default() {
    let dir = std::env::temp_dir().join(format!("genrebox-bad-prefs-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("prefs.toml");
    std::fs::write(&path, "volume = \"loud\"").unwrap();
    assert_eq!(Config::load_from(&path), Config::default());
    let _ = std::fs::remove_dir_all(&dir);
  }
}

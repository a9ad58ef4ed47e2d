//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  /// Fixed, ordered genre catalog shown on the start screen.
  pub genres: Vec<String>,

  // Search
  pub search_endpoint: String,
  /// Query template; `{genre}` is replaced with the chosen genre label.
  pub query_template: String,
  pub result_limit: u32,
  pub region_code: String,
  pub relevance_language: String,
  pub request_timeout_secs: u64,
  pub connect_timeout_secs: u64,
  pub search_cache_ttl_secs: u64,
  /// Most result pages the search cache holds before evicting.
  pub search_cache_capacity: usize,

  // Playback
  pub auto_advance_secs: f64,
  pub default_volume: u8,
  pub volume_step: u8,
  pub watch_url_prefix: String,

  // Result grid
  pub sentinel_visibility: f64,
  pub sentinel_rows: u16,
  pub card_width: u16,
  pub card_height: u16,

  // Status line
  pub error_dismiss_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.genres.len(), 9);
    assert_eq!(c.genres[3], "lofi");
    assert!(c.query_template.contains("{genre}"));
    assert_eq!(c.result_limit, 12);
  }

  #[test]
  fn sentinel_threshold_is_a_fraction() {
    let c = constants();
    assert!(c.sentinel_visibility > 0.0 && c.sentinel_visibility <= 1.0);
    assert!(c.sentinel_rows > 0);
  }
}

//! Error types for search and session operations.

use thiserror::Error;

/// A search request that did not produce a page of results.
///
/// Carries strings rather than the underlying `reqwest::Error` so it can be
/// cloned into session events and shown in the status line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
  /// No API key was configured for the search endpoint
  #[error("no YouTube API key configured")]
  MissingApiKey,

  /// The request did not complete within the configured timeout
  #[error("search request timed out")]
  Timeout,

  /// Connection, TLS or transport failure
  #[error("network error: {0}")]
  Network(String),

  /// The API answered with a non-success status
  #[error("search API returned {status}: {message}")]
  Status { status: u16, message: String },

  /// The response body could not be decoded
  #[error("malformed search response: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for SearchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      SearchError::Timeout
    } else if err.is_decode() {
      SearchError::Decode(err.to_string())
    } else {
      SearchError::Network(err.to_string())
    }
  }
}

/// Failures local to a single session operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
  #[error("unable to load videos: {0}")]
  SearchFailed(#[from] SearchError),

  /// Caller asked to play an id that is not in the current results
  #[error("no video with id '{0}' in the current results")]
  InvalidSelection(String),

  #[error("playback failed: {0}")]
  Playback(String),
}

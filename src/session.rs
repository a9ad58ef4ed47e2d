//! Playlist session controller.
//!
//! Owns everything about the current genre session: the result sequence,
//! the pagination cursor, what is playing, volume/mute, and favorites.
//! All mutation happens on the UI task; search responses and playback
//! progress come back as [`SessionEvent`]s through a single queue, so the
//! controller never needs a lock.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::config::Settings;
use crate::constants::constants;
use crate::error::{SearchError, SessionError};
use crate::player::{PlaybackEngine, PlaybackTicket};
use crate::youtube::{SearchPage, SearchRequest, VideoSearchProvider, VideoSummary};

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
  mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
  First,
  More,
}

/// Everything that can happen to a session outside of a direct user action.
#[derive(Debug)]
pub enum SessionEvent {
  /// A search task finished. `session` is the token it was dispatched under.
  SearchCompleted { session: u64, kind: PageKind, result: Result<SearchPage, SearchError> },
  /// Playback position of the video started under `ticket`.
  Progress { ticket: PlaybackTicket, elapsed: f64 },
  /// The video started under `ticket` played to the end.
  PlaybackFinished { ticket: PlaybackTicket },
  /// The engine could not play the video started under `ticket`.
  PlaybackFailed { ticket: PlaybackTicket, message: String },
  /// The grid's scroll sentinel came into view.
  SentinelVisible,
}

/// State-changed notification for views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
  /// Genre changed or the session was torn down.
  Reset,
  /// A page request went out.
  Loading,
  /// The first page arrived or another page was appended.
  PageLoaded,
  Playback,
  Favorites,
  Error,
}

/// Progress of the first page for the current genre.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
  Idle,
  Loading,
  Ready,
  Failed(SearchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
  /// Index into the result sequence.
  pub current: Option<usize>,
  pub is_playing: bool,
  /// 0–100.
  pub volume: u8,
  pub is_muted: bool,
  pub elapsed: f64,
}

impl PlaybackState {
  fn new(volume: u8) -> Self {
    Self { current: None, is_playing: false, volume: volume.min(100), is_muted: volume == 0, elapsed: 0.0 }
  }
}

/// Expand the query template for a genre label.
pub fn genre_query(template: &str, genre: &str) -> String {
  template.replace("{genre}", genre)
}

pub struct SessionController<P, E> {
  provider: Arc<P>,
  engine: E,
  events: EventSender,
  changes: broadcast::Sender<SessionChange>,
  settings: Settings,
  session: u64,
  genre: Option<String>,
  query: Option<String>,
  videos: Vec<VideoSummary>,
  cursor: Option<String>,
  load_state: LoadState,
  loading_more: bool,
  /// The last page request failed; `retry` asks for it again.
  page_failed: bool,
  playback: PlaybackState,
  favorites: HashSet<String>,
  ticket: PlaybackTicket,
  /// Set once the current ticket has advanced, so a burst of late ticks
  /// can't advance twice.
  advanced: bool,
  last_error: Option<SessionError>,
}

impl<P: VideoSearchProvider, E: PlaybackEngine> SessionController<P, E> {
  pub fn new(provider: Arc<P>, engine: E, events: EventSender, settings: Settings) -> Self {
    let (changes, _) = broadcast::channel(64);
    let playback = PlaybackState::new(settings.initial_volume);
    Self {
      provider,
      engine,
      events,
      changes,
      settings,
      session: 0,
      genre: None,
      query: None,
      videos: Vec::new(),
      cursor: None,
      load_state: LoadState::Idle,
      loading_more: false,
      page_failed: false,
      playback,
      favorites: HashSet::new(),
      ticket: PlaybackTicket::default(),
      advanced: false,
      last_error: None,
    }
  }

  // --- Observers ---

  /// Subscribe to state-changed notifications. Dropping the receiver
  /// unsubscribes.
  pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
    self.changes.subscribe()
  }

  fn notify(&self, change: SessionChange) {
    // No subscribers is fine.
    let _ = self.changes.send(change);
  }

  pub fn genre(&self) -> Option<&str> {
    self.genre.as_deref()
  }

  pub fn videos(&self) -> &[VideoSummary] {
    &self.videos
  }

  pub fn playback(&self) -> &PlaybackState {
    &self.playback
  }

  pub fn current_index(&self) -> Option<usize> {
    self.playback.current
  }

  pub fn current_video(&self) -> Option<&VideoSummary> {
    self.playback.current.and_then(|i| self.videos.get(i))
  }

  pub fn load_state(&self) -> &LoadState {
    &self.load_state
  }

  pub fn is_loading_more(&self) -> bool {
    self.loading_more
  }

  pub fn has_more(&self) -> bool {
    self.cursor.is_some()
  }

  pub fn is_favorite(&self, video_id: &str) -> bool {
    self.favorites.contains(video_id)
  }

  pub fn favorite_count(&self) -> usize {
    self.favorites.len()
  }

  /// Hand the pending error to the view; it is shown once.
  pub fn take_error(&mut self) -> Option<SessionError> {
    self.last_error.take()
  }

  /// Effective output level for the engine, `0.0..=1.0`.
  pub fn output_volume(&self) -> f32 {
    if self.playback.is_muted { 0.0 } else { f32::from(self.playback.volume) / 100.0 }
  }

  fn record_error(&mut self, err: SessionError) {
    self.last_error = Some(err);
    self.notify(SessionChange::Error);
  }

  // --- Session lifecycle ---

  pub async fn select_genre(&mut self, genre: &str) {
    self.reset_session().await;
    let query = genre_query(&constants().query_template, genre);
    info!(genre, session = self.session, "session: genre selected");
    self.genre = Some(genre.to_string());
    self.query = Some(query);
    self.load_state = LoadState::Loading;
    self.dispatch(PageKind::First, None);
    self.notify(SessionChange::Reset);
  }

  pub async fn go_back_to_genre_selection(&mut self) {
    info!(session = self.session, "session: back to genre selection");
    self.reset_session().await;
    self.notify(SessionChange::Reset);
  }

  /// Re-run a failed search for the current genre: the first page, or the
  /// page after the current results when only that request failed.
  pub fn retry(&mut self) -> bool {
    if self.page_failed {
      info!(genre = ?self.genre, "session: retrying page request");
      self.last_error = None;
      return self.load_more_results();
    }
    if !matches!(self.load_state, LoadState::Failed(_)) || self.query.is_none() {
      return false;
    }
    info!(genre = ?self.genre, "session: retrying search");
    self.load_state = LoadState::Loading;
    self.last_error = None;
    self.dispatch(PageKind::First, None);
    self.notify(SessionChange::Loading);
    true
  }

  /// Fetch the next page. Returns `false` when there is nothing to load or a
  /// page request is already in flight.
  pub fn load_more_results(&mut self) -> bool {
    if self.loading_more {
      trace!("session: page request already in flight");
      return false;
    }
    if self.load_state != LoadState::Ready {
      return false;
    }
    let Some(cursor) = self.cursor.clone() else {
      return false;
    };
    debug!(session = self.session, cursor = %cursor, "session: loading more results");
    self.loading_more = true;
    self.page_failed = false;
    self.dispatch(PageKind::More, Some(cursor));
    self.notify(SessionChange::Loading);
    true
  }

  async fn reset_session(&mut self) {
    self.session += 1;
    self.genre = None;
    self.query = None;
    self.videos.clear();
    self.cursor = None;
    self.load_state = LoadState::Idle;
    self.loading_more = false;
    self.page_failed = false;
    self.last_error = None;
    self.clear_playback().await;
  }

  async fn clear_playback(&mut self) {
    let was_loaded = self.playback.current.is_some();
    self.playback.current = None;
    self.playback.is_playing = false;
    self.playback.elapsed = 0.0;
    self.issue_ticket();
    if was_loaded && let Err(e) = self.engine.stop().await {
      warn!(err = %e, "session: failed to stop playback");
    }
  }

  fn issue_ticket(&mut self) -> PlaybackTicket {
    self.ticket = PlaybackTicket(self.ticket.0 + 1);
    self.advanced = false;
    self.ticket
  }

  fn dispatch(&self, kind: PageKind, page_token: Option<String>) {
    let Some(query) = self.query.clone() else { return };
    let request = SearchRequest {
      query,
      page_token,
      max_results: self.settings.result_limit,
      region_code: self.settings.region_code.clone(),
      relevance_language: self.settings.relevance_language.clone(),
    };
    let provider = Arc::clone(&self.provider);
    let events = self.events.clone();
    let session = self.session;
    let timeout = self.settings.request_timeout;

    tokio::spawn(async move {
      let result = match tokio::time::timeout(timeout, provider.search(&request)).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout),
      };
      let _ = events.send(SessionEvent::SearchCompleted { session, kind, result });
    });
  }

  // --- Events ---

  pub async fn handle_event(&mut self, event: SessionEvent) {
    match event {
      SessionEvent::SearchCompleted { session, kind, result } => self.on_search_completed(session, kind, result),
      SessionEvent::Progress { ticket, elapsed } => self.on_progress(ticket, elapsed).await,
      SessionEvent::PlaybackFinished { ticket } => self.on_playback_finished(ticket).await,
      SessionEvent::PlaybackFailed { ticket, message } => self.on_playback_failed(ticket, message),
      SessionEvent::SentinelVisible => {
        self.load_more_results();
      }
    }
  }

  fn on_search_completed(&mut self, session: u64, kind: PageKind, result: Result<SearchPage, SearchError>) {
    if session != self.session {
      debug!(stale = session, current = self.session, ?kind, "session: discarding stale search response");
      return;
    }

    match (kind, result) {
      (PageKind::First, Ok(page)) => {
        info!(genre = ?self.genre, items = page.items.len(), has_more = page.next_page_token.is_some(), "session: first page");
        self.videos = page.items;
        self.cursor = page.next_page_token;
        self.load_state = LoadState::Ready;
        self.notify(SessionChange::PageLoaded);
      }
      (PageKind::First, Err(e)) => {
        warn!(genre = ?self.genre, err = %e, "session: search failed");
        self.load_state = LoadState::Failed(e.clone());
        self.record_error(SessionError::SearchFailed(e));
      }
      (PageKind::More, Ok(page)) => {
        self.loading_more = false;
        info!(
          appended = page.items.len(),
          total = self.videos.len() + page.items.len(),
          has_more = page.next_page_token.is_some(),
          "session: page appended"
        );
        self.videos.extend(page.items);
        self.cursor = page.next_page_token;
        self.notify(SessionChange::PageLoaded);
      }
      (PageKind::More, Err(e)) => {
        self.loading_more = false;
        self.page_failed = true;
        warn!(err = %e, "session: loading more failed");
        self.record_error(SessionError::SearchFailed(e));
      }
    }
  }

  pub async fn on_progress(&mut self, ticket: PlaybackTicket, elapsed: f64) {
    if ticket != self.ticket || self.playback.current.is_none() {
      trace!(ticket = ticket.0, current = self.ticket.0, "session: ignoring stale progress");
      return;
    }
    self.playback.elapsed = elapsed.max(0.0);
    self.notify(SessionChange::Playback);

    if let Some(threshold) = self.settings.auto_advance_after
      && !self.advanced
      && elapsed >= threshold
    {
      self.advanced = true;
      info!(elapsed, threshold, "session: auto-advance");
      self.step(true).await;
    }
  }

  pub async fn on_playback_finished(&mut self, ticket: PlaybackTicket) {
    if ticket != self.ticket || self.playback.current.is_none() || self.advanced {
      return;
    }
    self.advanced = true;
    debug!(ticket = ticket.0, "session: video ended");
    self.step(true).await;
  }

  /// The engine gave up on the current video. Playback stops there; the
  /// user picks what to do next.
  pub fn on_playback_failed(&mut self, ticket: PlaybackTicket, message: String) {
    if ticket != self.ticket || self.playback.current.is_none() {
      return;
    }
    error!(ticket = ticket.0, err = %message, "session: video failed to load");
    self.playback.is_playing = false;
    self.advanced = true;
    self.notify(SessionChange::Playback);
    self.record_error(SessionError::Playback(message));
  }

  // --- Playback ---

  /// Play the first video in the current results with this id.
  ///
  /// An id that isn't in the results is a caller bug: debug builds panic,
  /// release builds log it and return `InvalidSelection` without touching
  /// playback.
  pub async fn select_video(&mut self, video_id: &str) -> Result<(), SessionError> {
    match self.videos.iter().position(|v| v.id == video_id) {
      Some(index) => self.play_index(index).await,
      None => {
        error!(video_id, "session: selected video is not in the current results");
        debug_assert!(cfg!(test), "selected video {video_id} is not in the current results");
        Err(SessionError::InvalidSelection(video_id.to_string()))
      }
    }
  }

  async fn play_index(&mut self, index: usize) -> Result<(), SessionError> {
    let Some(video) = self.videos.get(index) else {
      return Err(SessionError::InvalidSelection(format!("#{}", index)));
    };
    let video_id = video.id.clone();
    let ticket = self.issue_ticket();
    self.playback.current = Some(index);
    self.playback.is_playing = true;
    self.playback.elapsed = 0.0;
    info!(index, video_id = %video_id, ticket = ticket.0, "session: playing");

    let volume = self.output_volume();
    let result = self.engine.load(ticket, &video_id, volume, false).await;
    self.notify(SessionChange::Playback);
    if let Err(e) = result {
      error!(err = %e, video_id = %video_id, "session: playback engine failed");
      self.playback.is_playing = false;
      let err = SessionError::Playback(format!("{:#}", e));
      self.record_error(err.clone());
      return Err(err);
    }
    Ok(())
  }

  /// Move to the next (or previous) item, wrapping around the ends.
  async fn step(&mut self, forward: bool) {
    let Some(current) = self.playback.current else { return };
    let len = self.videos.len();
    if len == 0 {
      return;
    }
    let next = if forward { (current + 1) % len } else { (current + len - 1) % len };
    // Failures are already recorded for the view.
    let _ = self.play_index(next).await;
  }

  pub async fn skip_next(&mut self) {
    self.step(true).await;
  }

  pub async fn skip_previous(&mut self) {
    self.step(false).await;
  }

  pub async fn toggle_play_pause(&mut self) {
    if self.playback.current.is_none() {
      return;
    }
    self.playback.is_playing = !self.playback.is_playing;
    debug!(playing = self.playback.is_playing, "session: play/pause");
    if let Err(e) = self.engine.set_paused(!self.playback.is_playing).await {
      self.record_error(SessionError::Playback(format!("{:#}", e)));
    }
    self.notify(SessionChange::Playback);
  }

  /// Set the volume level. `0` also mutes; any other level unmutes.
  pub async fn set_volume(&mut self, level: u8) {
    let level = level.min(100);
    self.playback.volume = level;
    self.playback.is_muted = level == 0;
    self.apply_volume().await;
  }

  pub async fn adjust_volume(&mut self, delta: i16) {
    let level = (i16::from(self.playback.volume) + delta).clamp(0, 100) as u8;
    self.set_volume(level).await;
  }

  /// Flip mute without touching the stored level.
  pub async fn toggle_mute(&mut self) {
    self.playback.is_muted = !self.playback.is_muted;
    self.apply_volume().await;
  }

  async fn apply_volume(&mut self) {
    if self.playback.current.is_some()
      && let Err(e) = self.engine.set_volume(self.output_volume()).await
    {
      self.record_error(SessionError::Playback(format!("{:#}", e)));
    }
    self.notify(SessionChange::Playback);
  }

  // --- Favorites ---

  /// Returns whether the video is a favorite afterwards.
  pub fn toggle_favorite(&mut self, video_id: &str) -> bool {
    let now_favorite = if self.favorites.remove(video_id) {
      false
    } else {
      self.favorites.insert(video_id.to_string());
      true
    };
    debug!(video_id, now_favorite, "session: favorite toggled");
    self.notify(SessionChange::Favorites);
    now_favorite
  }

  pub async fn shutdown(&mut self) {
    self.clear_playback().await;
  }
}

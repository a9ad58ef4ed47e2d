use anyhow::Result;
use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::cache::CachedSearch;
use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::error::SessionError;
use crate::player::MpvEngine;
use crate::sentinel::{RowSpan, ScrollSentinel};
use crate::session::{EventReceiver, EventSender, LoadState, SessionChange, SessionController, SessionEvent, event_channel};
use crate::theme::{THEMES, Theme, theme_index};
use crate::youtube::{YouTubeClient, fetch_thumbnail};

// --- Types ---

pub type Session = SessionController<CachedSearch<YouTubeClient>, MpvEngine>;
type ThumbnailResult = (String, Result<DynamicImage>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  Genres,
  Browse,
}

/// Selection and scroll position of the result grid, in grid lines.
///
/// `columns` and `viewport_h` are written by the renderer on every draw.
#[derive(Debug, Clone, Default)]
pub struct GridState {
  pub selected: usize,
  pub scroll: u32,
  pub columns: usize,
  pub viewport_h: u32,
}

impl GridState {
  fn card_h() -> u32 {
    u32::from(constants().card_height).max(1)
  }

  fn cols(&self) -> usize {
    self.columns.max(1)
  }

  /// Total lines of cards, not counting the sentinel.
  pub fn content_lines(&self, len: usize) -> u32 {
    len.div_ceil(self.cols()) as u32 * Self::card_h()
  }

  pub fn sentinel_span(&self, len: usize) -> RowSpan {
    RowSpan::new(self.content_lines(len), u32::from(constants().sentinel_rows))
  }

  pub fn viewport(&self) -> RowSpan {
    RowSpan::new(self.scroll, self.viewport_h)
  }

  /// Rows of cards that fit on screen, at least one.
  pub fn visible_rows(&self) -> usize {
    (self.viewport_h / Self::card_h()).max(1) as usize
  }

  /// Move the selection by `delta` cards, clamped to the results.
  pub fn step(&mut self, len: usize, delta: isize) {
    if len == 0 {
      self.selected = 0;
      return;
    }
    self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
  }

  /// Scroll so the selected card is on screen. The sentinel counts as part
  /// of the last row, so selecting a card there brings it into view.
  pub fn ensure_visible(&mut self, len: usize) {
    if len == 0 {
      self.selected = 0;
      self.scroll = 0;
      return;
    }
    self.selected = self.selected.min(len - 1);
    let card_h = Self::card_h();
    let row = (self.selected / self.cols()) as u32;
    let last_row = ((len - 1) / self.cols()) as u32;
    let top = row * card_h;
    let mut bottom = top + card_h;
    if row == last_row {
      bottom += u32::from(constants().sentinel_rows);
    }
    let view = self.viewport_h.max(1);
    if top < self.scroll {
      self.scroll = top;
    } else if bottom > self.scroll + view {
      self.scroll = bottom.saturating_sub(view).min(top);
    }
  }
}

pub struct App {
  pub screen: Screen,
  pub theme_index: usize,
  pub genre_state: ListState,
  pub grid: GridState,
  pub sentinel: ScrollSentinel,
  pub session: Session,
  pub display_mode: DisplayMode,
  pub last_error: Option<String>,
  pub should_quit: bool,
  /// Thumbnail of the playing video, keyed by video id.
  pub thumbnail: Option<(String, DynamicImage)>,
  /// `thumbnail` resized for the last area it was drawn into.
  pub resized_thumb: Option<(String, Rect, DynamicImage)>,
  events_tx: EventSender,
  events_rx: EventReceiver,
  changes: broadcast::Receiver<SessionChange>,
  http: Client,
  thumb_rx: Option<oneshot::Receiver<ThumbnailResult>>,
  thumb_pending: Option<String>,
  config: Config,
  prefs_path: Option<PathBuf>,
  error_time: Option<Instant>,
}

impl App {
  /// Wire up the search client, playback engine and session controller.
  /// `prefs_path` is where theme and volume changes are saved; `None` keeps
  /// them in memory.
  pub fn new(settings: Settings, config: Config, prefs_path: Option<PathBuf>, display_mode: DisplayMode) -> Result<Self> {
    let (events_tx, events_rx) = event_channel();
    let client = YouTubeClient::new(&settings)?;
    let http = client.http_client();
    let provider = Arc::new(CachedSearch::new(client, settings.cache_ttl, settings.cache_capacity));
    let engine = MpvEngine::new(events_tx.clone());
    let session = SessionController::new(provider, engine, events_tx.clone(), settings);
    let changes = session.subscribe();

    let mut genre_state = ListState::default();
    genre_state.select(Some(0));

    Ok(Self {
      screen: Screen::Genres,
      theme_index: theme_index(config.theme_name.as_deref()),
      genre_state,
      grid: GridState::default(),
      sentinel: ScrollSentinel::detached(),
      session,
      display_mode,
      last_error: None,
      should_quit: false,
      thumbnail: None,
      resized_thumb: None,
      events_tx,
      events_rx,
      changes,
      http,
      thumb_rx: None,
      thumb_pending: None,
      config,
      prefs_path,
      error_time: None,
    })
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.save_config();
  }

  fn save_config(&self) {
    if let Some(path) = &self.prefs_path
      && let Err(e) = self.config.save_to(path)
    {
      warn!(err = %e, "failed to save prefs");
    }
  }

  // --- Errors ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.clear_error();
    }
  }

  // --- Screens ---

  pub fn selected_genre_index(&self) -> usize {
    self.genre_state.selected().unwrap_or(0)
  }

  pub async fn open_genre(&mut self, index: usize) {
    let Some(genre) = constants().genres.get(index) else { return };
    info!(genre = %genre, "genre chosen");
    self.genre_state.select(Some(index));
    self.clear_error();
    self.session.select_genre(genre).await;
    self.screen = Screen::Browse;
    self.grid = GridState { columns: self.grid.columns, viewport_h: self.grid.viewport_h, ..GridState::default() };
    self.sentinel = ScrollSentinel::new(constants().sentinel_visibility);
    self.clear_thumbnail();
  }

  pub async fn back_to_genres(&mut self) {
    self.session.go_back_to_genre_selection().await;
    self.screen = Screen::Genres;
    self.sentinel.detach();
    self.clear_error();
    self.clear_thumbnail();
  }

  // --- Grid actions ---

  pub fn move_selection(&mut self, delta: isize) {
    let len = self.session.videos().len();
    self.grid.step(len, delta);
    self.grid.ensure_visible(len);
  }

  pub fn page_delta(&self) -> isize {
    (self.grid.cols() * self.grid.visible_rows()) as isize
  }

  pub fn row_delta(&self) -> isize {
    self.grid.cols() as isize
  }

  pub fn selected_video_id(&self) -> Option<String> {
    self.session.videos().get(self.grid.selected).map(|v| v.id.clone())
  }

  pub async fn play_selected(&mut self) {
    let Some(id) = self.selected_video_id() else { return };
    // Engine failures arrive as a session error notification.
    if let Err(e @ SessionError::InvalidSelection(_)) = self.session.select_video(&id).await {
      self.set_error(e.to_string());
    }
  }

  pub fn toggle_selected_favorite(&mut self) {
    if let Some(id) = self.selected_video_id() {
      self.session.toggle_favorite(&id);
    }
  }

  pub async fn change_volume(&mut self, delta: i16) {
    self.session.adjust_volume(delta).await;
    self.config.volume = Some(self.session.playback().volume);
    self.save_config();
  }

  pub fn retry(&mut self) {
    if self.session.retry() {
      self.clear_error();
    }
  }

  // --- Event pump ---

  /// Drain session events and change notifications. Called once per tick
  /// before drawing.
  pub async fn pump(&mut self) {
    while let Ok(event) = self.events_rx.try_recv() {
      self.session.handle_event(event).await;
    }

    loop {
      match self.changes.try_recv() {
        Ok(change) => self.on_change(change),
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          debug!(skipped, "session notifications lagged");
          self.on_change(SessionChange::PageLoaded);
          self.on_change(SessionChange::Playback);
          self.on_change(SessionChange::Error);
        }
        Err(_) => break,
      }
    }

    self.check_thumbnail();
    self.expire_error();
  }

  fn on_change(&mut self, change: SessionChange) {
    match change {
      SessionChange::PageLoaded => {
        self.sentinel.rearm();
        self.grid.ensure_visible(self.session.videos().len());
      }
      SessionChange::Playback => self.request_thumbnail(),
      SessionChange::Error => {
        if let Some(err) = self.session.take_error() {
          self.set_error(err.to_string());
        }
      }
      SessionChange::Reset | SessionChange::Loading | SessionChange::Favorites => {}
    }
  }

  /// Check the sentinel against the last drawn viewport. Called after each draw.
  pub fn observe_sentinel(&mut self) {
    if !self.sentinel.is_attached() || self.session.load_state() != &LoadState::Ready {
      return;
    }
    let span = self.grid.sentinel_span(self.session.videos().len());
    if self.sentinel.observe(self.grid.viewport(), span) && self.session.has_more() {
      debug!(scroll = self.grid.scroll, "sentinel visible");
      let _ = self.events_tx.send(SessionEvent::SentinelVisible);
    }
  }

  // --- Thumbnails ---

  fn clear_thumbnail(&mut self) {
    self.thumbnail = None;
    self.resized_thumb = None;
    self.thumb_rx = None;
    self.thumb_pending = None;
  }

  fn request_thumbnail(&mut self) {
    let Some(video) = self.session.current_video() else { return };
    let loaded = self.thumbnail.as_ref().is_some_and(|(id, _)| *id == video.id);
    if loaded || self.thumb_pending.as_deref() == Some(video.id.as_str()) {
      return;
    }
    let video = video.clone();
    let client = self.http.clone();
    self.thumb_pending = Some(video.id.clone());

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = fetch_thumbnail(&client, &video).await;
      let _ = tx.send((video.id, result));
    });
    self.thumb_rx = Some(rx);
  }

  fn check_thumbnail(&mut self) {
    let Some(mut rx) = self.thumb_rx.take() else { return };
    match rx.try_recv() {
      Ok((id, result)) => {
        self.thumb_pending = None;
        let current = self.session.current_video().is_some_and(|v| v.id == id);
        match result {
          Ok(image) if current => {
            self.thumbnail = Some((id, image));
            self.resized_thumb = None;
          }
          Ok(_) => {}
          // Missing thumbnails just leave the player bar without art.
          Err(e) => debug!(err = %e, video_id = %id, "thumbnail unavailable"),
        }
        // The current video may have moved on while this one downloaded.
        self.request_thumbnail();
      }
      Err(oneshot::error::TryRecvError::Empty) => {
        self.thumb_rx = Some(rx);
      }
      Err(oneshot::error::TryRecvError::Closed) => {
        self.thumb_pending = None;
      }
    }
  }

  pub async fn shutdown(&mut self) {
    self.session.shutdown().await;
  }
}

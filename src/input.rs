use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, Screen};
use crate::constants::constants;

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.screen {
    Screen::Genres => handle_genre_key(app, key).await,
    Screen::Browse => handle_grid_key(app, key).await,
  }
}

/// Index after moving `delta` steps through a list of `count`, wrapping at
/// both ends.
pub fn wrap_index(current: usize, count: usize, delta: isize) -> usize {
  if count == 0 {
    return 0;
  }
  (current as isize + delta).rem_euclid(count as isize) as usize
}

async fn handle_genre_key(app: &mut App, key: event::KeyEvent) {
  let count = constants().genres.len();
  match key.code {
    KeyCode::Enter => {
      let index = app.selected_genre_index();
      app.open_genre(index).await;
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let i = wrap_index(app.selected_genre_index(), count, 1);
      app.genre_state.select(Some(i));
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let i = wrap_index(app.selected_genre_index(), count, -1);
      app.genre_state.select(Some(i));
    }
    KeyCode::Esc | KeyCode::Char('q') => {
      app.should_quit = true;
    }
    _ => {}
  }
}

async fn handle_grid_key(app: &mut App, key: event::KeyEvent) {
  let step = i16::from(constants().volume_step);
  match key.code {
    KeyCode::Enter => app.play_selected().await,
    KeyCode::Char(' ') => app.session.toggle_play_pause().await,
    KeyCode::Right | KeyCode::Char('l') => app.move_selection(1),
    KeyCode::Left | KeyCode::Char('h') => app.move_selection(-1),
    KeyCode::Down | KeyCode::Char('j') => app.move_selection(app.row_delta()),
    KeyCode::Up | KeyCode::Char('k') => app.move_selection(-app.row_delta()),
    KeyCode::PageDown => app.move_selection(app.page_delta()),
    KeyCode::PageUp => app.move_selection(-app.page_delta()),
    KeyCode::Char('n') => app.session.skip_next().await,
    KeyCode::Char('p') => app.session.skip_previous().await,
    KeyCode::Char('f') => app.toggle_selected_favorite(),
    KeyCode::Char('m') => app.session.toggle_mute().await,
    KeyCode::Char('+') | KeyCode::Char('=') => app.change_volume(step).await,
    KeyCode::Char('-') => app.change_volume(-step).await,
    KeyCode::Char('r') => app.retry(),
    KeyCode::Esc | KeyCode::Backspace => app.back_to_genres().await,
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Config, Overrides, Settings};
  use crate::display::DisplayMode;
  use ratatui::crossterm::event::KeyEvent;

  fn app() -> App {
    let settings = Settings::resolve(Overrides::default(), &Config::default());
    App::new(settings, Config::default(), None, DisplayMode::Ascii).unwrap()
  }

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn wrap_index_wraps_both_ways() {
    assert_eq!(wrap_index(0, 9, -1), 8);
    assert_eq!(wrap_index(8, 9, 1), 0);
    assert_eq!(wrap_index(3, 9, 1), 4);
    assert_eq!(wrap_index(0, 0, 1), 0);
  }

  #[tokio::test]
  async fn ctrl_c_quits_from_any_screen() {
    let mut app = app();
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).await;
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn genre_navigation_and_selection() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Up)).await;
    assert_eq!(app.selected_genre_index(), constants().genres.len() - 1);
    handle_key_event(&mut app, press(KeyCode::Char('j'))).await;
    handle_key_event(&mut app, press(KeyCode::Char('j'))).await;
    assert_eq!(app.selected_genre_index(), 1);

    handle_key_event(&mut app, press(KeyCode::Enter)).await;
    assert_eq!(app.screen, Screen::Browse);
    assert_eq!(app.session.genre(), Some("indie"));

    handle_key_event(&mut app, press(KeyCode::Esc)).await;
    assert_eq!(app.screen, Screen::Genres);
    assert!(!app.should_quit);
    handle_key_event(&mut app, press(KeyCode::Char('q'))).await;
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn volume_and_mute_keys() {
    let mut app = app();
    app.open_genre(0).await;
    handle_key_event(&mut app, press(KeyCode::Char('+'))).await;
    assert_eq!(app.session.playback().volume, 50 + constants().volume_step);
    handle_key_event(&mut app, press(KeyCode::Char('m'))).await;
    assert!(app.session.playback().is_muted);
    handle_key_event(&mut app, press(KeyCode::Char('-'))).await;
    assert!(!app.session.playback().is_muted);
    assert_eq!(app.session.playback().volume, 50);
  }

  #[tokio::test]
  async fn grid_keys_without_results_are_harmless() {
    let mut app = app();
    app.open_genre(0).await;
    for code in [KeyCode::Enter, KeyCode::Char(' '), KeyCode::Char('n'), KeyCode::Char('f'), KeyCode::PageDown] {
      handle_key_event(&mut app, press(code)).await;
    }
    assert_eq!(app.session.current_index(), None);
    assert_eq!(app.session.favorite_count(), 0);
    assert_eq!(app.grid.selected, 0);
  }
}

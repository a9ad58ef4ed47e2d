use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, Screen};
use crate::constants::constants;
use crate::graphics::{ThumbnailWidget, fit_thumbnail};
use crate::session::LoadState;
use crate::theme::Theme;
use crate::youtube::VideoSummary;

// --- Helpers ---

/// Split `s` after at most `width` display columns.
fn split_at_width(s: &str, width: usize) -> (&str, &str) {
  let mut used = 0;
  for (i, c) in s.char_indices() {
    let w = c.width().unwrap_or(0);
    if used + w > width {
      return (&s[..i], &s[i..]);
    }
    used += w;
  }
  (s, "")
}

/// Truncate to `width` display columns, ending with "…" when cut, and pad
/// with spaces to exactly `width`.
pub fn fit_width(s: &str, width: usize) -> String {
  let mut out = if s.width() <= width {
    s.to_string()
  } else {
    let (head, _) = split_at_width(s, width.saturating_sub(1));
    format!("{}…", head)
  };
  let pad = width.saturating_sub(out.width());
  out.extend(std::iter::repeat_n(' ', pad));
  out
}

pub fn format_elapsed(secs: f64) -> String {
  let total = secs.max(0.0) as u64;
  format!("{}:{:02}", total / 60, total % 60)
}

fn volume_gauge(volume: u8, muted: bool, width: usize) -> String {
  let filled = if muted { 0 } else { (usize::from(volume) * width).div_ceil(100).min(width) };
  format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, player_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(6),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  match app.screen {
    Screen::Genres => render_genres(frame, app, main_area),
    Screen::Browse => render_grid(frame, app, main_area),
  }
  render_status(frame, app, status_area);
  render_player_bar(frame, app, player_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let mut spans = vec![Span::styled(" ♪ genrebox ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))];
  if let Some(genre) = app.session.genre() {
    spans.push(Span::styled(format!("/ {} ", genre), Style::default().fg(theme.fg)));
  }
  frame.render_widget(Line::from(spans), area);

  let right_text = format!("♥ {}  v{} ", app.session.favorite_count(), env!("CARGO_PKG_VERSION"));
  let w = right_text.width() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(w), width: w.min(area.width), ..area };
  frame.render_widget(Line::from(Span::styled(right_text, Style::default().fg(theme.muted))), right_area);
}

fn bordered<'a>(theme: &Theme, title: impl Into<Line<'a>>) -> Block<'a> {
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
}

fn render_genres(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let genres = &constants().genres;
  let items: Vec<ListItem> =
    genres.iter().map(|g| ListItem::new(Line::from(Span::styled(g.as_str(), Style::default().fg(theme.fg))))).collect();

  let width = (genres.iter().map(|g| g.width()).max().unwrap_or(0) as u16 + 8).max(28).min(area.width);
  let height = (genres.len() as u16 + 2).min(area.height);
  let list_area = Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  };

  let list = List::new(items)
    .block(bordered(theme, " Pick a genre ").padding(Padding::horizontal(1)))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));
  frame.render_stateful_widget(list, list_area, &mut app.genre_state);
}

fn render_message(frame: &mut Frame, theme: &Theme, block: Block, area: Rect, lines: Vec<Line>) {
  let mut text = vec![Line::from("")];
  text.extend(lines);
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).style(Style::default().fg(theme.fg)).block(block);
  frame.render_widget(paragraph, area);
}

fn render_grid(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let genre = app.session.genre().unwrap_or_default().to_string();
  let len = app.session.videos().len();
  let title = match app.session.load_state() {
    LoadState::Ready => format!(" {} · {} videos ", genre, len),
    _ => format!(" {} ", genre),
  };
  let block = bordered(theme, title);
  let inner = block.inner(area);

  match app.session.load_state() {
    LoadState::Idle | LoadState::Loading => {
      let line = Line::from(Span::styled(format!("Searching {}…", genre), Style::default().fg(theme.status)));
      render_message(frame, theme, block, area, vec![line]);
      return;
    }
    LoadState::Failed(e) => {
      let lines = vec![
        Line::from(Span::styled(format!("Unable to load videos: {}", e), Style::default().fg(theme.error))),
        Line::from(""),
        Line::from(Span::styled("Press r to retry or Esc to pick another genre.", Style::default().fg(theme.muted))),
      ];
      render_message(frame, theme, block, area, lines);
      return;
    }
    LoadState::Ready if len == 0 => {
      let line = Line::from(Span::styled("No videos found for this genre.", Style::default().fg(theme.muted)));
      render_message(frame, theme, block, area, vec![line]);
      return;
    }
    LoadState::Ready => {}
  }

  let c = constants();
  app.grid.columns = (inner.width / c.card_width.max(1)).max(1) as usize;
  app.grid.viewport_h = u32::from(inner.height);
  app.grid.ensure_visible(len);

  let card_w = (inner.width as usize / app.grid.columns).max(1);
  let card_h = u32::from(c.card_height).max(1);
  let content = app.grid.content_lines(len);
  let sentinel = app.grid.sentinel_span(len);

  let lines: Vec<Line> = (app.grid.scroll..app.grid.scroll + app.grid.viewport_h)
    .map(|li| {
      if li < content {
        let row = (li / card_h) as usize;
        let sub = li % card_h;
        let spans = (0..app.grid.columns)
          .filter_map(|col| {
            let index = row * app.grid.columns + col;
            let video = app.session.videos().get(index)?;
            Some(card_line(app, theme, index, video, sub, card_w))
          })
          .collect::<Vec<_>>();
        Line::from(spans)
      } else if li == sentinel.start {
        sentinel_line(app, theme)
      } else {
        Line::from("")
      }
    })
    .collect();

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn card_line<'a>(app: &App, theme: &Theme, index: usize, video: &'a VideoSummary, sub: u32, card_w: usize) -> Span<'a> {
  let selected = index == app.grid.selected;
  let playing = app.session.current_index() == Some(index);
  let favorite = app.session.is_favorite(&video.id);
  let text_w = card_w.saturating_sub(3);

  let (fg, bg) = if selected { (theme.highlight_fg, theme.highlight_bg) } else { (theme.fg, theme.card_bg) };
  let base = Style::default().fg(fg).bg(bg);

  let (head, rest) = split_at_width(&video.title, text_w.saturating_sub(2));
  let text = match sub {
    0 => {
      let marker = if playing { "♪ " } else { "  " };
      let heart = if favorite { "♥" } else { " " };
      format!(" {}{}{} ", marker, fit_width(head, text_w.saturating_sub(2)), heart)
    }
    1 => format!("   {} ", fit_width(rest.trim_start(), text_w.saturating_sub(1))),
    2 => format!("   {} ", fit_width(&video.channel_name, text_w.saturating_sub(1))),
    3 => {
      let date = video.published_at.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
      format!("   {} ", fit_width(&date, text_w.saturating_sub(1)))
    }
    _ => return Span::styled(" ".repeat(card_w), Style::default().bg(theme.bg)),
  };

  let style = match sub {
    0 => base.add_modifier(Modifier::BOLD),
    2 | 3 if !selected => base.fg(theme.muted),
    _ => base,
  };
  let style = if sub == 0 && favorite && !selected { style.fg(theme.favorite) } else { style };
  Span::styled(text, style)
}

fn sentinel_line(app: &App, theme: &Theme) -> Line<'static> {
  let (text, color) = if app.session.is_loading_more() {
    ("Loading more…", theme.status)
  } else if app.session.has_more() {
    ("↓ more", theme.muted)
  } else {
    ("· end of results ·", theme.muted)
  };
  Line::from(Span::styled(text, Style::default().fg(color))).alignment(Alignment::Center)
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if matches!(app.session.load_state(), LoadState::Loading) || app.session.is_loading_more() {
    (" ⏳ Searching…".to_string(), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_player_bar(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let title = Line::from(vec![
    Span::styled(" Now Playing ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", app.display_mode.label().to_lowercase()), Style::default().fg(theme.muted)),
  ]);
  let block = bordered(theme, title);
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(video) = app.session.current_video().cloned() else {
    let hint = Paragraph::new(Line::from(Span::styled(" Nothing playing", Style::default().fg(theme.muted))));
    frame.render_widget(hint, inner);
    return;
  };

  let thumb_w = (inner.height * 4).min(inner.width / 3);
  let [thumb_area, info_area] = Layout::horizontal([Constraint::Length(thumb_w), Constraint::Min(10)]).areas(inner);

  if let Some((ref id, ref image)) = app.thumbnail
    && *id == video.id
  {
    let fresh = app.resized_thumb.as_ref().is_some_and(|(rid, rarea, _)| rid == id && *rarea == thumb_area);
    if !fresh {
      app.resized_thumb = Some((id.clone(), thumb_area, fit_thumbnail(image, thumb_area, app.display_mode)));
    }
    if let Some((_, _, ref resized)) = app.resized_thumb {
      frame.render_widget(ThumbnailWidget { image: resized, display_mode: app.display_mode }, thumb_area);
    }
  }

  let playback = app.session.playback();
  let info_w = info_area.width.saturating_sub(2) as usize;
  let state = if playback.is_playing { "▶ playing" } else { "⏸ paused" };
  let volume = if playback.is_muted {
    format!("muted ({}%)", playback.volume)
  } else {
    format!("{}%", playback.volume)
  };
  let heart = if app.session.is_favorite(&video.id) { " ♥" } else { "" };

  let lines = vec![
    Line::from(vec![
      Span::styled(
        fit_width(&video.title, info_w.saturating_sub(heart.width())),
        Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
      ),
      Span::styled(heart, Style::default().fg(theme.favorite)),
    ]),
    Line::from(Span::styled(fit_width(&video.channel_name, info_w), Style::default().fg(theme.muted))),
    Line::from(vec![
      Span::styled(format!("{}  {}", state, format_elapsed(playback.elapsed)), Style::default().fg(theme.status)),
    ]),
    Line::from(vec![
      Span::styled("vol ", Style::default().fg(theme.muted)),
      Span::styled(volume_gauge(playback.volume, playback.is_muted, 10), Style::default().fg(theme.accent)),
      Span::styled(format!(" {}", volume), Style::default().fg(theme.muted)),
    ]),
  ];
  frame.render_widget(Paragraph::new(lines).block(Block::default().padding(Padding::horizontal(1))), info_area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_current = app.session.current_video().is_some();
  let keys: Vec<(&str, &str)> = match app.screen {
    Screen::Genres => vec![("Enter", "Open"), ("j/k", "Move"), ("^t", "Theme"), ("Esc", "Quit")],
    Screen::Browse => {
      let mut k = vec![("Enter", "Play"), ("hjkl", "Move"), ("f", "Favorite")];
      if has_current {
        let pause_label = if app.session.playback().is_playing { "Pause" } else { "Resume" };
        k.push(("Space", pause_label));
        k.push(("n/p", "Next/Prev"));
      }
      k.push(("m", "Mute"));
      k.push(("+/-", "Volume"));
      if matches!(app.session.load_state(), LoadState::Failed(_)) {
        k.push(("r", "Retry"));
      }
      k.push(("Esc", "Genres"));
      k
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw(" "));
      }
      s
    })
    .collect();
  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let w = theme_label.width() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(w), width: w.min(area.width), ..area };
  frame.render_widget(Line::from(Span::styled(theme_label, Style::default().fg(theme.muted))), right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fit_width_pads_short_text() {
    assert_eq!(fit_width("lofi", 6), "lofi  ");
    assert_eq!(fit_width("", 3), "   ");
  }

  #[test]
  fn fit_width_truncates_with_ellipsis() {
    assert_eq!(fit_width("acoustic morning", 8), "acousti…");
    assert_eq!(fit_width("acoustic", 8), "acoustic");
  }

  #[test]
  fn fit_width_counts_wide_chars() {
    // Each hangul syllable is two columns wide.
    let s = fit_width("플레이리스트", 7);
    assert_eq!(s.width(), 7);
    assert!(s.starts_with("플레이"));
    assert!(s.contains('…'));
  }

  #[test]
  fn split_at_width_respects_columns() {
    assert_eq!(split_at_width("hello world", 5), ("hello", " world"));
    assert_eq!(split_at_width("가나다", 3), ("가", "나다"));
    assert_eq!(split_at_width("ab", 10), ("ab", ""));
  }

  #[test]
  fn elapsed_formats_as_minutes_and_seconds() {
    assert_eq!(format_elapsed(0.0), "0:00");
    assert_eq!(format_elapsed(4.9), "0:04");
    assert_eq!(format_elapsed(65.2), "1:05");
    assert_eq!(format_elapsed(-3.0), "0:00");
  }

  #[test]
  fn volume_gauge_fills_proportionally() {
    assert_eq!(volume_gauge(50, false, 10), "█████░░░░░");
    assert_eq!(volume_gauge(100, false, 4), "████");
    assert_eq!(volume_gauge(80, true, 4), "░░░░");
    assert_eq!(volume_gauge(1, false, 10), "█░░░░░░░░░");
  }
}

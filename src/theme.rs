use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub card_bg: Color,
  pub favorite: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Pastel",
    bg: Color::Rgb(30, 28, 38),
    fg: Color::Rgb(232, 228, 240),
    accent: Color::Rgb(244, 166, 200),
    muted: Color::Rgb(140, 134, 158),
    border: Color::Rgb(72, 66, 90),
    highlight_fg: Color::Rgb(30, 28, 38),
    highlight_bg: Color::Rgb(190, 170, 240),
    card_bg: Color::Rgb(40, 37, 52),
    favorite: Color::Rgb(255, 120, 150),
    status: Color::Rgb(160, 220, 200),
    error: Color::Rgb(240, 110, 110),
    key_fg: Color::Rgb(30, 28, 38),
    key_bg: Color::Rgb(160, 150, 190),
  },
  Theme {
    name: "Night",
    bg: Color::Rgb(18, 20, 28),
    fg: Color::Rgb(220, 220, 230),
    accent: Color::Rgb(100, 180, 255),
    muted: Color::Rgb(110, 112, 130),
    border: Color::Rgb(55, 58, 74),
    highlight_fg: Color::Rgb(18, 20, 28),
    highlight_bg: Color::Rgb(100, 180, 255),
    card_bg: Color::Rgb(28, 31, 42),
    favorite: Color::Rgb(240, 90, 110),
    status: Color::Rgb(80, 220, 130),
    error: Color::Rgb(240, 90, 90),
    key_fg: Color::Rgb(18, 20, 28),
    key_bg: Color::Rgb(120, 124, 150),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(248, 245, 238),
    fg: Color::Rgb(50, 48, 44),
    accent: Color::Rgb(196, 84, 60),
    muted: Color::Rgb(140, 134, 122),
    border: Color::Rgb(206, 198, 184),
    highlight_fg: Color::Rgb(248, 245, 238),
    highlight_bg: Color::Rgb(90, 110, 150),
    card_bg: Color::Rgb(238, 233, 222),
    favorite: Color::Rgb(210, 60, 90),
    status: Color::Rgb(60, 130, 100),
    error: Color::Rgb(190, 50, 50),
    key_fg: Color::Rgb(248, 245, 238),
    key_bg: Color::Rgb(120, 114, 104),
  },
];

/// Index of the theme with this name, falling back to the first.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_by_name() {
    assert_eq!(theme_index(Some("Night")), 1);
    assert_eq!(theme_index(Some("paper")), 2);
    assert_eq!(theme_index(Some("neon")), 0);
    assert_eq!(theme_index(None), 0);
  }
}

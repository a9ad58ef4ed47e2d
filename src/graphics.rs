use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

// --- Thumbnail Widget ---

/// Draws an already-resized thumbnail into the buffer.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Pixel size to resize a thumbnail to so it fills `area`. Half-blocks pack
/// two pixel rows into each cell.
pub fn target_size(area: Rect, display_mode: DisplayMode) -> (u32, u32) {
  let w = u32::from(area.width).max(1);
  let h = match display_mode {
    DisplayMode::Direct => u32::from(area.height) * 2,
    DisplayMode::Ascii => u32::from(area.height),
  };
  (w, h.max(1))
}

pub fn fit_thumbnail(image: &DynamicImage, area: Rect, display_mode: DisplayMode) -> DynamicImage {
  let (w, h) = target_size(area, display_mode);
  image.resize_to_fill(w, h, FilterType::Triangle)
}

fn cell(area: Rect, offset: u32, i: u32, vertical: bool) -> u16 {
  let base = if vertical { area.y } else { area.x };
  base.saturating_add(offset.min(u16::MAX as u32) as u16).saturating_add(i.min(u16::MAX as u32) as u16)
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let resized = image.to_rgb8();
  let img_w = resized.width().min(area.width as u32);
  let img_h = resized.height();
  let cell_h = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h.min(area.height as u32) {
    for x in 0..img_w {
      let upper = resized.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = resized.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(cell(area, offset_x, x, false), cell(area, offset_y, y, true), "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn ascii_char(luma: u8) -> &'static str {
  let idx = ((luma as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
  ASCII_CHARS[idx.min(ASCII_CHARS.len() - 1)]
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let resized = image.to_luma8();
  let img_w = resized.width().min(area.width as u32);
  let img_h = resized.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let luma = resized.get_pixel(x, y)[0];
      buf.set_string(cell(area, offset_x, x, false), cell(area, offset_y, y, true), ascii_char(luma), Style::default());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn half_blocks_double_the_pixel_rows() {
    let area = Rect::new(0, 0, 12, 4);
    assert_eq!(target_size(area, DisplayMode::Direct), (12, 8));
    assert_eq!(target_size(area, DisplayMode::Ascii), (12, 4));
    assert_eq!(target_size(Rect::new(0, 0, 0, 0), DisplayMode::Ascii), (1, 1));
  }

  #[test]
  fn ascii_ramp_covers_dark_to_bright() {
    assert_eq!(ascii_char(0), " ");
    assert_eq!(ascii_char(255), "@");
  }

  #[test]
  fn half_block_widget_paints_cells() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])));
    let area = Rect::new(0, 0, 4, 2);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &image, display_mode: DisplayMode::Direct }.render(area, &mut buf);
    let c = &buf[(0, 0)];
    assert_eq!(c.symbol(), "▀");
    assert_eq!(c.fg, Color::Rgb(200, 10, 10));
    assert_eq!(c.bg, Color::Rgb(200, 10, 10));
  }
}

//! Infinite-scroll trigger for the result grid.
//!
//! The grid reserves a few rows below its last card as a sentinel. After every
//! draw the app reports which rows are on screen; once enough of the sentinel
//! is visible the sentinel fires and the app queues a "load more" event.

/// Half-open span of grid rows: `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowSpan {
  pub start: u32,
  pub len: u32,
}

impl RowSpan {
  pub fn new(start: u32, len: u32) -> Self {
    Self { start, len }
  }

  fn end(self) -> u32 {
    self.start.saturating_add(self.len)
  }

  fn overlap(self, other: RowSpan) -> u32 {
    let start = self.start.max(other.start);
    let end = self.end().min(other.end());
    end.saturating_sub(start)
  }
}

/// Edge-triggered visibility sensor.
///
/// Fires once when the visible fraction of the sentinel rises to the
/// threshold, then stays quiet until the fraction drops below it again or
/// the owner calls [`ScrollSentinel::rearm`].
#[derive(Debug, Clone)]
pub struct ScrollSentinel {
  threshold: f64,
  armed: bool,
  attached: bool,
}

impl ScrollSentinel {
  pub fn new(threshold: f64) -> Self {
    let threshold = if threshold.is_finite() { threshold.clamp(f64::EPSILON, 1.0) } else { 1.0 };
    Self { threshold, armed: true, attached: true }
  }

  /// A sentinel that never fires; used while no grid is mounted.
  pub fn detached() -> Self {
    Self { threshold: 1.0, armed: false, attached: false }
  }

  pub fn visible_fraction(viewport: RowSpan, sentinel: RowSpan) -> f64 {
    if sentinel.len == 0 {
      return 0.0;
    }
    f64::from(viewport.overlap(sentinel)) / f64::from(sentinel.len)
  }

  /// Returns `true` exactly when the sentinel crosses into view.
  pub fn observe(&mut self, viewport: RowSpan, sentinel: RowSpan) -> bool {
    if !self.attached {
      return false;
    }
    if Self::visible_fraction(viewport, sentinel) >= self.threshold {
      let fire = self.armed;
      self.armed = false;
      fire
    } else {
      self.armed = true;
      false
    }
  }

  /// Allow one more firing while the sentinel is still on screen, e.g.
  /// after a page was appended but the grid still doesn't fill the view.
  pub fn rearm(&mut self) {
    if self.attached {
      self.armed = true;
    }
  }

  pub fn detach(&mut self) {
    self.attached = false;
    self.armed = false;
  }

  pub fn is_attached(&self) -> bool {
    self.attached
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fraction_of_sentinel_on_screen() {
    let sentinel = RowSpan::new(20, 2);
    assert_eq!(ScrollSentinel::visible_fraction(RowSpan::new(0, 10), sentinel), 0.0);
    assert_eq!(ScrollSentinel::visible_fraction(RowSpan::new(11, 10), sentinel), 0.5);
    assert_eq!(ScrollSentinel::visible_fraction(RowSpan::new(15, 10), sentinel), 1.0);
    assert_eq!(ScrollSentinel::visible_fraction(RowSpan::new(21, 10), sentinel), 0.5);
    assert_eq!(ScrollSentinel::visible_fraction(RowSpan::new(0, 10), RowSpan::new(3, 0)), 0.0);
  }

  #[test]
  fn fires_once_while_visible() {
    let mut s = ScrollSentinel::new(0.5);
    let sentinel = RowSpan::new(20, 2);
    assert!(!s.observe(RowSpan::new(0, 10), sentinel));
    assert!(s.observe(RowSpan::new(11, 10), sentinel));
    assert!(!s.observe(RowSpan::new(12, 10), sentinel));
    assert!(!s.observe(RowSpan::new(13, 10), sentinel));
  }

  #[test]
  fn below_threshold_does_not_fire() {
    let mut s = ScrollSentinel::new(0.75);
    let sentinel = RowSpan::new(20, 2);
    assert!(!s.observe(RowSpan::new(11, 10), sentinel));
    assert!(s.observe(RowSpan::new(12, 10), sentinel));
  }

  #[test]
  fn scrolling_away_and_back_fires_again() {
    let mut s = ScrollSentinel::new(0.5);
    let sentinel = RowSpan::new(20, 2);
    assert!(s.observe(RowSpan::new(15, 10), sentinel));
    assert!(!s.observe(RowSpan::new(0, 10), sentinel));
    assert!(s.observe(RowSpan::new(15, 10), sentinel));
  }

  #[test]
  fn visible_at_mount_fires_immediately() {
    let mut s = ScrollSentinel::new(0.5);
    assert!(s.observe(RowSpan::new(0, 40), RowSpan::new(12, 2)));
  }

  #[test]
  fn rearm_allows_another_firing_in_place() {
    let mut s = ScrollSentinel::new(0.5);
    let viewport = RowSpan::new(0, 40);
    assert!(s.observe(viewport, RowSpan::new(12, 2)));
    assert!(!s.observe(viewport, RowSpan::new(12, 2)));
    s.rearm();
    assert!(s.observe(viewport, RowSpan::new(24, 2)));
  }

  #[test]
  fn detached_sentinel_never_fires() {
    let mut s = ScrollSentinel::new(0.5);
    s.detach();
    assert!(!s.is_attached());
    assert!(!s.observe(RowSpan::new(0, 40), RowSpan::new(12, 2)));
    s.rearm();
    assert!(!s.observe(RowSpan::new(0, 40), RowSpan::new(12, 2)));

    let mut never = ScrollSentinel::detached();
    assert!(!never.observe(RowSpan::new(0, 40), RowSpan::new(12, 2)));
  }

  #[test]
  fn threshold_is_clamped() {
    let mut s = ScrollSentinel::new(4.0);
    assert!(!s.observe(RowSpan::new(0, 21), RowSpan::new(20, 2)));
    assert!(s.observe(RowSpan::new(0, 22), RowSpan::new(20, 2)));
  }
}

//! Auto-hiding top and bottom chrome bars.
//!
//! Time is passed in explicitly; the event loop asks for
//! [`ChromeAutoHide::next_deadline`] and calls [`ChromeAutoHide::tick`] when it
//! wakes up.

use web_time::{Duration, Instant};

use crate::config::ChromeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy)]
struct EdgeBar {
    visible: bool,
    in_band: bool,
    hide_at: Option<Instant>,
}

impl EdgeBar {
    fn new() -> Self {
        Self {
            visible: true,
            in_band: false,
            hide_at: None,
        }
    }

    fn arm(&mut self, deadline: Instant) {
        // At most one pending hide per edge.
        self.hide_at = Some(deadline);
    }
}

/// Edge-proximity timers for both bars.
#[derive(Debug, Clone)]
pub struct ChromeAutoHide {
    delay: Duration,
    band: f64,
    top: EdgeBar,
    bottom: EdgeBar,
}

impl ChromeAutoHide {
    pub fn new(config: &ChromeConfig) -> Self {
        Self {
            delay: config.hide_delay(),
            band: config.edge_band_px,
            top: EdgeBar::new(),
            bottom: EdgeBar::new(),
        }
    }

    fn bar_mut(&mut self, edge: Edge) -> &mut EdgeBar {
        match edge {
            Edge::Top => &mut self.top,
            Edge::Bottom => &mut self.bottom,
        }
    }

    pub fn is_visible(&self, edge: Edge) -> bool {
        match edge {
            Edge::Top => self.top.visible,
            Edge::Bottom => self.bottom.visible,
        }
    }

    /// Whether a hide is pending for `edge`.
    pub fn is_pending(&self, edge: Edge) -> bool {
        match edge {
            Edge::Top => self.top.hide_at.is_some(),
            Edge::Bottom => self.bottom.hide_at.is_some(),
        }
    }

    /// Pointer at vertical position `y` in a surface of `height`.
    ///
    /// `blocked` is true while a menu is open or drawing is active.
    pub fn pointer_moved(&mut self, y: f64, height: f64, blocked: bool, now: Instant) {
        let band = self.band;
        let delay = self.delay;
        for (edge, in_band) in [(Edge::Top, y <= band), (Edge::Bottom, y >= height - band)] {
            let bar = self.bar_mut(edge);
            if in_band {
                bar.hide_at = None;
                bar.visible = true;
            } else if bar.in_band && !blocked {
                bar.arm(now + delay);
            }
            bar.in_band = in_band;
        }
    }

    /// Fire due timers. Returns whether visibility changed.
    ///
    /// A due timer is dropped without hiding while `blocked`.
    pub fn tick(&mut self, now: Instant, blocked: bool) -> bool {
        let mut changed = false;
        for edge in [Edge::Top, Edge::Bottom] {
            let bar = self.bar_mut(edge);
            match bar.hide_at {
                Some(deadline) if deadline <= now => {
                    bar.hide_at = None;
                    if !blocked && bar.visible {
                        bar.visible = false;
                        changed = true;
                    }
                }
                _ => {}
            }
        }
        changed
    }

    /// The blocker went away: re-arm bars left visible outside their band.
    pub fn release(&mut self, now: Instant) {
        let deadline = now + self.delay;
        for edge in [Edge::Top, Edge::Bottom] {
            let bar = self.bar_mut(edge);
            if bar.visible && !bar.in_band && bar.hide_at.is_none() {
                bar.arm(deadline);
            }
        }
    }

    /// Earliest pending hide, for the event loop's wake-up.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.top.hide_at, self.bottom.hide_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drop every pending timer (teardown).
    pub fn cancel_all(&mut self) {
        self.top.hide_at = None;
        self.bottom.hide_at = None;
    }
}

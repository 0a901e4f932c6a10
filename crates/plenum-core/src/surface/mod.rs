//! The three surfaces of a live session.
//!
//! A surface is mounted with a [`SessionChannel`], drains its subscription
//! from its own event loop through [`Surface::pump`] and is torn down with
//! [`Surface::unmount`]. Once unmounted every entry point is a no-op.

mod control;
mod display;
mod presenter;

pub use control::ControlSurface;
pub use display::{DisplaySurface, DisplayView};
pub use presenter::PresenterSurface;

use kurbo::Point;
use web_time::Instant;

use crate::annotation::AnnotationCoordinator;
use crate::bus::{SessionChannel, Subscription};
use crate::chrome::ChromeAutoHide;
use crate::config::ChromeConfig;
use crate::keymap::SurfaceAction;
use crate::protocol::Origin;
use crate::window::FullscreenHost;

/// A pointer sample over the slide area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    /// Position in slide coordinates, `[0, 1]²` when over the slide.
    pub normalized: Point,
    /// Vertical position in window pixels, for the chrome bars.
    pub y: f64,
    /// Window height in pixels.
    pub height: f64,
}

/// What the native shell drives.
pub trait Surface {
    /// Apply everything received since the last call. Returns whether state changed.
    fn pump(&mut self) -> bool;

    /// Handle a bound key.
    fn action(&mut self, action: SurfaceAction, host: &mut dyn FullscreenHost, now: Instant) -> bool;

    fn pointer_moved(&mut self, _sample: PointerSample, _now: Instant) {}
    fn pointer_pressed(&mut self, _sample: PointerSample) {}
    fn pointer_released(&mut self) {}
    fn pointer_left(&mut self) {}

    /// Fire due timers. Returns whether state changed.
    fn tick(&mut self, _now: Instant) -> bool {
        false
    }

    /// When the event loop should wake up next.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// One-line description of what the surface shows.
    fn status_line(&self) -> String;

    /// The surface asked to be closed.
    fn should_close(&self) -> bool {
        false
    }

    fn unmount(&mut self);
}

/// Subscribe on mount. A surface without a subscription still works locally.
fn subscribe(out: &SessionChannel) -> Option<Subscription> {
    match out.subscribe() {
        Ok(sub) => Some(sub),
        Err(e) => {
            log::warn!("Subscribing to {} failed, running unsynchronized: {}", out.id(), e);
            None
        }
    }
}

/// Interactive state shared by the control and presenter consoles.
#[derive(Debug, Clone)]
struct Console {
    annotation: AnnotationCoordinator,
    chrome: ChromeAutoHide,
    menu_open: bool,
    pointer_down: bool,
}

impl Console {
    fn new(origin: Origin, chrome: &ChromeConfig) -> Self {
        Self {
            annotation: AnnotationCoordinator::new(origin),
            chrome: ChromeAutoHide::new(chrome),
            menu_open: false,
            pointer_down: false,
        }
    }

    /// Chrome must not hide while these are active.
    fn blocked(&self) -> bool {
        self.menu_open || self.annotation.is_drawing()
    }

    /// Annotation and menu keys. Returns false for keys this does not own.
    fn action(&mut self, action: SurfaceAction, out: &SessionChannel, now: Instant) -> bool {
        let was_blocked = self.blocked();
        match action {
            SurfaceAction::ToggleDrawing => {
                self.annotation.toggle_drawing(out);
            }
            SurfaceAction::ToggleEraser => {
                self.annotation.toggle_eraser();
            }
            SurfaceAction::ClearCanvas => {
                self.annotation.clear_canvas(out);
            }
            SurfaceAction::TogglePointer => {
                self.annotation.toggle_pointer_mode(out);
            }
            SurfaceAction::ToggleMenu => {
                self.menu_open = !self.menu_open;
            }
            _ => return false,
        }
        if was_blocked && !self.blocked() {
            self.chrome.release(now);
        }
        true
    }

    fn fullscreen(action: SurfaceAction, host: &mut dyn FullscreenHost) -> bool {
        match action {
            SurfaceAction::EnterFullscreen if !host.is_fullscreen() => {
                host.enter_fullscreen();
                true
            }
            SurfaceAction::ExitFullscreen if host.is_fullscreen() => {
                host.exit_fullscreen();
                true
            }
            _ => false,
        }
    }

    fn pointer_moved(&mut self, out: &SessionChannel, sample: PointerSample, now: Instant) {
        self.chrome.pointer_moved(sample.y, sample.height, self.blocked(), now);
        if self.pointer_down {
            self.annotation.extend_stroke(sample.normalized);
        } else {
            self.annotation.pointer_moved(out, sample.normalized);
        }
    }

    fn pointer_pressed(&mut self, sample: PointerSample) {
        if self.annotation.is_drawing() {
            self.pointer_down = true;
            self.annotation.begin_stroke(sample.normalized);
        }
    }

    fn pointer_released(&mut self, out: &SessionChannel) {
        if std::mem::take(&mut self.pointer_down) {
            self.annotation.end_stroke(out);
        }
    }

    fn pointer_left(&mut self, out: &SessionChannel) {
        self.pointer_released(out);
        self.annotation.pointer_left(out);
    }

    fn tick(&mut self, now: Instant) -> bool {
        let blocked = self.blocked();
        self.chrome.tick(now, blocked)
    }

    /// Short annotation status for the status line.
    fn badge(&self) -> Option<String> {
        if let Some(peer) = self.annotation.peer_drawing() {
            return Some(format!("{} is drawing", peer));
        }
        if self.annotation.is_eraser() {
            return Some("erasing".to_string());
        }
        if self.annotation.is_drawing() {
            return Some("drawing".to_string());
        }
        let pointer = self.annotation.pointer_state();
        if pointer.active {
            let owner = pointer.owner.map(Origin::as_str).unwrap_or("?");
            return Some(format!("{} pointer", owner));
        }
        None
    }

    fn teardown(&mut self, out: &SessionChannel) {
        self.pointer_released(out);
        self.annotation.relinquish(out);
        self.chrome.cancel_all();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Default)]
    pub struct TestHost {
        pub fullscreen: bool,
    }

    impl FullscreenHost for TestHost {
        fn is_fullscreen(&self) -> bool {
            self.fullscreen
        }

        fn enter_fullscreen(&mut self) {
            self.fullscreen = true;
        }

        fn exit_fullscreen(&mut self) {
            self.fullscreen = false;
        }
    }

    pub fn sample(x: f64, y: f64) -> PointerSample {
        PointerSample {
            normalized: Point::new(x, y),
            y: 400.0,
            height: 800.0,
        }
    }
}

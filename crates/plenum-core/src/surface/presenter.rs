//! Presenter console: follows control's slide position, shares the pen and
//! the pointer, and closes itself when control asks.

use web_time::Instant;

use super::{Console, PointerSample, Surface, subscribe};
use crate::annotation::AnnotationCoordinator;
use crate::bus::{SessionChannel, Subscription};
use crate::config::ChromeConfig;
use crate::deck::{PresentationState, SlideDeck};
use crate::keymap::SurfaceAction;
use crate::protocol::{BusMessage, Origin, SlidePayload};
use crate::window::FullscreenHost;

pub struct PresenterSurface {
    out: SessionChannel,
    subscription: Option<Subscription>,
    alive: bool,
    deck: Option<SlideDeck>,
    /// Last position received from control.
    cache: Option<PresentationState>,
    /// Slide browsed locally with the arrow keys; never broadcast.
    preview: Option<usize>,
    console: Console,
    should_close: bool,
}

impl PresenterSurface {
    /// Mount and ask control for the current position.
    pub fn mount(out: SessionChannel, deck: Option<SlideDeck>, chrome: &ChromeConfig) -> Self {
        let subscription = subscribe(&out);
        let surface = Self {
            out,
            subscription,
            alive: true,
            deck,
            cache: None,
            preview: None,
            console: Console::new(Origin::Presenter, chrome),
            should_close: false,
        };
        surface.out.publish(BusMessage::RequestInit);
        log::info!("Presenter mounted on {}", surface.out.id());
        surface
    }

    pub fn state(&self) -> Option<&PresentationState> {
        self.cache.as_ref()
    }

    pub fn annotation(&self) -> &AnnotationCoordinator {
        &self.console.annotation
    }

    /// Slide shown in the preview pane: the browsed one, else the next one.
    pub fn preview_index(&self) -> Option<usize> {
        let current = self.cache.as_ref()?.current_slide_index;
        let last = self.deck.as_ref().map_or(current, |d| d.len().saturating_sub(1));
        Some(self.preview.unwrap_or(current.saturating_add(1).min(last)))
    }

    fn browse(&mut self, delta: i64) -> bool {
        let (Some(deck), Some(from)) = (self.deck.as_ref(), self.preview_index()) else {
            return false;
        };
        let from = i64::try_from(from).unwrap_or(i64::MAX);
        let Some(target) = deck.clamp_index(from.saturating_add(delta)) else {
            return false;
        };
        let changed = Some(target) != self.preview;
        self.preview = Some(target);
        changed
    }

    fn apply_position(&mut self, payload: &SlidePayload) -> bool {
        let index = match &self.deck {
            Some(deck) => match deck.clamp_index(payload.slide) {
                Some(index) => index,
                None => return false,
            },
            None => usize::try_from(payload.slide.max(0)).unwrap_or(usize::MAX),
        };
        let moved = self.cache.as_ref().map(|s| s.current_slide_index) != Some(index);
        self.cache = Some(PresentationState {
            current_slide_index: index,
            session_date: payload.session_date.clone(),
            session_time: payload.session_time.clone(),
        });
        if moved {
            self.preview = None;
            self.console.annotation.slide_changed();
        }
        true
    }

    fn handle(&mut self, message: &BusMessage) -> bool {
        match message {
            BusMessage::Init(payload) | BusMessage::Slide(payload) => self.apply_position(payload),
            BusMessage::PresenterWindowCloseRequest => {
                log::info!("Control asked the presenter to close");
                self.should_close = true;
                true
            }
            BusMessage::RequestInit => false,
            other => self.console.annotation.handle(other, &self.out),
        }
    }
}

impl Surface for PresenterSurface {
    fn pump(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        let Some(messages) = self.subscription.as_ref().map(Subscription::drain) else {
            return false;
        };
        let mut changed = false;
        for message in &messages {
            changed |= self.handle(message);
        }
        changed
    }

    fn action(&mut self, action: SurfaceAction, host: &mut dyn FullscreenHost, now: Instant) -> bool {
        if !self.alive {
            return false;
        }
        match action {
            SurfaceAction::PrevSlide => self.browse(-1),
            SurfaceAction::NextSlide => self.browse(1),
            SurfaceAction::FirstSlide | SurfaceAction::LastSlide => {
                let changed = self.preview.is_some();
                self.preview = None;
                changed
            }
            SurfaceAction::TogglePresenterWindow => false,
            SurfaceAction::EnterFullscreen | SurfaceAction::ExitFullscreen => Console::fullscreen(action, host),
            other => self.console.action(other, &self.out, now),
        }
    }

    fn pointer_moved(&mut self, sample: PointerSample, now: Instant) {
        if self.alive {
            self.console.pointer_moved(&self.out, sample, now);
        }
    }

    fn pointer_pressed(&mut self, sample: PointerSample) {
        if self.alive {
            self.console.pointer_pressed(sample);
        }
    }

    fn pointer_released(&mut self) {
        if self.alive {
            self.console.pointer_released(&self.out);
        }
    }

    fn pointer_left(&mut self) {
        if self.alive {
            self.console.pointer_left(&self.out);
        }
    }

    fn tick(&mut self, now: Instant) -> bool {
        self.alive && self.console.tick(now)
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.alive {
            self.console.chrome.next_deadline()
        } else {
            None
        }
    }

    fn status_line(&self) -> String {
        let mut line = match &self.cache {
            None => "Presenter: waiting for control".to_string(),
            Some(state) => {
                let index = state.current_slide_index;
                let title = self
                    .deck
                    .as_ref()
                    .and_then(|d| d.get(index))
                    .map(|s| s.label())
                    .unwrap_or_else(|| format!("slide {}", index.saturating_add(1)));
                let mut line = format!("Presenter: {}", title);
                if let Some(next) = self.preview_index().filter(|&i| i != index) {
                    line.push_str(&format!(" | next: {}", next.saturating_add(1)));
                }
                line
            }
        };
        if let Some(badge) = self.console.badge() {
            line.push_str(&format!(" [{}]", badge));
        }
        line
    }

    fn should_close(&self) -> bool {
        self.should_close
    }

    fn unmount(&mut self) {
        if !self.alive {
            return;
        }
        self.console.teardown(&self.out);
        self.alive = false;
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        log::info!("Presenter unmounted from {}", self.out.id());
    }
}

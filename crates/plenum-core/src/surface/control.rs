//! Control surface: the operator's console and the only writer of slide position.

use web_time::Instant;

use super::{Console, PointerSample, Surface, subscribe};
use crate::annotation::AnnotationCoordinator;
use crate::bus::{SessionChannel, Subscription};
use crate::chrome::ChromeAutoHide;
use crate::config::ChromeConfig;
use crate::deck::{DeckError, DeckResult, PresentationState, SlideDeck};
use crate::keymap::SurfaceAction;
use crate::protocol::{BusMessage, Origin, SlidePayload};
use crate::window::{FullscreenHost, PresenterWindowManager, PresenterWindowState};

pub struct ControlSurface {
    out: SessionChannel,
    subscription: Option<Subscription>,
    alive: bool,
    deck: SlideDeck,
    state: PresentationState,
    console: Console,
    windows: PresenterWindowManager,
    /// Presenter window liveness as of the last check.
    presenter_live: bool,
}

impl ControlSurface {
    /// Mount with a non-empty deck and announce the opening slide.
    pub fn mount(
        out: SessionChannel,
        deck: SlideDeck,
        state: PresentationState,
        windows: PresenterWindowManager,
        chrome: &ChromeConfig,
    ) -> DeckResult<Self> {
        if deck.is_empty() {
            return Err(DeckError::Empty);
        }
        let mut state = state;
        state.current_slide_index = state.current_slide_index.min(deck.len() - 1);

        let subscription = subscribe(&out);
        let surface = Self {
            out,
            subscription,
            alive: true,
            deck,
            state,
            console: Console::new(Origin::Control, chrome),
            windows,
            presenter_live: false,
        };
        log::info!(
            "Control mounted on {} with {} slides",
            surface.out.id(),
            surface.deck.len()
        );
        surface.out.publish(BusMessage::Slide(surface.payload()));
        Ok(surface)
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn deck(&self) -> &SlideDeck {
        &self.deck
    }

    pub fn annotation(&self) -> &AnnotationCoordinator {
        &self.console.annotation
    }

    pub fn chrome(&self) -> &ChromeAutoHide {
        &self.console.chrome
    }

    pub fn menu_open(&self) -> bool {
        self.console.menu_open
    }

    pub fn presenter_window(&self) -> PresenterWindowState {
        self.windows.state()
    }

    fn payload(&self) -> SlidePayload {
        SlidePayload {
            slide: self.state.current_slide_index as i64,
            session_date: self.state.session_date.clone(),
            session_time: self.state.session_time.clone(),
        }
    }

    /// Move to `index` (clamped) and broadcast it. Returns whether it moved.
    pub fn go_to(&mut self, index: i64) -> bool {
        if !self.alive {
            return false;
        }
        let Some(target) = self.deck.clamp_index(index) else {
            return false;
        };
        if target == self.state.current_slide_index {
            return false;
        }
        self.state.current_slide_index = target;
        self.console.annotation.slide_changed();
        log::debug!("Control moved to slide {}", target);
        self.out.publish(BusMessage::Slide(self.payload()));
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.state.current_slide_index as i64 + 1)
    }

    pub fn prev(&mut self) -> bool {
        self.go_to(self.state.current_slide_index as i64 - 1)
    }

    /// `P` key. Closing the window frees whatever the presenter held.
    fn toggle_presenter_window(&mut self, host: &mut dyn FullscreenHost) -> bool {
        let was = self.windows.state();
        let state = self.windows.toggle(host, &self.out);
        if was == PresenterWindowState::OpenAcknowledged && state == PresenterWindowState::Closed {
            self.console.annotation.peer_gone(Origin::Presenter, &self.out);
        }
        self.presenter_live = self.windows.is_open();
        true
    }

    /// Notice a presenter window that went away on its own.
    fn check_presenter(&mut self) -> bool {
        let live = self.windows.is_open();
        let lost = self.presenter_live && !live;
        self.presenter_live = live;
        if lost {
            log::info!("Presenter window is gone");
            self.console.annotation.peer_gone(Origin::Presenter, &self.out);
        }
        lost
    }

    fn handle(&mut self, message: &BusMessage) -> bool {
        match message {
            BusMessage::RequestInit => {
                self.out.publish(BusMessage::Init(self.payload()));
                false
            }
            // Control is the only writer; foreign positions are ignored.
            BusMessage::Init(_) | BusMessage::Slide(_) => false,
            other => self.console.annotation.handle(other, &self.out),
        }
    }
}

impl Surface for ControlSurface {
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
            SurfaceAction::PrevSlide => self.prev(),
            SurfaceAction::NextSlide => self.next(),
            SurfaceAction::FirstSlide => self.go_to(0),
            SurfaceAction::LastSlide => self.go_to(self.deck.len() as i64 - 1),
            SurfaceAction::TogglePresenterWindow => self.toggle_presenter_window(host),
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
        if !self.alive {
            return false;
        }
        let lost = self.check_presenter();
        self.console.tick(now) | lost
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.alive {
            self.console.chrome.next_deadline()
        } else {
            None
        }
    }

    fn status_line(&self) -> String {
        let index = self.state.current_slide_index;
        let title = self.deck.get(index).map(|s| s.label()).unwrap_or_default();
        let mut line = format!("Control {}/{}: {}", index + 1, self.deck.len(), title);
        if let Some(badge) = self.console.badge() {
            line.push_str(&format!(" [{}]", badge));
        }
        if self.presenter_live {
            line.push_str(" [presenter open]");
        }
        line
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
        log::info!("Control unmounted from {}", self.out.id());
    }
}

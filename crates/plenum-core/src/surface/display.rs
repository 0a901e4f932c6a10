//! Audience display: a pure consumer of the session channel.

use kurbo::Point;
use web_time::Instant;

use super::{Console, Surface, subscribe};
use crate::bus::{SessionChannel, Subscription};
use crate::deck::{PresentationState, SlideDeck};
use crate::ink::InkLayer;
use crate::keymap::SurfaceAction;
use crate::protocol::{BusMessage, SlidePayload, decode_pointer};
use crate::window::FullscreenHost;

/// What the display currently renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayView {
    /// No position received yet.
    Waiting,
    Showing { index: usize },
}

pub struct DisplaySurface {
    out: SessionChannel,
    subscription: Option<Subscription>,
    alive: bool,
    deck: SlideDeck,
    state: Option<PresentationState>,
    ink: InkLayer,
    pointer: Option<Point>,
}

impl DisplaySurface {
    /// Subscribe, then ask control for a snapshot. There is no retry.
    pub fn mount(out: SessionChannel, deck: SlideDeck) -> Self {
        let subscription = subscribe(&out);
        out.publish(BusMessage::RequestInit);
        log::info!("Display mounted on {}", out.id());
        Self {
            out,
            subscription,
            alive: true,
            deck,
            state: None,
            ink: InkLayer::new(),
            pointer: None,
        }
    }

    pub fn view(&self) -> DisplayView {
        match &self.state {
            Some(state) => DisplayView::Showing {
                index: state.current_slide_index,
            },
            None => DisplayView::Waiting,
        }
    }

    pub fn state(&self) -> Option<&PresentationState> {
        self.state.as_ref()
    }

    pub fn ink(&self) -> &InkLayer {
        &self.ink
    }

    /// Laser pointer glyph position, if shown.
    pub fn pointer(&self) -> Option<Point> {
        self.pointer
    }

    /// Replace the cached state wholesale.
    fn apply_position(&mut self, payload: &SlidePayload) -> bool {
        let Some(index) = self.deck.clamp_index(payload.slide) else {
            log::debug!("Display has no slides, ignoring position {}", payload.slide);
            return false;
        };
        let previous = self.state.as_ref().map(|s| s.current_slide_index);
        self.state = Some(PresentationState {
            current_slide_index: index,
            session_date: payload.session_date.clone(),
            session_time: payload.session_time.clone(),
        });
        if previous.is_some_and(|p| p != index) {
            self.ink.clear();
        }
        true
    }

    fn handle(&mut self, message: &BusMessage) -> bool {
        match message {
            BusMessage::Init(payload) | BusMessage::Slide(payload) => self.apply_position(payload),
            BusMessage::DrawingClear { .. } => self.ink.clear(),
            BusMessage::DrawingStroke { stroke, .. } => self.ink.apply_stroke(stroke.clone()),
            BusMessage::PointerMove { x, y, .. } => {
                let position = decode_pointer(*x, *y);
                let changed = position != self.pointer;
                self.pointer = position;
                changed
            }
            BusMessage::PointerActive { active: false, .. } => self.pointer.take().is_some(),
            _ => false,
        }
    }
}

impl Surface for DisplaySurface {
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

    fn action(&mut self, action: SurfaceAction, host: &mut dyn FullscreenHost, _now: Instant) -> bool {
        self.alive && Console::fullscreen(action, host)
    }

    fn status_line(&self) -> String {
        match self.view() {
            DisplayView::Waiting => "Waiting for the session to start".to_string(),
            DisplayView::Showing { index } => {
                let title = self.deck.get(index).map(|s| s.label()).unwrap_or_default();
                let mut line = title;
                if let Some(state) = &self.state {
                    if let (Some(date), Some(time)) = (&state.session_date, &state.session_time) {
                        line.push_str(&format!(" ({} {})", date, time));
                    }
                }
                line
            }
        }
    }

    fn unmount(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        log::info!("Display unmounted from {}", self.out.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::{RecordingBus, session};
    use crate::deck::sample_deck;
    use crate::ink::Stroke;
    use crate::protocol::Origin;

    fn slide(index: i64) -> BusMessage {
        BusMessage::Slide(SlidePayload {
            slide: index,
            session_date: Some("2026-10-19".to_string()),
            session_time: Some("18:00".to_string()),
        })
    }

    #[test]
    fn test_waits_without_messages() {
        let bus = RecordingBus::new();
        let mut display = DisplaySurface::mount(session(&bus), sample_deck(3));

        assert_eq!(bus.take(), vec![BusMessage::RequestInit]);
        assert!(!display.pump());
        assert_eq!(display.view(), DisplayView::Waiting);
        // No retry either.
        assert!(bus.take().is_empty());
    }

    #[test]
    fn test_slide_before_init_accepted_and_clamped() {
        let bus = RecordingBus::new();
        let mut display = DisplaySurface::mount(session(&bus), sample_deck(3));

        bus.deliver(slide(7));
        display.pump();
        assert_eq!(display.view(), DisplayView::Showing { index: 2 });

        bus.deliver(slide(-4));
        display.pump();
        assert_eq!(display.view(), DisplayView::Showing { index: 0 });
        assert!(display.status_line().contains("2026-10-19 18:00"));
    }

    #[test]
    fn test_ink_cleared_on_clear_and_on_slide_change() {
        let bus = RecordingBus::new();
        let mut display = DisplaySurface::mount(session(&bus), sample_deck(3));
        let stroke = |id: &str| {
            let mut s = Stroke::begin(Origin::Presenter, Point::new(0.1, 0.1), false);
            s.id = id.to_string();
            BusMessage::DrawingStroke {
                origin: Origin::Presenter,
                stroke: s,
            }
        };

        bus.deliver(slide(0));
        bus.deliver(stroke("a"));
        display.pump();
        assert_eq!(display.ink().len(), 1);

        bus.deliver(BusMessage::DrawingClear {
            source_id: "presenter-s42-clear".to_string(),
        });
        bus.deliver(BusMessage::DrawingClear {
            source_id: "presenter-s42-clear".to_string(),
        });
        display.pump();
        assert!(display.ink().is_empty());

        bus.deliver(stroke("b"));
        bus.deliver(slide(0));
        display.pump();
        assert_eq!(display.ink().len(), 1);

        bus.deliver(slide(1));
        display.pump();
        assert!(display.ink().is_empty());
    }

    #[test]
    fn test_pointer_glyph() {
        let bus = RecordingBus::new();
        let mut display = DisplaySurface::mount(session(&bus), sample_deck(3));

        bus.deliver(BusMessage::pointer_move(None, Origin::Control));
        bus.deliver(BusMessage::pointer_move(Some(Point::new(0.6, 0.4)), Origin::Control));
        display.pump();
        assert_eq!(display.pointer(), Some(Point::new(0.6, 0.4)));

        bus.deliver(BusMessage::PointerActive {
            active: false,
            origin: Some(Origin::Control),
        });
        display.pump();
        assert_eq!(display.pointer(), None);
    }

    #[test]
    fn test_unknown_messages_ignored() {
        let bus = RecordingBus::new();
        let mut display = DisplaySurface::mount(session(&bus), sample_deck(3));
        bus.deliver(BusMessage::Unknown);
        bus.deliver(BusMessage::PresenterWindowCloseRequest);

        assert!(!display.pump());
        assert_eq!(display.view(), DisplayView::Waiting);
    }
}

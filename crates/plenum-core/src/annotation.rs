//! Drawing and laser-pointer authority between the two consoles.
//!
//! Control and presenter are peers: either may take the pen or the pointer,
//! but at most one console holds one of them at a time. The per-console view
//! is a single [`AnnotationMode`], so "drawing and pointing at once" cannot be
//! represented.
//!
//! Claims that cross on the wire are settled by [`Origin::outranks`]: the
//! outranked console yields, the other one re-announces its claim.

use kurbo::Point;

use crate::bus::SessionChannel;
use crate::ink::{InkLayer, Stroke};
use crate::protocol::{BusMessage, Origin, clear_source_id, decode_pointer, toggle_off_source_id};

/// What this console believes about annotation authority.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnnotationMode {
    #[default]
    Idle,
    /// This console holds the pen.
    LocalDrawing { eraser: bool },
    /// This console drives the laser pointer.
    LocalPointer { position: Option<Point> },
    /// The peer holds the pen; local tools stay disabled.
    RemoteDrawing { owner: Origin },
    /// The peer drives the laser pointer.
    RemotePointer { owner: Origin, position: Option<Point> },
}

/// Drawing authority as seen by one console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingAuthority {
    pub owner: Option<Origin>,
    pub active: bool,
}

/// Laser pointer state as seen by one console.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub active: bool,
    pub owner: Option<Origin>,
    /// `None` when hidden or inactive.
    pub position: Option<Point>,
}

/// Per-console annotation coordinator.
#[derive(Debug, Clone)]
pub struct AnnotationCoordinator {
    origin: Origin,
    mode: AnnotationMode,
    ink: InkLayer,
    /// Stroke being drawn locally, published when finished.
    stroke: Option<Stroke>,
}

impl AnnotationCoordinator {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            mode: AnnotationMode::Idle,
            ink: InkLayer::new(),
            stroke: None,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn mode(&self) -> &AnnotationMode {
        &self.mode
    }

    pub fn ink(&self) -> &InkLayer {
        &self.ink
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, AnnotationMode::LocalDrawing { .. })
    }

    pub fn is_eraser(&self) -> bool {
        matches!(self.mode, AnnotationMode::LocalDrawing { eraser: true })
    }

    pub fn is_pointer_active(&self) -> bool {
        matches!(self.mode, AnnotationMode::LocalPointer { .. })
    }

    /// The peer currently holding the pen, for the "peer is drawing" badge.
    pub fn peer_drawing(&self) -> Option<Origin> {
        match self.mode {
            AnnotationMode::RemoteDrawing { owner } => Some(owner),
            _ => None,
        }
    }

    pub fn drawing_authority(&self) -> DrawingAuthority {
        match self.mode {
            AnnotationMode::LocalDrawing { .. } => DrawingAuthority {
                owner: Some(self.origin),
                active: true,
            },
            AnnotationMode::RemoteDrawing { owner } => DrawingAuthority {
                owner: Some(owner),
                active: true,
            },
            _ => DrawingAuthority {
                owner: None,
                active: false,
            },
        }
    }

    pub fn pointer_state(&self) -> PointerState {
        match self.mode {
            AnnotationMode::LocalPointer { position } => PointerState {
                active: true,
                owner: Some(self.origin),
                position,
            },
            AnnotationMode::RemotePointer { owner, position } => PointerState {
                active: true,
                owner: Some(owner),
                position,
            },
            _ => PointerState {
                active: false,
                owner: None,
                position: None,
            },
        }
    }

    // --- Drawing ---

    /// Take the pen. Refused while the peer is drawing.
    pub fn start_drawing(&mut self, out: &SessionChannel) -> bool {
        match self.mode {
            AnnotationMode::LocalDrawing { .. } => return true,
            AnnotationMode::RemoteDrawing { owner } => {
                log::info!("{} is drawing, {} tools stay disabled", owner, self.origin);
                return false;
            }
            AnnotationMode::LocalPointer { .. } => self.disable_local_pointer(out),
            AnnotationMode::RemotePointer { owner, .. } => self.preempt_remote_pointer(out, owner),
            AnnotationMode::Idle => {}
        }

        self.mode = AnnotationMode::LocalDrawing { eraser: false };
        out.publish(BusMessage::PresenterDrawing {
            active: true,
            origin: self.origin,
        });
        log::debug!("{} started drawing", self.origin);
        true
    }

    /// Release the pen and wipe the shared canvas.
    ///
    /// Always publishes the release followed by exactly one clear.
    pub fn stop_drawing(&mut self, out: &SessionChannel) {
        if self.is_drawing() {
            self.mode = AnnotationMode::Idle;
        }
        self.stroke = None;

        out.publish(BusMessage::PresenterDrawing {
            active: false,
            origin: self.origin,
        });
        out.publish(BusMessage::DrawingClear {
            source_id: toggle_off_source_id(self.origin, out.id().as_str()),
        });
        self.ink.clear();
        log::debug!("{} stopped drawing", self.origin);
    }

    /// `D` key. Returns whether this console is drawing afterwards.
    pub fn toggle_drawing(&mut self, out: &SessionChannel) -> bool {
        if self.is_drawing() {
            self.stop_drawing(out);
            false
        } else {
            self.start_drawing(out)
        }
    }

    /// Wipe the shared canvas without touching authority.
    ///
    /// Returns whether local ink was removed; the clear is published either way.
    pub fn clear_canvas(&mut self, out: &SessionChannel) -> bool {
        out.publish(BusMessage::DrawingClear {
            source_id: clear_source_id(self.origin, out.id().as_str()),
        });
        self.ink.clear()
    }

    /// `E` key. Only meaningful while drawing; returns the eraser flag.
    pub fn toggle_eraser(&mut self) -> bool {
        if let AnnotationMode::LocalDrawing { eraser } = &mut self.mode {
            *eraser = !*eraser;
            *eraser
        } else {
            false
        }
    }

    /// Start a stroke at a normalized position.
    pub fn begin_stroke(&mut self, position: Point) {
        let AnnotationMode::LocalDrawing { eraser } = self.mode else {
            return;
        };
        if let Some(p) = decode_pointer(position.x, position.y) {
            self.stroke = Some(Stroke::begin(self.origin, p, eraser));
        }
    }

    pub fn extend_stroke(&mut self, position: Point) {
        if let (Some(stroke), Some(p)) = (self.stroke.as_mut(), decode_pointer(position.x, position.y)) {
            stroke.push(p);
        }
    }

    /// Finish the current stroke and publish it.
    pub fn end_stroke(&mut self, out: &SessionChannel) {
        let Some(stroke) = self.stroke.take() else {
            return;
        };
        if !self.is_drawing() {
            return;
        }
        if self.ink.apply_stroke(stroke.clone()) {
            out.publish(BusMessage::DrawingStroke {
                origin: self.origin,
                stroke,
            });
        }
    }

    // --- Pointer ---

    /// `L` key. Returns whether the local pointer is active afterwards.
    ///
    /// An active peer pointer is switched off instead of turning ours on.
    pub fn toggle_pointer_mode(&mut self, out: &SessionChannel) -> bool {
        match self.mode {
            AnnotationMode::RemotePointer { owner, .. } => {
                self.preempt_remote_pointer(out, owner);
                return false;
            }
            AnnotationMode::LocalPointer { .. } => {
                self.disable_local_pointer(out);
                return false;
            }
            AnnotationMode::RemoteDrawing { owner } => {
                log::info!("{} is drawing, pointer stays off", owner);
                return false;
            }
            AnnotationMode::LocalDrawing { .. } => self.stop_drawing(out),
            AnnotationMode::Idle => {}
        }

        self.mode = AnnotationMode::LocalPointer { position: None };
        out.publish(BusMessage::PointerActive {
            active: true,
            origin: Some(self.origin),
        });
        log::debug!("{} pointer on", self.origin);
        true
    }

    /// Pointer moved over the slide surface (normalized coordinates).
    pub fn pointer_moved(&mut self, out: &SessionChannel, position: Point) {
        let AnnotationMode::LocalPointer { position: current } = &mut self.mode else {
            return;
        };
        let decoded = decode_pointer(position.x, position.y);
        *current = decoded;
        out.publish(BusMessage::pointer_move(decoded, self.origin));
    }

    /// Pointer left the slide surface.
    pub fn pointer_left(&mut self, out: &SessionChannel) {
        let AnnotationMode::LocalPointer { position } = &mut self.mode else {
            return;
        };
        *position = None;
        out.publish(BusMessage::pointer_move(None, self.origin));
    }

    fn disable_local_pointer(&mut self, out: &SessionChannel) {
        out.publish(BusMessage::pointer_move(None, self.origin));
        out.publish(BusMessage::PointerActive {
            active: false,
            origin: Some(self.origin),
        });
        self.mode = AnnotationMode::Idle;
        log::debug!("{} pointer off", self.origin);
    }

    fn preempt_remote_pointer(&mut self, out: &SessionChannel, owner: Origin) {
        out.publish(BusMessage::pointer_move(None, self.origin));
        out.publish(BusMessage::PointerActive {
            active: false,
            origin: Some(owner),
        });
        self.mode = AnnotationMode::Idle;
        log::info!("{} switched off the {} pointer", self.origin, owner);
    }

    /// The slide changed; ink belonged to the previous one.
    pub fn slide_changed(&mut self) -> bool {
        self.stroke = None;
        self.ink.clear()
    }

    /// Release whatever this console holds (surface teardown).
    pub fn relinquish(&mut self, out: &SessionChannel) {
        match self.mode {
            AnnotationMode::LocalDrawing { .. } => self.stop_drawing(out),
            AnnotationMode::LocalPointer { .. } => self.disable_local_pointer(out),
            _ => {}
        }
    }

    /// The peer console went away without releasing what it held.
    ///
    /// Its pointer is hidden and its ink wiped on every surface, as its own
    /// release would have done. Returns whether local state changed.
    pub fn peer_gone(&mut self, owner: Origin, out: &SessionChannel) -> bool {
        match self.mode {
            AnnotationMode::RemotePointer { owner: current, .. } if current == owner => {
                self.preempt_remote_pointer(out, owner);
                true
            }
            AnnotationMode::RemoteDrawing { owner: current } if current == owner => {
                self.mode = AnnotationMode::Idle;
                out.publish(BusMessage::DrawingClear {
                    source_id: toggle_off_source_id(owner, out.id().as_str()),
                });
                self.ink.clear();
                log::info!("{} left while drawing, pen released", owner);
                true
            }
            _ => false,
        }
    }

    // --- Incoming ---

    /// Apply a message from the bus. Returns whether local state changed.
    pub fn handle(&mut self, message: &BusMessage, out: &SessionChannel) -> bool {
        match message {
            BusMessage::PresenterDrawing { active, origin } => {
                if *origin == self.origin {
                    return false;
                }
                if *active {
                    self.on_peer_claim(*origin, Claim::Drawing, out)
                } else {
                    self.on_peer_release(*origin, Claim::Drawing)
                }
            }
            BusMessage::PointerActive { active, origin } => {
                let owner = origin.unwrap_or(self.origin.peer());
                match (*active, owner == self.origin) {
                    (true, false) => self.on_peer_claim(owner, Claim::Pointer, out),
                    (false, false) => self.on_peer_release(owner, Claim::Pointer),
                    (false, true) => {
                        // The peer switched our pointer off.
                        if self.is_pointer_active() {
                            self.mode = AnnotationMode::Idle;
                            log::info!("{} pointer switched off by peer", self.origin);
                            true
                        } else {
                            false
                        }
                    }
                    (true, true) => false,
                }
            }
            BusMessage::PointerMove { x, y, origin } => {
                let sender = origin.unwrap_or(self.origin.peer());
                match &mut self.mode {
                    AnnotationMode::RemotePointer { owner, position } if *owner == sender => {
                        let decoded = decode_pointer(*x, *y);
                        let changed = *position != decoded;
                        *position = decoded;
                        changed
                    }
                    _ => false,
                }
            }
            BusMessage::DrawingClear { source_id } => {
                log::debug!("{} clear ({})", self.origin, source_id);
                self.ink.clear()
            }
            BusMessage::DrawingStroke { origin, stroke } => {
                *origin != self.origin && self.ink.apply_stroke(stroke.clone())
            }
            _ => false,
        }
    }

    fn on_peer_claim(&mut self, owner: Origin, claim: Claim, out: &SessionChannel) -> bool {
        let held = match self.mode {
            AnnotationMode::LocalDrawing { .. } => Some(Claim::Drawing),
            AnnotationMode::LocalPointer { .. } => Some(Claim::Pointer),
            _ => None,
        };

        if let Some(held) = held {
            if !owner.outranks(self.origin) {
                log::debug!("{} keeps {:?} against {} claim", self.origin, held, owner);
                out.publish(held.announce(self.origin));
                return false;
            }
            log::info!("{} yields {:?} to {}", self.origin, held, owner);
            if held == Claim::Pointer {
                out.publish(BusMessage::pointer_move(None, self.origin));
            }
            self.stroke = None;
        }

        let next = match claim {
            Claim::Drawing => AnnotationMode::RemoteDrawing { owner },
            Claim::Pointer => AnnotationMode::RemotePointer {
                owner,
                position: None,
            },
        };
        if self.mode == next {
            return false;
        }
        // A repeated pointer claim keeps the last known position.
        if let (
            AnnotationMode::RemotePointer { owner: current, .. },
            AnnotationMode::RemotePointer { .. },
        ) = (&self.mode, &next)
        {
            if *current == owner {
                return false;
            }
        }
        self.mode = next;
        true
    }

    fn on_peer_release(&mut self, owner: Origin, claim: Claim) -> bool {
        let released = match (&self.mode, claim) {
            (AnnotationMode::RemoteDrawing { owner: current }, Claim::Drawing) => *current == owner,
            (AnnotationMode::RemotePointer { owner: current, .. }, Claim::Pointer) => *current == owner,
            _ => false,
        };
        if released {
            self.mode = AnnotationMode::Idle;
        }
        released
    }
}

/// Kind of authority a console can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Drawing,
    Pointer,
}

impl Claim {
    fn announce(self, origin: Origin) -> BusMessage {
        match self {
            Claim::Drawing => BusMessage::PresenterDrawing { active: true, origin },
            Claim::Pointer => BusMessage::PointerActive {
                active: true,
                origin: Some(origin),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::{RecordingBus, session};
    use crate::bus::{ChannelId, InProcessBus, SessionChannel, Subscription};
    use std::rc::Rc;

    /// A console wired to an in-process bus.
    struct Console {
        coord: AnnotationCoordinator,
        out: SessionChannel,
        sub: Subscription,
    }

    impl Console {
        fn new(bus: &InProcessBus, origin: Origin) -> Self {
            let out = SessionChannel::new(Rc::new(bus.endpoint()), ChannelId::new("s42"));
            let sub = out.subscribe().unwrap();
            Self {
                coord: AnnotationCoordinator::new(origin),
                out,
                sub,
            }
        }

        fn pump(&mut self) -> usize {
            let messages = self.sub.drain();
            for msg in &messages {
                self.coord.handle(msg, &self.out);
            }
            messages.len()
        }
    }

    fn settle(a: &mut Console, b: &mut Console) {
        while a.pump() + b.pump() > 0 {}
    }

    fn drawers(a: &Console, b: &Console) -> usize {
        [a, b].iter().filter(|c| c.coord.is_drawing()).count()
    }

    #[test]
    fn test_start_drawing_publishes_claim() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);

        assert!(coord.start_drawing(&out));
        assert!(coord.is_drawing());
        assert!(!coord.is_eraser());
        assert_eq!(
            bus.take(),
            vec![BusMessage::PresenterDrawing {
                active: true,
                origin: Origin::Presenter
            }]
        );
    }

    #[test]
    fn test_stop_drawing_emits_release_then_one_clear() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.start_drawing(&out);
        bus.take();

        coord.stop_drawing(&out);

        assert!(!coord.is_drawing());
        assert_eq!(
            bus.take(),
            vec![
                BusMessage::PresenterDrawing {
                    active: false,
                    origin: Origin::Control
                },
                BusMessage::DrawingClear {
                    source_id: "control-s42-toggle-off".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_stop_drawing_when_idle_still_emits_pair() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);

        coord.stop_drawing(&out);

        let published = bus.take();
        assert_eq!(published.len(), 2);
        assert!(matches!(published[0], BusMessage::PresenterDrawing { active: false, .. }));
        assert!(matches!(published[1], BusMessage::DrawingClear { .. }));
    }

    #[test]
    fn test_peer_drawing_blocks_local_tools() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);

        assert!(coord.handle(
            &BusMessage::PresenterDrawing {
                active: true,
                origin: Origin::Presenter
            },
            &out
        ));
        assert_eq!(coord.peer_drawing(), Some(Origin::Presenter));

        assert!(!coord.start_drawing(&out));
        assert!(!coord.toggle_pointer_mode(&out));
        assert!(!coord.is_drawing());
        assert!(bus.take().is_empty());

        coord.handle(
            &BusMessage::PresenterDrawing {
                active: false,
                origin: Origin::Presenter,
            },
            &out,
        );
        assert_eq!(coord.peer_drawing(), None);
        assert!(coord.start_drawing(&out));
    }

    #[test]
    fn test_clear_canvas_twice() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.start_drawing(&out);
        coord.begin_stroke(Point::new(0.1, 0.1));
        coord.extend_stroke(Point::new(0.2, 0.2));
        coord.end_stroke(&out);
        assert_eq!(coord.ink().len(), 1);
        bus.take();

        assert!(coord.clear_canvas(&out));
        assert!(!coord.clear_canvas(&out));

        let clears: Vec<_> = bus.take();
        assert_eq!(clears.len(), 2);
        assert!(clears.iter().all(|m| *m
            == BusMessage::DrawingClear {
                source_id: "control-s42-clear".to_string()
            }));
        // Clearing does not touch authority.
        assert!(coord.is_drawing());
    }

    #[test]
    fn test_eraser_only_while_drawing() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);

        assert!(!coord.toggle_eraser());
        coord.start_drawing(&out);
        assert!(coord.toggle_eraser());
        assert!(coord.is_eraser());

        coord.begin_stroke(Point::new(0.5, 0.5));
        coord.end_stroke(&out);
        assert!(coord.ink().strokes()[0].eraser);

        // Restarting drawing resets the eraser.
        coord.stop_drawing(&out);
        coord.start_drawing(&out);
        assert!(!coord.is_eraser());
    }

    #[test]
    fn test_toggle_pointer_preempts_peer_pointer() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.handle(
            &BusMessage::PointerActive {
                active: true,
                origin: Some(Origin::Presenter),
            },
            &out,
        );
        assert!(coord.pointer_state().active);

        assert!(!coord.toggle_pointer_mode(&out));

        assert!(!coord.is_pointer_active());
        assert_eq!(*coord.mode(), AnnotationMode::Idle);
        assert_eq!(
            bus.take(),
            vec![
                BusMessage::pointer_move(None, Origin::Control),
                BusMessage::PointerActive {
                    active: false,
                    origin: Some(Origin::Presenter)
                },
            ]
        );
    }

    #[test]
    fn test_enabling_pointer_stops_drawing_first() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);
        coord.start_drawing(&out);
        bus.take();

        assert!(coord.toggle_pointer_mode(&out));

        assert!(!coord.is_drawing());
        assert!(coord.is_pointer_active());
        let kinds: Vec<_> = bus.take().iter().map(BusMessage::kind).collect();
        assert_eq!(kinds, vec!["presenter-drawing", "drawing-clear", "pointer-active"]);
        assert_eq!(coord.drawing_authority().active && coord.pointer_state().active, false);
    }

    #[test]
    fn test_disabling_pointer_hides_then_deactivates() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.toggle_pointer_mode(&out);
        bus.take();

        assert!(!coord.toggle_pointer_mode(&out));

        assert_eq!(
            bus.take(),
            vec![
                BusMessage::PointerMove {
                    x: -1.0,
                    y: -1.0,
                    origin: Some(Origin::Control)
                },
                BusMessage::PointerActive {
                    active: false,
                    origin: Some(Origin::Control)
                },
            ]
        );
    }

    #[test]
    fn test_pointer_moves_and_leave() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);

        // Not in pointer mode: nothing is published.
        coord.pointer_moved(&out, Point::new(0.5, 0.5));
        assert!(bus.take().is_empty());

        coord.toggle_pointer_mode(&out);
        bus.take();
        coord.pointer_moved(&out, Point::new(0.25, 0.75));
        coord.pointer_moved(&out, Point::new(0.3, 0.75));
        coord.pointer_left(&out);

        let published = bus.take();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0], BusMessage::pointer_move(Some(Point::new(0.25, 0.75)), Origin::Control));
        assert_eq!(published[2], BusMessage::pointer_move(None, Origin::Control));
        assert_eq!(coord.pointer_state().position, None);
        assert!(coord.pointer_state().active);
    }

    #[test]
    fn test_remote_pointer_position_tracks_sentinel() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);
        coord.handle(&BusMessage::PointerActive { active: true, origin: None }, &out);

        coord.handle(&BusMessage::pointer_move(None, Origin::Control), &out);
        assert_eq!(coord.pointer_state().position, None);

        coord.handle(
            &BusMessage::pointer_move(Some(Point::new(0.4, 0.6)), Origin::Control),
            &out,
        );
        assert_eq!(coord.pointer_state().position, Some(Point::new(0.4, 0.6)));
        assert_eq!(coord.pointer_state().owner, Some(Origin::Control));
    }

    #[test]
    fn test_own_pointer_switched_off_by_peer() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);
        coord.toggle_pointer_mode(&out);

        let changed = coord.handle(
            &BusMessage::PointerActive {
                active: false,
                origin: Some(Origin::Presenter),
            },
            &out,
        );

        assert!(changed);
        assert!(!coord.is_pointer_active());
    }

    #[test]
    fn test_strokes_mirror_to_peer_and_ignore_echo() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut control = AnnotationCoordinator::new(Origin::Control);
        let mut presenter = AnnotationCoordinator::new(Origin::Presenter);
        control.start_drawing(&out);
        control.begin_stroke(Point::new(0.1, 0.2));
        control.extend_stroke(Point::new(0.3, 0.4));
        control.end_stroke(&out);

        for msg in bus.take() {
            presenter.handle(&msg, &out);
            // Echo of its own stroke does not duplicate.
            control.handle(&msg, &out);
        }

        assert_eq!(presenter.ink().len(), 1);
        assert_eq!(control.ink().len(), 1);
        assert_eq!(presenter.peer_drawing(), Some(Origin::Control));
    }

    #[test]
    fn test_simultaneous_claims_settle_on_control() {
        let bus = InProcessBus::new();
        let mut control = Console::new(&bus, Origin::Control);
        let mut presenter = Console::new(&bus, Origin::Presenter);

        control.coord.start_drawing(&control.out);
        presenter.coord.start_drawing(&presenter.out);
        settle(&mut control, &mut presenter);

        assert!(control.coord.is_drawing());
        assert!(!presenter.coord.is_drawing());
        assert_eq!(presenter.coord.peer_drawing(), Some(Origin::Control));
    }

    #[test]
    fn test_drawing_claim_while_peer_points_yields_pointer() {
        let bus = InProcessBus::new();
        let mut control = Console::new(&bus, Origin::Control);
        let mut presenter = Console::new(&bus, Origin::Presenter);

        presenter.coord.toggle_pointer_mode(&presenter.out);
        settle(&mut control, &mut presenter);
        assert!(control.coord.pointer_state().active);

        assert!(control.coord.start_drawing(&control.out));
        settle(&mut control, &mut presenter);

        assert!(control.coord.is_drawing());
        assert!(!presenter.coord.is_pointer_active());
        assert_eq!(presenter.coord.peer_drawing(), Some(Origin::Control));
    }

    #[test]
    fn test_at_most_one_drawer_for_interleavings() {
        #[derive(Clone, Copy, Debug)]
        enum Op {
            Start,
            Stop,
            Pointer,
            Pump,
        }
        const OPS: [Op; 4] = [Op::Start, Op::Stop, Op::Pointer, Op::Pump];

        // Deterministic LCG so failures reproduce.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for _ in 0..200 {
            let bus = InProcessBus::new();
            let mut control = Console::new(&bus, Origin::Control);
            let mut presenter = Console::new(&bus, Origin::Presenter);

            for _ in 0..12 {
                let op = OPS[next() % OPS.len()];
                let console = if next() % 2 == 0 { &mut control } else { &mut presenter };
                match op {
                    Op::Start => {
                        console.coord.start_drawing(&console.out);
                    }
                    Op::Stop => {
                        if console.coord.is_drawing() {
                            console.coord.stop_drawing(&console.out);
                        }
                    }
                    Op::Pointer => {
                        console.coord.toggle_pointer_mode(&console.out);
                    }
                    Op::Pump => {
                        console.pump();
                    }
                }
                for c in [&control, &presenter] {
                    assert!(!(c.coord.drawing_authority().active && c.coord.pointer_state().active));
                }
            }

            settle(&mut control, &mut presenter);
            assert!(drawers(&control, &presenter) <= 1);
            let pointers = [&control, &presenter]
                .iter()
                .filter(|c| c.coord.is_pointer_active())
                .count();
            assert!(pointers <= 1);
            assert!(drawers(&control, &presenter) + pointers <= 1);
        }
    }

    #[test]
    fn test_relinquish_on_teardown() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Presenter);
        coord.toggle_pointer_mode(&out);
        bus.take();

        coord.relinquish(&out);

        assert_eq!(*coord.mode(), AnnotationMode::Idle);
        assert_eq!(bus.take().len(), 2);
    }

    #[test]
    fn test_peer_gone_frees_held_authority() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.handle(
            &BusMessage::PresenterDrawing {
                active: true,
                origin: Origin::Presenter,
            },
            &out,
        );
        assert!(!coord.start_drawing(&out));

        assert!(coord.peer_gone(Origin::Presenter, &out));
        assert_eq!(
            bus.take(),
            vec![BusMessage::DrawingClear {
                source_id: "presenter-s42-toggle-off".to_string()
            }]
        );
        assert!(coord.start_drawing(&out));
        bus.take();

        // Nothing left to free.
        assert!(!coord.peer_gone(Origin::Presenter, &out));
        assert!(bus.take().is_empty());
    }

    #[test]
    fn test_peer_gone_hides_peer_pointer() {
        let bus = RecordingBus::new();
        let out = session(&bus);
        let mut coord = AnnotationCoordinator::new(Origin::Control);
        coord.handle(
            &BusMessage::PointerActive {
                active: true,
                origin: Some(Origin::Presenter),
            },
            &out,
        );

        assert!(coord.peer_gone(Origin::Presenter, &out));

        assert_eq!(
            bus.take(),
            vec![
                BusMessage::pointer_move(None, Origin::Control),
                BusMessage::PointerActive {
                    active: false,
                    origin: Some(Origin::Presenter)
                },
            ]
        );
        assert!(coord.toggle_pointer_mode(&out));
    }
}

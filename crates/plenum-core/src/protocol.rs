//! Session message protocol.
//!
//! Every surface of a live session talks over one channel. Messages are JSON
//! objects discriminated by a kebab-case `type` tag:
//!
//! ```json
//! { "type": "request-init" }
//! { "type": "slide", "slide": 2, "sessionDate": "2026-10-19", "sessionTime": "18:00" }
//! { "type": "presenter-drawing", "active": true, "origin": "presenter" }
//! { "type": "drawing-clear", "sourceId": "control-s42-clear" }
//! { "type": "pointer-move", "x": 0.25, "y": 0.5, "origin": "control" }
//! ```
//!
//! Unknown `type` values decode to [`BusMessage::Unknown`] so that a newer
//! console never breaks an older one.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::ink::Stroke;

/// Wire coordinate meaning "pointer hidden".
pub const POINTER_SENTINEL: Point = Point::new(-1.0, -1.0);

/// Which interactive console a message speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Control,
    Presenter,
}

impl Origin {
    /// The other console.
    pub fn peer(self) -> Origin {
        match self {
            Origin::Control => Origin::Presenter,
            Origin::Presenter => Origin::Control,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Control => "control",
            Origin::Presenter => "presenter",
        }
    }

    /// Tie-break for simultaneous authority claims: control wins.
    pub fn outranks(self, other: Origin) -> bool {
        self == Origin::Control && other == Origin::Presenter
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slide position snapshot, carried by `init` and `slide`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidePayload {
    /// Slide index. Signed on the wire so skewed senders can be clamped.
    pub slide: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_time: Option<String>,
}

/// A message on a session channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BusMessage {
    /// Display asks control for the current position.
    RequestInit,
    /// Answer to `request-init`.
    Init(SlidePayload),
    /// Proactive broadcast after navigation.
    Slide(SlidePayload),
    /// A console took or released drawing authority.
    PresenterDrawing { active: bool, origin: Origin },
    /// Wipe the shared ink layer.
    DrawingClear { source_id: String },
    /// A finished annotation stroke.
    DrawingStroke { origin: Origin, stroke: Stroke },
    /// Laser pointer position in normalized slide coordinates.
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<Origin>,
    },
    /// Laser pointer mode of `origin` changed.
    PointerActive {
        active: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<Origin>,
    },
    /// Ask the presenter console to close its own window.
    PresenterWindowCloseRequest,
    /// Any `type` this build does not know.
    #[serde(other)]
    Unknown,
}

impl BusMessage {
    /// Pointer move for a normalized position, or the sentinel for `None`.
    pub fn pointer_move(position: Option<Point>, origin: Origin) -> Self {
        let p = position.unwrap_or(POINTER_SENTINEL);
        BusMessage::PointerMove {
            x: p.x,
            y: p.y,
            origin: Some(origin),
        }
    }

    /// Decode a frame. Malformed frames are dropped.
    pub fn decode(json: &str) -> Option<Self> {
        match serde_json::from_str::<BusMessage>(json) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::debug!("Dropping malformed bus frame: {}", e);
                None
            }
        }
    }

    /// Decode an already-parsed payload (relay frames carry payloads as values).
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value::<BusMessage>(value) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::debug!("Dropping malformed bus payload: {}", e);
                None
            }
        }
    }

    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    pub fn to_value(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::RequestInit => "request-init",
            BusMessage::Init(_) => "init",
            BusMessage::Slide(_) => "slide",
            BusMessage::PresenterDrawing { .. } => "presenter-drawing",
            BusMessage::DrawingClear { .. } => "drawing-clear",
            BusMessage::DrawingStroke { .. } => "drawing-stroke",
            BusMessage::PointerMove { .. } => "pointer-move",
            BusMessage::PointerActive { .. } => "pointer-active",
            BusMessage::PresenterWindowCloseRequest => "presenter-window-close-request",
            BusMessage::Unknown => "unknown",
        }
    }
}

/// Decode a wire coordinate: anything outside the unit square is hidden.
pub fn decode_pointer(x: f64, y: f64) -> Option<Point> {
    let inside = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
    if inside(x) && inside(y) {
        Some(Point::new(x, y))
    } else {
        None
    }
}

/// `source_id` for a clear issued by turning drawing off.
pub fn toggle_off_source_id(origin: Origin, session: &str) -> String {
    format!("{}-{}-toggle-off", origin, session)
}

/// `source_id` for an explicit clear.
pub fn clear_source_id(origin: Origin, session: &str) -> String {
    format!("{}-{}-clear", origin, session)
}

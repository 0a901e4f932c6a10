//! Plenum Core Library
//!
//! Keeps a live session's control console, presenter console and audience
//! display in sync over a named publish/subscribe bus: slide position,
//! shared annotation ink and the laser pointer.

pub mod annotation;
pub mod bus;
pub mod chrome;
pub mod config;
pub mod deck;
pub mod ink;
pub mod keymap;
pub mod protocol;
pub mod surface;
pub mod window;

pub use annotation::{AnnotationCoordinator, AnnotationMode, DrawingAuthority, PointerState};
pub use bus::{BusError, BusResult, ChannelId, InProcessBus, PeerId, SessionBus, SessionChannel, Subscription};
pub use chrome::{ChromeAutoHide, Edge};
pub use config::{ConfigError, PlenumConfig};
pub use deck::{DeckError, PresentationState, Slide, SlideDeck};
pub use ink::{InkLayer, Stroke};
pub use keymap::{ShortcutRegistry, SurfaceAction};
pub use protocol::{BusMessage, Origin};
pub use surface::{ControlSurface, DisplaySurface, DisplayView, PointerSample, PresenterSurface, Surface};
pub use window::{FullscreenHost, PresenterWindowManager, PresenterWindowState, WindowError};

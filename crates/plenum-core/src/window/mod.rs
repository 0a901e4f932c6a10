//! Presenter window lifecycle, owned by the control surface.
//!
//! Opening is acknowledged optimistically: once a window handle is obtained
//! the presenter counts as open. The presenter never reports back.

#[cfg(not(target_arch = "wasm32"))]
mod process;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use process::{ProcessLauncher, ProcessWindow};

#[cfg(target_arch = "wasm32")]
pub use web::{WebLauncher, WebWindow};

use thiserror::Error;

use crate::bus::SessionChannel;
use crate::config::PresenterWindowConfig;
use crate::protocol::BusMessage;

/// Window errors.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Window blocked: {0}")]
    Blocked(String),
    #[error("Failed to launch presenter: {0}")]
    Launch(String),
}

/// Result type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// Lifecycle of the presenter window as seen by control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenterWindowState {
    #[default]
    Closed,
    OpeningRequested,
    OpenAcknowledged,
    CloseRequested,
}

/// A handle to an opened presenter window.
pub trait PresenterWindow {
    /// Whether the window is gone (closed by the operator or exited).
    fn is_closed(&mut self) -> bool;

    /// Close the window.
    fn close(&mut self);
}

/// Platform-specific way of opening a presenter window.
pub trait WindowLauncher {
    /// Open a named window of the given size.
    fn open_named(&mut self, geometry: &PresenterWindowConfig) -> WindowResult<Box<dyn PresenterWindow>>;

    /// Open a plain window with platform defaults.
    fn open_plain(&mut self) -> WindowResult<Box<dyn PresenterWindow>>;
}

/// The surface's full-screen state.
pub trait FullscreenHost {
    fn is_fullscreen(&self) -> bool;
    fn enter_fullscreen(&mut self);
    fn exit_fullscreen(&mut self);
}

/// Opens, tracks and closes the presenter window.
pub struct PresenterWindowManager {
    launcher: Box<dyn WindowLauncher>,
    geometry: PresenterWindowConfig,
    state: PresenterWindowState,
    handle: Option<Box<dyn PresenterWindow>>,
}

impl PresenterWindowManager {
    pub fn new(launcher: Box<dyn WindowLauncher>, geometry: PresenterWindowConfig) -> Self {
        Self {
            launcher,
            geometry,
            state: PresenterWindowState::Closed,
            handle: None,
        }
    }

    pub fn state(&self) -> PresenterWindowState {
        self.state
    }

    /// Whether the presenter window is acknowledged and its handle still live.
    pub fn is_open(&mut self) -> bool {
        self.state == PresenterWindowState::OpenAcknowledged
            && self.handle.as_mut().is_some_and(|h| !h.is_closed())
    }

    /// Open the presenter window, leaving full-screen first.
    ///
    /// Tries a named, sized window, then falls back once to a plain one.
    pub fn open(&mut self, host: &mut dyn FullscreenHost) -> PresenterWindowState {
        if self.is_open() {
            return self.state;
        }
        if host.is_fullscreen() {
            log::debug!("Leaving full-screen before opening the presenter window");
            host.exit_fullscreen();
        }

        self.state = PresenterWindowState::OpeningRequested;
        let opened = self.launcher.open_named(&self.geometry).or_else(|e| {
            log::info!("Named presenter window unavailable ({}), trying a plain one", e);
            self.launcher.open_plain()
        });

        match opened {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = PresenterWindowState::OpenAcknowledged;
                log::info!("Presenter window open");
            }
            Err(e) => {
                self.handle = None;
                self.state = PresenterWindowState::Closed;
                log::warn!("Could not open the presenter window: {}", e);
            }
        }
        self.state
    }

    /// `P` key: open when closed, close when open.
    ///
    /// With a lost handle the presenter is asked over the bus to close itself.
    pub fn toggle(&mut self, host: &mut dyn FullscreenHost, out: &SessionChannel) -> PresenterWindowState {
        match self.state {
            PresenterWindowState::Closed => self.open(host),
            PresenterWindowState::OpenAcknowledged => {
                let live = self.handle.as_mut().is_some_and(|h| !h.is_closed());
                match self.handle.take() {
                    Some(mut handle) if live => {
                        handle.close();
                        log::info!("Presenter window closed");
                    }
                    _ => {
                        self.state = PresenterWindowState::CloseRequested;
                        log::info!("Presenter handle lost, asking it to close");
                        out.publish(BusMessage::PresenterWindowCloseRequest);
                    }
                }
                self.state = PresenterWindowState::Closed;
                self.state
            }
            // Transient states never outlive a call.
            PresenterWindowState::OpeningRequested | PresenterWindowState::CloseRequested => {
                self.state = PresenterWindowState::Closed;
                self.state
            }
        }
    }
}

//! Browser presenter window opened with `window.open`.

use super::{PresenterWindow, WindowError, WindowLauncher, WindowResult};
use crate::bus::ChannelId;
use crate::config::PresenterWindowConfig;

/// Opens the presenter page in a popup.
pub struct WebLauncher {
    url: String,
}

impl WebLauncher {
    /// Presenter page on the current origin for `session`.
    pub fn for_session(session: &ChannelId) -> WindowResult<Self> {
        let window = web_sys::window().ok_or_else(|| WindowError::Launch("No window".to_string()))?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| WindowError::Launch(format!("{:?}", e)))?;
        Ok(Self {
            url: format!("{}/?role=presenter&session={}", origin, session),
        })
    }
}

impl WindowLauncher for WebLauncher {
    fn open_named(&mut self, geometry: &PresenterWindowConfig) -> WindowResult<Box<dyn PresenterWindow>> {
        let window = web_sys::window().ok_or_else(|| WindowError::Launch("No window".to_string()))?;
        let features = format!("popup,width={},height={}", geometry.width, geometry.height);
        match window.open_with_url_and_target_and_features(&self.url, &geometry.name, &features) {
            Ok(Some(popup)) => Ok(Box::new(WebWindow { window: popup })),
            Ok(None) => Err(WindowError::Blocked(geometry.name.clone())),
            Err(e) => Err(WindowError::Blocked(format!("{:?}", e))),
        }
    }

    fn open_plain(&mut self) -> WindowResult<Box<dyn PresenterWindow>> {
        let window = web_sys::window().ok_or_else(|| WindowError::Launch("No window".to_string()))?;
        match window.open_with_url(&self.url) {
            Ok(Some(popup)) => Ok(Box::new(WebWindow { window: popup })),
            Ok(None) => Err(WindowError::Blocked(self.url.clone())),
            Err(e) => Err(WindowError::Blocked(format!("{:?}", e))),
        }
    }
}

/// A popup handle.
pub struct WebWindow {
    window: web_sys::Window,
}

impl PresenterWindow for WebWindow {
    fn is_closed(&mut self) -> bool {
        self.window.closed().unwrap_or(true)
    }

    fn close(&mut self) {
        if let Err(e) = self.window.close() {
            log::warn!("Failed to close presenter popup: {:?}", e);
        }
    }
}

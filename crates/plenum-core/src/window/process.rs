//! Native presenter window: a child `plenum-app presenter` process.

use super::{PresenterWindow, WindowError, WindowLauncher, WindowResult};
use crate::bus::ChannelId;
use crate::config::PresenterWindowConfig;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command};

/// Spawns the presenter console as a separate process.
pub struct ProcessLauncher {
    exe: PathBuf,
    session: ChannelId,
    deck: Option<PathBuf>,
    relay: String,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf, session: ChannelId, deck: Option<PathBuf>, relay: impl Into<String>) -> Self {
        Self {
            exe,
            session,
            deck,
            relay: relay.into(),
        }
    }

    /// Launcher re-running the current executable.
    pub fn current_exe(session: ChannelId, deck: Option<PathBuf>, relay: impl Into<String>) -> WindowResult<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| WindowError::Launch(format!("Cannot locate executable: {}", e)))?;
        Ok(Self::new(exe, session, deck, relay))
    }

    /// Command-line arguments for the presenter process.
    fn args(&self, geometry: Option<&PresenterWindowConfig>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "presenter".into(),
            "--session".into(),
            self.session.as_str().into(),
            "--relay".into(),
            self.relay.clone().into(),
        ];
        if let Some(deck) = &self.deck {
            args.push("--deck".into());
            args.push(deck.clone().into_os_string());
        }
        if let Some(geometry) = geometry {
            args.push("--window-name".into());
            args.push(geometry.name.clone().into());
            args.push("--width".into());
            args.push(geometry.width.to_string().into());
            args.push("--height".into());
            args.push(geometry.height.to_string().into());
        }
        args
    }

    fn spawn(&self, geometry: Option<&PresenterWindowConfig>) -> WindowResult<Box<dyn PresenterWindow>> {
        let child = Command::new(&self.exe)
            .args(self.args(geometry))
            .spawn()
            .map_err(|e| WindowError::Launch(format!("{}: {}", self.exe.display(), e)))?;
        log::debug!("Spawned presenter process {}", child.id());
        Ok(Box::new(ProcessWindow { child }))
    }
}

impl WindowLauncher for ProcessLauncher {
    fn open_named(&mut self, geometry: &PresenterWindowConfig) -> WindowResult<Box<dyn PresenterWindow>> {
        self.spawn(Some(geometry))
    }

    fn open_plain(&mut self) -> WindowResult<Box<dyn PresenterWindow>> {
        self.spawn(None)
    }
}

/// A running presenter process.
pub struct ProcessWindow {
    child: Child,
}

impl PresenterWindow for ProcessWindow {
    fn is_closed(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn close(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("Presenter process already gone: {}", e);
        }
        let _ = self.child.wait();
    }
}

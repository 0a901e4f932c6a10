//! Window shell around one surface.

use plenum_core::bus::{ChannelId, SessionBus, SessionChannel};
use plenum_core::config::PlenumConfig;
use plenum_core::deck::{DeckError, PresentationState, SlideDeck};
use plenum_core::keymap::ShortcutRegistry;
use plenum_core::surface::{ControlSurface, DisplaySurface, PointerSample, PresenterSurface, Surface};
use plenum_core::window::{FullscreenHost, PresenterWindowManager, WindowError, WindowLauncher};
use kurbo::Point;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use web_time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Fullscreen, Window, WindowId};

/// How often the bus is drained while nothing else wakes the loop.
const BUS_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("Control needs a slide deck (--deck)")]
    MissingDeck,
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

/// Result type for application startup.
pub type AppResult<T> = Result<T, AppError>;

/// Which surface this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Control,
    Presenter,
    Display,
}

impl Role {
    fn title(self) -> &'static str {
        match self {
            Role::Control => "Plenum Control",
            Role::Presenter => "Plenum Presenter",
            Role::Display => "Plenum Display",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub role: Role,
    pub session: ChannelId,
    pub deck: Option<SlideDeck>,
    /// Where `deck` was read from; handed on to spawned presenter windows.
    pub deck_path: Option<PathBuf>,
    pub session_date: Option<String>,
    pub session_time: Option<String>,
    pub window_name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub settings: PlenumConfig,
}

/// Bridges the winit window to the surfaces' full-screen requests.
struct WindowHost<'a>(&'a Window);

impl FullscreenHost for WindowHost<'_> {
    fn is_fullscreen(&self) -> bool {
        self.0.fullscreen().is_some()
    }

    fn enter_fullscreen(&mut self) {
        self.0.set_fullscreen(Some(Fullscreen::Borderless(None)));
    }

    fn exit_fullscreen(&mut self) {
        self.0.set_fullscreen(None);
    }
}

/// Runtime state once the window exists.
struct AppState {
    window: Arc<Window>,
    last_pointer: Option<PointerSample>,
    title: String,
}

/// Main application struct.
pub struct App {
    config: AppConfig,
    surface: Box<dyn Surface>,
    state: Option<AppState>,
}

impl App {
    /// Connect to the bus and mount the configured surface.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let out = SessionChannel::new(connect_bus(&config.settings.relay.url), config.session.clone());
        let deck = config.deck.clone();

        let surface: Box<dyn Surface> = match config.role {
            Role::Control => {
                let deck = deck.ok_or(AppError::MissingDeck)?;
                let windows = PresenterWindowManager::new(
                    presenter_launcher(&config)?,
                    config.settings.presenter_window.clone(),
                );
                let state = PresentationState::new(config.session_date.clone(), config.session_time.clone());
                Box::new(ControlSurface::mount(out, deck, state, windows, &config.settings.chrome)?)
            }
            Role::Presenter => Box::new(PresenterSurface::mount(out, deck, &config.settings.chrome)),
            Role::Display => Box::new(DisplaySurface::mount(out, deck.unwrap_or_default())),
        };

        Ok(Self {
            config,
            surface,
            state: None,
        })
    }

    /// Run the event loop until the window closes.
    pub fn run(self) -> AppResult<()> {
        let event_loop = EventLoop::new().map_err(|e| AppError::EventLoop(e.to_string()))?;

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::EventLoopExtWebSys;
            event_loop.spawn_app(self);
            Ok(())
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut app = self;
            event_loop
                .run_app(&mut app)
                .map_err(|e| AppError::EventLoop(e.to_string()))
        }
    }

    fn sample(window: &Window, position: PhysicalPosition<f64>) -> Option<PointerSample> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return None;
        }
        let (width, height) = (size.width as f64, size.height as f64);
        Some(PointerSample {
            normalized: Point::new(position.x / width, position.y / height),
            y: position.y,
            height,
        })
    }

    fn refresh_title(&mut self) {
        let Some(state) = &mut self.state else { return };
        let status = self.surface.status_line();
        let title = match &self.config.window_name {
            Some(name) => format!("{} - {}", name, status),
            None => format!("{} - {}", self.config.role.title(), status),
        };
        if title != state.title {
            state.window.set_title(&title);
            state.title = title;
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.surface.unmount();
        event_loop.exit();
    }
}

/// Relay bus if reachable, else a private in-process bus (unsynchronized).
#[cfg(not(target_arch = "wasm32"))]
fn connect_bus(url: &str) -> Rc<dyn SessionBus> {
    use plenum_core::bus::{InProcessBus, RelayBus};

    match RelayBus::connect(url) {
        Ok(bus) => {
            log::info!("Using relay at {}", bus.url());
            Rc::new(bus)
        }
        Err(e) => {
            log::warn!("Relay unavailable ({}), running without peers", e);
            Rc::new(InProcessBus::new().endpoint())
        }
    }
}

/// Browsing contexts of one origin share a `BroadcastChannel`; no relay.
#[cfg(target_arch = "wasm32")]
fn connect_bus(_url: &str) -> Rc<dyn SessionBus> {
    Rc::new(plenum_core::bus::BroadcastChannelBus::new())
}

/// Close the popup this page runs in; exiting the event loop leaves it open.
#[cfg(target_arch = "wasm32")]
fn close_page() {
    let Some(window) = web_sys::window() else { return };
    if let Err(e) = window.close() {
        log::warn!("Could not close the presenter page: {:?}", e);
    }
}

/// Presenter windows are this executable started in the presenter role.
#[cfg(not(target_arch = "wasm32"))]
fn presenter_launcher(config: &AppConfig) -> AppResult<Box<dyn WindowLauncher>> {
    let launcher = plenum_core::window::ProcessLauncher::current_exe(
        config.session.clone(),
        config.deck_path.clone(),
        config.settings.relay.url.clone(),
    )?;
    Ok(Box::new(launcher))
}

/// Presenter windows are popups of this page in the presenter role.
#[cfg(target_arch = "wasm32")]
fn presenter_launcher(config: &AppConfig) -> AppResult<Box<dyn WindowLauncher>> {
    Ok(Box::new(plenum_core::window::WebLauncher::for_session(&config.session)?))
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        log::info!("Creating window...");
        let title = self
            .config
            .window_name
            .clone()
            .unwrap_or_else(|| self.config.role.title().to_string());
        let window_attrs = Window::default_attributes()
            .with_title(&title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        // On WASM, attach the canvas to the page body
        #[cfg(target_arch = "wasm32")]
        let window_attrs = {
            use winit::platform::web::WindowAttributesExtWebSys;
            window_attrs.with_append(true)
        };

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                self.shutdown(event_loop);
                return;
            }
        };

        self.state = Some(AppState {
            window,
            last_pointer: None,
            title,
        });
        self.refresh_title();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else { return };
        let window = state.window.clone();

        match event {
            WindowEvent::CloseRequested => {
                self.shutdown(event_loop);
                return;
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if let Some(action) = ShortcutRegistry::action_for(code) {
                    log::debug!("Key {:?} -> {:?}", code, action);
                    self.surface.action(action, &mut WindowHost(&window), Instant::now());
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if let Some(sample) = Self::sample(&window, position) {
                    state.last_pointer = Some(sample);
                    self.surface.pointer_moved(sample, Instant::now());
                }
            }

            WindowEvent::CursorLeft { .. } => {
                state.last_pointer = None;
                self.surface.pointer_left();
            }

            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => match button_state {
                ElementState::Pressed => {
                    if let Some(sample) = state.last_pointer {
                        self.surface.pointer_pressed(sample);
                    }
                }
                ElementState::Released => self.surface.pointer_released(),
            },

            WindowEvent::RedrawRequested => {}

            _ => return,
        }

        self.refresh_title();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let changed = self.surface.pump() | self.surface.tick(now);
        if self.surface.should_close() {
            log::info!("Surface asked to close");
            self.shutdown(event_loop);
            #[cfg(target_arch = "wasm32")]
            close_page();
            return;
        }
        if changed {
            self.refresh_title();
        }

        let poll = now + BUS_POLL_INTERVAL;
        let wake = self.surface.next_deadline().map_or(poll, |deadline| deadline.min(poll));
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}

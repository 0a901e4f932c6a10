//! Main application entry point (native).

use clap::{Parser, ValueEnum};
use plenum_app::{App, AppConfig, Role};
use plenum_core::bus::ChannelId;
use plenum_core::config::PlenumConfig;
use plenum_core::deck::SlideDeck;
use plenum_core::keymap::ShortcutRegistry;
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Control,
    Presenter,
    Display,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Control => Role::Control,
            RoleArg::Presenter => Role::Presenter,
            RoleArg::Display => Role::Display,
        }
    }
}

#[derive(Parser)]
#[command(name = "plenum-app", about = "Live session presentation synchronizer")]
struct Args {
    /// Surface to run.
    #[arg(value_enum)]
    role: RoleArg,

    /// Session channel shared by every surface of one live session.
    #[arg(long)]
    session: String,

    /// Slide deck JSON file (required for control).
    #[arg(long)]
    deck: Option<PathBuf>,

    /// Relay WebSocket URL, overriding the config file.
    #[arg(long)]
    relay: Option<String>,

    /// Config file, instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session date shown on the display.
    #[arg(long)]
    session_date: Option<String>,

    /// Session time shown on the display.
    #[arg(long)]
    session_time: Option<String>,

    /// Window name (set when opened as the presenter window).
    #[arg(long)]
    window_name: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Print keyboard shortcuts and exit.
    #[arg(long)]
    list_shortcuts: bool,
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}

#[cfg(feature = "native")]
fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.list_shortcuts {
        ShortcutRegistry::print_all();
        return;
    }

    let mut settings = match &args.config {
        Some(path) => PlenumConfig::load(path).unwrap_or_else(|e| {
            log::warn!("Ignoring config: {}", e);
            PlenumConfig::default()
        }),
        None => PlenumConfig::load_or_default(),
    };
    if let Some(relay) = args.relay {
        settings.relay.url = relay;
    }

    let deck = match args.deck.as_deref().map(SlideDeck::load).transpose() {
        Ok(deck) => deck,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let config = AppConfig {
        role: args.role.into(),
        session: ChannelId::new(args.session),
        deck,
        deck_path: args.deck,
        session_date: args.session_date,
        session_time: args.session_time,
        window_name: args.window_name,
        width: args.width.unwrap_or(settings.presenter_window.width),
        height: args.height.unwrap_or(settings.presenter_window.height),
        settings,
    };
    log::info!("Starting Plenum {:?} on session {}", config.role, config.session);

    if let Err(e) = App::new(config).and_then(App::run) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

//! WASM entry point: the page URL picks the surface.
//!
//! `?role=control&session=s42` mounts control; the presenter popup it opens
//! loads `?role=presenter&session=s42`. The deck is read from a
//! `<script id="plenum-deck" type="application/json">` element on the page.

use crate::{App, AppConfig, Role};
use plenum_core::bus::ChannelId;
use plenum_core::config::PlenumConfig;
use plenum_core::deck::SlideDeck;
use wasm_bindgen::prelude::*;

const DECK_ELEMENT_ID: &str = "plenum-deck";

/// URL query parameters understood by the web build.
#[derive(Debug, Default, PartialEq)]
pub struct UrlParams {
    pub role: Option<Role>,
    pub session: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// Parse a query string such as `?role=display&session=s42`.
pub fn parse_params(search: &str) -> UrlParams {
    let mut params = UrlParams::default();
    for pair in search.trim_start_matches('?').split('&') {
        let mut parts = pair.splitn(2, '=');
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        match key {
            "role" => {
                params.role = match value {
                    "control" => Some(Role::Control),
                    "presenter" => Some(Role::Presenter),
                    "display" => Some(Role::Display),
                    other => {
                        log::warn!("Unknown role in URL: {}", other);
                        None
                    }
                }
            }
            "session" => params.session = Some(value.to_string()),
            "date" => params.date = Some(value.to_string()),
            "time" => params.time = Some(value.to_string()),
            _ => {}
        }
    }
    params
}

/// Get parameters from the current page URL.
pub fn get_url_params() -> UrlParams {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .map(|search| parse_params(&search))
        .unwrap_or_default()
}

/// Deck embedded in the page, if any.
fn embedded_deck() -> Option<SlideDeck> {
    let text = web_sys::window()?
        .document()?
        .get_element_by_id(DECK_ELEMENT_ID)?
        .text_content()?;
    match SlideDeck::from_json(&text) {
        Ok(deck) => Some(deck),
        Err(e) => {
            log::error!("Embedded deck is invalid: {}", e);
            None
        }
    }
}

/// Initialize and run the WASM application.
#[wasm_bindgen(start)]
pub fn run_wasm() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let params = get_url_params();
    let role = params.role.unwrap_or(Role::Display);
    let Some(session) = params.session else {
        log::error!("Missing ?session= in the page URL");
        return;
    };
    log::info!("Starting Plenum {:?} (WASM) on session {}", role, session);

    let settings = PlenumConfig::default();
    let config = AppConfig {
        role,
        session: ChannelId::new(session),
        deck: embedded_deck(),
        deck_path: None,
        session_date: params.date,
        session_time: params.time,
        window_name: None,
        width: settings.presenter_window.width,
        height: settings.presenter_window.height,
        settings,
    };

    if let Err(e) = App::new(config).and_then(App::run) {
        log::error!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params("?role=presenter&session=s42&date=2026-10-19");
        assert_eq!(params.role, Some(Role::Presenter));
        assert_eq!(params.session.as_deref(), Some("s42"));
        assert_eq!(params.date.as_deref(), Some("2026-10-19"));
        assert_eq!(params.time, None);
    }

    #[test]
    fn test_parse_params_skips_empty_and_unknown() {
        let params = parse_params("?role=audience&session=&foo=bar");
        assert_eq!(params, UrlParams::default());
    }
}

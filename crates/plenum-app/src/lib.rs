//! Plenum application shell for native and WASM.

mod app;

#[cfg(target_arch = "wasm32")]
mod web;

pub use app::{App, AppConfig, AppError, AppResult, Role};

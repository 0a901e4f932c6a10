//! Keyboard shortcuts for the interactive consoles.

use winit::keyboard::KeyCode;

/// Something a key press asks a surface to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    PrevSlide,
    NextSlide,
    FirstSlide,
    LastSlide,
    ToggleDrawing,
    ToggleEraser,
    ClearCanvas,
    TogglePointer,
    ToggleMenu,
    EnterFullscreen,
    ExitFullscreen,
    TogglePresenterWindow,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub codes: &'static [KeyCode],
    pub action: SurfaceAction,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        codes: &'static [KeyCode],
        action: SurfaceAction,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            codes,
            action,
            description,
        }
    }
}

const SHORTCUTS: &[Shortcut] = &[
    Shortcut::new("Left / Up", &[KeyCode::ArrowLeft, KeyCode::ArrowUp], SurfaceAction::PrevSlide, "Previous slide"),
    Shortcut::new(
        "Right / Down / Space",
        &[KeyCode::ArrowRight, KeyCode::ArrowDown, KeyCode::Space],
        SurfaceAction::NextSlide,
        "Next slide",
    ),
    Shortcut::new("Home", &[KeyCode::Home], SurfaceAction::FirstSlide, "First slide"),
    Shortcut::new("End", &[KeyCode::End], SurfaceAction::LastSlide, "Last slide"),
    Shortcut::new("D", &[KeyCode::KeyD], SurfaceAction::ToggleDrawing, "Toggle drawing"),
    Shortcut::new("E", &[KeyCode::KeyE], SurfaceAction::ToggleEraser, "Toggle eraser while drawing"),
    Shortcut::new("C", &[KeyCode::KeyC], SurfaceAction::ClearCanvas, "Clear annotations"),
    Shortcut::new("L", &[KeyCode::KeyL], SurfaceAction::TogglePointer, "Toggle laser pointer"),
    Shortcut::new("M", &[KeyCode::KeyM], SurfaceAction::ToggleMenu, "Toggle agenda menu"),
    Shortcut::new("F", &[KeyCode::KeyF], SurfaceAction::EnterFullscreen, "Enter full-screen"),
    Shortcut::new("Escape", &[KeyCode::Escape], SurfaceAction::ExitFullscreen, "Exit full-screen"),
    Shortcut::new(
        "P",
        &[KeyCode::KeyP],
        SurfaceAction::TogglePresenterWindow,
        "Open or close the presenter window (control only)",
    ),
];

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    pub fn all() -> &'static [Shortcut] {
        SHORTCUTS
    }

    /// Action bound to a physical key, if any.
    pub fn action_for(code: KeyCode) -> Option<SurfaceAction> {
        SHORTCUTS
            .iter()
            .find(|s| s.codes.contains(&code))
            .map(|s| s.action)
    }

    /// Print all shortcuts to console.
    pub fn print_all() {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in SHORTCUTS {
            println!("  {:22} {}", shortcut.key, shortcut.description);
        }
        println!();
    }
}

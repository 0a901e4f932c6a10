//! Slide deck and presentation state.
//!
//! The deck is supplied by the hosting application (session agenda data) and is
//! read-only for the lifetime of a live session.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Deck loading errors.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("Deck has no slides")]
    Empty,
    #[error("Deck parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for deck operations.
pub type DeckResult<T> = Result<T, DeckError>;

/// Kind of slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideKind {
    /// Session title slide.
    Cover,
    /// One item of the session agenda.
    AgendaItem,
}

/// A legislative document attached to an agenda item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideDocument {
    pub id: String,
    pub title: String,
}

/// A single slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    pub kind: SlideKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda_number: Option<u32>,
    #[serde(default)]
    pub documents: Vec<SlideDocument>,
}

impl Slide {
    /// Short label for window titles and status lines.
    pub fn label(&self) -> String {
        match (self.kind, self.agenda_number) {
            (SlideKind::AgendaItem, Some(n)) => format!("{}. {}", n, self.title),
            _ => self.title.clone(),
        }
    }
}

/// Ordered, stably identified sequence of slides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideDeck {
    slides: Vec<Slide>,
}

impl SlideDeck {
    /// Create a deck from slides.
    pub fn new(slides: Vec<Slide>) -> Self {
        Self { slides }
    }

    /// Parse a deck from JSON (either `{"slides": [...]}` or a bare array).
    pub fn from_json(json: &str) -> DeckResult<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Wrapped { slides: Vec<Slide> },
            Bare(Vec<Slide>),
        }

        let repr: Repr =
            serde_json::from_str(json).map_err(|e| DeckError::Parse(e.to_string()))?;
        let slides = match repr {
            Repr::Wrapped { slides } | Repr::Bare(slides) => slides,
        };
        Ok(Self { slides })
    }

    /// Load a deck from a JSON file.
    pub fn load(path: &Path) -> DeckResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| DeckError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Clamp an index into `[0, len - 1]`. Returns `None` for an empty deck.
    pub fn clamp_index(&self, index: i64) -> Option<usize> {
        if self.slides.is_empty() {
            return None;
        }
        let last = self.slides.len() as i64 - 1;
        Some(index.clamp(0, last) as usize)
    }
}

/// Presentation cursor plus session metadata.
///
/// The canonical copy lives in the control surface; other surfaces hold
/// disposable caches replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationState {
    pub current_slide_index: usize,
    pub session_date: Option<String>,
    pub session_time: Option<String>,
}

impl PresentationState {
    pub fn new(session_date: Option<String>, session_time: Option<String>) -> Self {
        Self {
            current_slide_index: 0,
            session_date,
            session_time,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_deck(len: usize) -> SlideDeck {
    let slides = (0..len)
        .map(|i| Slide {
            id: format!("slide-{}", i),
            kind: if i == 0 { SlideKind::Cover } else { SlideKind::AgendaItem },
            title: format!("Slide {}", i),
            subtitle: None,
            agenda_number: if i == 0 { None } else { Some(i as u32) },
            documents: Vec::new(),
        })
        .collect();
    SlideDeck::new(slides)
}

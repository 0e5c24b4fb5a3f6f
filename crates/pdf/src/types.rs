use std::fmt;

use examkit_core::question::Question;
use serde::Serialize;

/// A run of text as placed on the page.
///
/// `(x, y)` is the start of the baseline in PDF user space (y grows upward);
/// `height` is the effective font size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub ends_line: bool,
}

/// A raster image painted on the page.
///
/// `(x, y)` is the image's top-left corner in PDF user space, so the image
/// covers `[x, x + width]` horizontally and `[y - height, y]` vertically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageBlock {
    /// `data:image/png;base64,...` encoding of the decoded RGBA bitmap.
    pub data_url: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One positioned item extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Text(TextRun),
    Image(ImageBlock),
}

impl ContentItem {
    pub fn x(&self) -> f32 {
        match self {
            ContentItem::Text(t) => t.x,
            ContentItem::Image(i) => i.x,
        }
    }

    pub fn y(&self) -> f32 {
        match self {
            ContentItem::Text(t) => t.y,
            ContentItem::Image(i) => i.y,
        }
    }
}

/// A [`ContentItem`] tagged with the 1-based page it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedItem {
    pub page: u32,
    pub item: ContentItem,
}

/// Which reconstruction pass produced the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    Strict,
    Fallback,
}

impl fmt::Display for ReconstructionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructionMode::Strict => write!(f, "strict"),
            ReconstructionMode::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of running the question reconstructor.
#[derive(Debug, Clone)]
pub struct ReconstructionOutcome {
    pub questions: Vec<Question>,
    pub mode: ReconstructionMode,
}

/// Coarse pipeline milestones, reported in order through the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    PageStarted { page: u32, total: usize },
    PageImages { page: u32, count: usize },
    ShadowTextFiltered { removed: usize },
    Parsed { questions: usize, mode: ReconstructionMode },
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::PageStarted { page, total } => {
                write!(f, "Processing page {} of {}", page, total)
            }
            Progress::PageImages { page, count } => {
                write!(f, "Found {} image(s) on page {}", count, page)
            }
            Progress::ShadowTextFiltered { removed } => {
                write!(f, "Filtered {} overlapping text fragment(s)", removed)
            }
            Progress::Parsed { questions, mode } => {
                write!(f, "Parsed {} question(s) ({} mode)", questions, mode)
            }
        }
    }
}

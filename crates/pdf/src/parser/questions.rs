//! Question Reconstructor.
//!
//! Folds the merged content stream into [`Question`]s with a small state
//! machine driven by line-start patterns. When the strict pass recognizes
//! nothing, a looser chunking pass keeps long numbered passages as
//! placeholder questions so a reviewer still has something to edit.

use std::sync::OnceLock;

use examkit_core::question::{Question, QuestionOption};
use examkit_core::text::{join_with_space, normalize_whitespace};
use regex::Regex;

use crate::types::{ContentItem, PositionedItem, ReconstructionMode, ReconstructionOutcome};

/// Questions with fewer options are dropped from strict output.
pub const MIN_OPTIONS: usize = 2;

/// Fallback chunks must be longer than this after normalization.
pub const MIN_FALLBACK_CHARS: usize = 10;

const PLACEHOLDER_OPTIONS: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

fn question_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)^(?:q|question|ex|example)?\s*[.:-]?\s*\d+\s*[.)]").unwrap(),
            Regex::new(r"^\(\d+\)").unwrap(),
            Regex::new(r"^\d+[.)]\s*[A-Z]").unwrap(),
        ]
    })
}

fn option_patterns() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"^(?:[a-dA-D]|i{1,3}|iv|vi{0,3}|I{1,3}|IV|VI{0,3})[.)]").unwrap(),
            Regex::new(r"^\((?:[a-dA-D]|i{1,3}|iv|I{1,3}|IV)\)").unwrap(),
        ]
    })
}

fn chunk_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s").unwrap())
}

/// `1.`, `Q3)`, `Question 12.`, `(4)`, `7)What`...
pub fn is_question_start(text: &str) -> bool {
    let text = text.trim();
    question_patterns().iter().any(|re| re.is_match(text))
}

/// `a)`, `B.`, `iii)`, `(c)`...
pub fn is_option_start(text: &str) -> bool {
    let text = text.trim();
    option_patterns().iter().any(|re| re.is_match(text))
}

fn is_chunk_start(text: &str) -> bool {
    chunk_pattern().is_match(text.trim())
}

// ---------------------------------------------------------------------------
// Strict pass
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct OptionBuilder {
    text: String,
    image: Option<String>,
}

#[derive(Debug, Default)]
struct QuestionBuilder {
    text: String,
    image: Option<String>,
    options: Vec<OptionBuilder>,
}

impl QuestionBuilder {
    fn build(self) -> Question {
        let mut question = Question::new(normalize_whitespace(&self.text));
        question.image = self.image;
        question.options = self
            .options
            .into_iter()
            .map(|o| {
                let mut option = QuestionOption::new(normalize_whitespace(&o.text));
                option.image = o.image;
                option
            })
            .collect();
        question
    }
}

/// Strict-mode state: the question being built and whether its last option
/// is the active one.
#[derive(Debug, Default)]
struct Reconstructor {
    finished: Vec<QuestionBuilder>,
    current_question: Option<QuestionBuilder>,
    option_active: bool,
}

impl Reconstructor {
    fn feed(&mut self, item: &ContentItem) {
        match item {
            ContentItem::Text(run) => self.feed_text(&run.content),
            ContentItem::Image(block) => self.feed_image(&block.data_url),
        }
    }

    /// Question starts are checked before option starts, so a numbered line
    /// always closes the active option.
    fn feed_text(&mut self, content: &str) {
        if is_question_start(content) {
            self.flush();
            self.current_question = Some(QuestionBuilder {
                text: content.to_string(),
                ..Default::default()
            });
            return;
        }

        let Some(question) = self.current_question.as_mut() else {
            return;
        };

        if is_option_start(content) {
            question.options.push(OptionBuilder {
                text: content.to_string(),
                image: None,
            });
            self.option_active = true;
            return;
        }

        match question.options.last_mut() {
            Some(option) if self.option_active => join_with_space(&mut option.text, content),
            _ => join_with_space(&mut question.text, content),
        }
    }

    /// An image belongs to the active option when there is one, otherwise to
    /// the question. Each slot keeps its first image; later images for an
    /// occupied slot are dropped and never spill over to the question.
    fn feed_image(&mut self, data_url: &str) {
        let Some(question) = self.current_question.as_mut() else {
            return;
        };

        let slot = match question.options.last_mut() {
            Some(option) if self.option_active => &mut option.image,
            _ => &mut question.image,
        };
        if slot.is_none() {
            *slot = Some(data_url.to_string());
        }
    }

    fn flush(&mut self) {
        if let Some(question) = self.current_question.take() {
            self.finished.push(question);
        }
        self.option_active = false;
    }

    fn finish(mut self) -> Vec<QuestionBuilder> {
        self.flush();
        self.finished
    }
}

/// Strict pass: pattern-driven reconstruction, keeping only questions with
/// at least [`MIN_OPTIONS`] options.
pub fn reconstruct_strict(items: &[PositionedItem]) -> Vec<Question> {
    let mut state = Reconstructor::default();
    for positioned in items {
        state.feed(&positioned.item);
    }

    state
        .finish()
        .into_iter()
        .filter(|q| q.options.len() >= MIN_OPTIONS)
        .map(QuestionBuilder::build)
        .collect()
}

// ---------------------------------------------------------------------------
// Fallback pass
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Chunk {
    text: String,
    images: Vec<String>,
}

/// Fallback pass: split the stream at numbered runs and turn every chunk of
/// meaningful length into a question with four placeholder options.
pub fn reconstruct_fallback(items: &[PositionedItem]) -> Vec<Question> {
    let mut chunks: Vec<Chunk> = Vec::new();

    for positioned in items {
        match &positioned.item {
            ContentItem::Text(run) if is_chunk_start(&run.content) || chunks.is_empty() => {
                chunks.push(Chunk {
                    text: run.content.clone(),
                    images: Vec::new(),
                });
            }
            ContentItem::Text(run) => {
                if let Some(chunk) = chunks.last_mut() {
                    join_with_space(&mut chunk.text, &run.content);
                }
            }
            ContentItem::Image(block) => {
                if chunks.is_empty() {
                    chunks.push(Chunk::default());
                }
                if let Some(chunk) = chunks.last_mut() {
                    chunk.images.push(block.data_url.clone());
                }
            }
        }
    }

    chunks
        .into_iter()
        .filter_map(|chunk| {
            let text = normalize_whitespace(&chunk.text);
            if text.chars().count() <= MIN_FALLBACK_CHARS {
                return None;
            }
            let mut question = Question::new(text);
            question.image = chunk.images.into_iter().next();
            question.options = PLACEHOLDER_OPTIONS.iter().map(|t| QuestionOption::new(*t)).collect();
            Some(question)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run the strict pass, falling back to chunking when it recognizes nothing
/// in a non-empty stream.
pub fn reconstruct(items: &[PositionedItem]) -> ReconstructionOutcome {
    let questions = reconstruct_strict(items);
    if !questions.is_empty() || items.is_empty() {
        return ReconstructionOutcome {
            questions,
            mode: ReconstructionMode::Strict,
        };
    }

    log::info!("no numbered questions recognized, falling back to chunking");
    ReconstructionOutcome {
        questions: reconstruct_fallback(items),
        mode: ReconstructionMode::Fallback,
    }
}

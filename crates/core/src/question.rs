use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique identifier with the given prefix.
///
/// The identifier combines the current Unix time in milliseconds with a
/// monotonically increasing counter, so two calls never return the same value
/// within one process. It carries no ordering meaning for callers.
pub fn next_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, millis, seq)
}

/// The kind of question, as declared by the remote extraction path.
///
/// The PDF pipeline only ever produces [`QuestionKind::Mcq`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    #[default]
    Mcq,
    #[serde(rename = "MULTIMCQ")]
    MultiMcq,
    Integer,
    Matrix,
}

impl QuestionKind {
    /// Parse the model's `type` string. Unknown values fall back to `Mcq`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "MULTIMCQ" | "MULTI_MCQ" => QuestionKind::MultiMcq,
            "INTEGER" => QuestionKind::Integer,
            "MATRIX" => QuestionKind::Matrix,
            _ => QuestionKind::Mcq,
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Mcq => write!(f, "MCQ"),
            QuestionKind::MultiMcq => write!(f, "MULTIMCQ"),
            QuestionKind::Integer => write!(f, "INTEGER"),
            QuestionKind::Matrix => write!(f, "MATRIX"),
        }
    }
}

/// One answer choice of a [`Question`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    /// PNG data URL of the first image attached to this option.
    pub image: Option<String>,
    pub is_correct: bool,
}

impl QuestionOption {
    pub fn new(text: impl Into<String>) -> Self {
        QuestionOption {
            id: next_id("o"),
            text: text.into(),
            image: None,
            is_correct: false,
        }
    }
}

/// A reconstructed question, ready for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    /// PNG data URL of the first image attached to this question.
    pub image: Option<String>,
    pub multi_select: bool,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Question {
            id: next_id("q"),
            text: text.into(),
            image: None,
            multi_select: false,
            options: Vec::new(),
            kind: QuestionKind::Mcq,
            section: None,
            correct_answer: None,
            explanation: None,
        }
    }

    /// Number of options flagged as correct.
    pub fn correct_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_correct).count()
    }
}

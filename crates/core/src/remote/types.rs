use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One option as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    /// Positional letter, e.g. `"A"`.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// One question as returned by the model, following the schema the
/// extraction instruction asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelQuestion {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub section: Option<String>,
    /// One of `MCQ`, `MULTIMCQ`, `INTEGER`, `MATRIX`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub has_diagram: bool,
    #[serde(default)]
    pub options: Vec<ModelOption>,
    #[serde(default)]
    pub correct_answer_value: Option<serde_json::Value>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RemoteError {
    #[error("Model response contained no text")]
    EmptyResponse,
    #[error("Model response is not valid question JSON: {0}")]
    MalformedJson(String),
}

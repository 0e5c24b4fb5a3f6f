use serde_json::Value;

use super::types::{ModelQuestion, RemoteError};
use crate::question::{next_id, Question, QuestionKind, QuestionOption};
use crate::text::normalize_whitespace;

/// Strip markdown code fences from a model response.
///
/// Removes an opening ```` ```json ```` or ```` ``` ```` marker and a closing
/// ```` ``` ```` marker, returning the trimmed payload in between.
pub fn strip_code_fences(response: &str) -> String {
    let mut text = response.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```JSON") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim().to_string()
}

/// Pull the generated text out of a `generateContent` response.
///
/// Concatenates the `text` of every part of the first candidate. Returns
/// [`RemoteError::EmptyResponse`] if there is none.
pub fn extract_response_text(response: &Value) -> Result<String, RemoteError> {
    let parts = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .ok_or(RemoteError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(RemoteError::EmptyResponse);
    }

    Ok(text)
}

/// Parse the model's text answer into its question records.
///
/// Fences are stripped first. Anything that is not a JSON array of question
/// objects is a [`RemoteError::MalformedJson`].
pub fn parse_model_response(raw: &str) -> Result<Vec<ModelQuestion>, RemoteError> {
    let payload = strip_code_fences(raw);
    if payload.is_empty() {
        return Err(RemoteError::EmptyResponse);
    }
    serde_json::from_str::<Vec<ModelQuestion>>(&payload)
        .map_err(|e| RemoteError::MalformedJson(e.to_string()))
}

/// Map model records into the shared [`Question`] shape.
///
/// `multi_select` is set when the declared type is `MULTIMCQ` or more than
/// one option is marked correct.
pub fn map_questions(records: Vec<ModelQuestion>) -> Vec<Question> {
    records.into_iter().map(map_question).collect()
}

fn map_question(record: ModelQuestion) -> Question {
    let kind = QuestionKind::from_label(&record.kind);

    let options: Vec<QuestionOption> = record
        .options
        .into_iter()
        .enumerate()
        .map(|(i, opt)| QuestionOption {
            id: if opt.id.trim().is_empty() {
                positional_letter(i)
            } else {
                opt.id.trim().to_string()
            },
            text: normalize_whitespace(&opt.text),
            image: None,
            is_correct: opt.is_correct,
        })
        .collect();

    let correct = options.iter().filter(|o| o.is_correct).count();

    Question {
        id: next_id("q"),
        text: normalize_whitespace(&record.text),
        image: None,
        multi_select: kind == QuestionKind::MultiMcq || correct > 1,
        options,
        kind,
        section: record.section.filter(|s| !s.trim().is_empty()),
        correct_answer: record.correct_answer_value.and_then(value_to_answer),
        explanation: record.explanation.filter(|s| !s.trim().is_empty()),
    }
}

fn positional_letter(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    letter.to_string()
}

fn value_to_answer(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

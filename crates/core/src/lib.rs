//! Core library for examkit
//!
//! This crate implements the **Functional Core** of the examkit application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The examkit project splits its work across three crates:
//!
//! - **`examkit_core`** (this crate): Pure transformation functions with zero I/O
//! - **`pdf`**: The heuristic PDF question-extraction pipeline
//! - **`examkit`**: I/O operations and orchestration (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! All functions in this crate adhere to these principles:
//!
//! - **Pure functions**: Same input always produces the same output
//! - **No side effects**: No I/O operations, no network, no filesystem
//! - **Testable**: Can be tested with simple fixture data, no mocking required
//!
//! The only exception is [`question::next_id`], which reads the wall clock
//! and a process-wide counter to hand out unique identifiers.
//!
//! # Module Organization
//!
//! - [`question`]: The `Question` / `QuestionOption` records every extraction
//!   path produces
//! - [`text`]: Whitespace and ligature normalization for extracted strings
//! - [`remote`]: Prompt, request body, response parsing, and retry schedule
//!   for the model-backed extraction path
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use examkit_core::remote::{parse_model_response, map_questions};
//!
//! let raw = "```json\n[{\"id\": \"1\", \"type\": \"MCQ\", \"text\": \"2+2?\", \"options\": []}]\n```";
//! let parsed = parse_model_response(raw)?;
//! let questions = map_questions(parsed);
//! assert_eq!(questions.len(), 1);
//! ```

pub mod question;
pub mod remote;
pub mod text;

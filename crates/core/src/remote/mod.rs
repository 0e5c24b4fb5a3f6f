//! Pure pieces of the model-backed extraction path.
//!
//! The shell (`examkit::remote`) owns the HTTP client and the sleep between
//! attempts. Request building, response parsing and the backoff schedule
//! live here.

pub mod extract;
pub mod prompt;
pub mod retry;
pub mod types;

pub use extract::{extract_response_text, map_questions, parse_model_response, strip_code_fences};
pub use prompt::{build_request_body, EXTRACTION_INSTRUCTION};
pub use retry::RetryPolicy;
pub use types::{ModelOption, ModelQuestion, RemoteError};

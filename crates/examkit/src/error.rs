#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("{0} is not a PDF document")]
    NotPdf(String),

    #[error("No questions detected")]
    NoQuestions,

    #[error("Remote service returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Remote request failed: {0}")]
    RemoteTransport(String),

    #[error("Remote extraction failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("No API key: pass --api-key or set GEMINI_API_KEY")]
    MissingApiKey,
}

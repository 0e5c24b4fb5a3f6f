use base64::Engine;
use examkit_core::question::Question;
use examkit_core::remote::{
    build_request_body, extract_response_text, map_questions, parse_model_response, RetryPolicy,
};
use indicatif::ProgressBar;

use crate::prelude::*;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for the remote extraction model.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl RemoteConfig {
    /// Build a config from CLI values (which already fall back to the
    /// environment). The API key is required.
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Result<Self, Error> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;

        Ok(Self {
            api_key,
            model,
            base_url,
        })
    }

    pub fn endpoint(&self) -> String {
        f!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Send the whole PDF to the model and map its answer into [`Question`]s.
///
/// Transport failures and non-2xx statuses are retried per `policy`. A
/// successful response that does not hold question JSON fails immediately.
pub async fn extract_remote(
    config: &RemoteConfig,
    pdf: &[u8],
    policy: RetryPolicy,
    spinner: Option<&ProgressBar>,
) -> Result<Vec<Question>> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);
    let body = build_request_body(&encoded);
    let client = reqwest::Client::new();

    let raw = send_with_retry(&client, config, &body, policy, spinner).await?;

    set_spinner_msg(spinner, "Parsing model response...");
    let envelope: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| eyre!("Remote response is not JSON: {}", e))?;
    let text = extract_response_text(&envelope)?;
    let records = parse_model_response(&text)?;

    log::debug!("model returned {} question record(s)", records.len());
    Ok(map_questions(records))
}

async fn send_with_retry(
    client: &reqwest::Client,
    config: &RemoteConfig,
    body: &serde_json::Value,
    policy: RetryPolicy,
    spinner: Option<&ProgressBar>,
) -> Result<String, Error> {
    let mut attempt = 1;
    loop {
        set_spinner_msg(
            spinner,
            f!(
                "Asking {} (attempt {}/{})...",
                config.model,
                attempt,
                policy.max_attempts
            ),
        );

        let err = match send_once(client, config, body).await {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        match policy.delay_for(attempt) {
            Some(delay) => {
                log::warn!(
                    "remote attempt {} failed: {}; retrying in {:?}",
                    attempt,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: err.to_string(),
                })
            }
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    config: &RemoteConfig,
    body: &serde_json::Value,
) -> Result<String, Error> {
    let response = client
        .post(config.endpoint())
        .header("x-goog-api-key", &config.api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::RemoteTransport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::RemoteStatus {
            status: status.as_u16(),
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| Error::RemoteTransport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};

    const ANSWER: &str = r#"{"candidates": [{"content": {"parts": [{"text": "```json\n[{\"type\": \"MCQ\", \"text\": \"What is 2+2?\", \"options\": [{\"id\": \"A\", \"text\": \"3\", \"is_correct\": false}, {\"id\": \"B\", \"text\": \"4\", \"is_correct\": true}]}]\n```"}]}}]}"#;

    /// A stand-in for the model endpoint: fails `failures` times with 503,
    /// then answers with `reply`.
    struct Stub {
        failures: usize,
        reply: &'static str,
        calls: AtomicUsize,
        api_key: Mutex<Option<String>>,
    }

    async fn stub_handler(
        State(stub): State<Arc<Stub>>,
        headers: HeaderMap,
    ) -> (StatusCode, String) {
        let call = stub.calls.fetch_add(1, Ordering::SeqCst);
        *stub.api_key.lock().unwrap() = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if call < stub.failures {
            (StatusCode::SERVICE_UNAVAILABLE, "overloaded".to_string())
        } else {
            (StatusCode::OK, stub.reply.to_string())
        }
    }

    async fn spawn_stub(failures: usize, reply: &'static str) -> (RemoteConfig, Arc<Stub>) {
        let stub = Arc::new(Stub {
            failures,
            reply,
            calls: AtomicUsize::new(0),
            api_key: Mutex::new(None),
        });
        let app = axum::Router::new()
            .fallback(stub_handler)
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = RemoteConfig::new(
            Some("test-key".to_string()),
            DEFAULT_MODEL.to_string(),
            f!("http://{}/", addr),
        )
        .unwrap();
        (config, stub)
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_missing_api_key() {
        let err = RemoteConfig::new(None, DEFAULT_MODEL.into(), DEFAULT_BASE_URL.into()).unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));

        let err = RemoteConfig::new(Some("  ".into()), DEFAULT_MODEL.into(), DEFAULT_BASE_URL.into())
            .unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[test]
    fn test_endpoint() {
        let config = RemoteConfig::new(
            Some("k".into()),
            "gemini-2.0-flash".into(),
            "https://example.com/v1beta/".into(),
        )
        .unwrap();
        assert_eq!(
            config.endpoint(),
            "https://example.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let (config, stub) = spawn_stub(2, ANSWER).await;

        let questions = extract_remote(&config, b"%PDF-1.4", fast_policy(5), None)
            .await
            .unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stub.api_key.lock().unwrap().as_deref(), Some("test-key"));
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "What is 2+2?");
        assert!(questions[0].options[1].is_correct);
        assert!(!questions[0].multi_select);
    }

    #[tokio::test]
    async fn test_surfaces_last_error_after_exhausting_retries() {
        let (config, stub) = spawn_stub(usize::MAX, ANSWER).await;

        let err = extract_remote(&config, b"%PDF-1.4", fast_policy(3), None)
            .await
            .unwrap_err();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        match err.downcast_ref::<Error>() {
            Some(Error::RetriesExhausted { attempts, last }) => {
                assert_eq!(*attempts, 3);
                assert!(last.contains("503"), "{}", last);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_answer_is_not_retried() {
        let reply = r#"{"candidates": [{"content": {"parts": [{"text": "[{\"text\": "}]}}]}"#;
        let (config, stub) = spawn_stub(0, reply).await;

        let err = extract_remote(&config, b"%PDF-1.4", fast_policy(5), None)
            .await
            .unwrap_err();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("not valid question JSON"), "{}", err);
    }
}

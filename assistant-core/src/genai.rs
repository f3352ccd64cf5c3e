use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::GenerationRequest,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[async_trait]
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    /// Run one generation. `Ok(None)` means the upstream answered without a
    /// candidate, which is not an error.
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>>;
}

/// Bounded retry with exponential backoff for transient upstream failures.
///
/// The delay before attempt `n` (0-indexed, n >= 1) is
/// `min(base * 2^n, cap)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000, 5000)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Client for the generative-language `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
    http: Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            http: Client::new(),
        }
    }

    /// Point the client at a different upstream, e.g. a local stub in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn attempt(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> std::result::Result<Option<String>, Attempt> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateBody::from_request(request);

        let res = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::warn!("generation request failed to send: {e}");
                Attempt::Transient(Error::GenerationFailed(format!("transport error: {e}")))
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            log::warn!("failed to read generation response body: {e}");
            Attempt::Transient(Error::GenerationFailed(format!("unreadable response body: {e}")))
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            log::warn!("generation upstream rate limited (429)");
            return Err(Attempt::Transient(Error::GenerationFailed("rate limited (429)".into())));
        }
        if !status.is_success() {
            log::warn!(
                "generation request failed with status {status}: {}",
                truncate_body(&text)
            );
            return Err(Attempt::Fatal(Error::GenerationFailed(format!(
                "upstream status {status}"
            ))));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            log::warn!("failed to parse generation JSON: {e}: {}", truncate_body(&text));
            Attempt::Fatal(Error::GenerationFailed(format!("malformed response: {e}")))
        })?;

        Ok(parsed.first_text())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        let Some(api_key) = self.api_key.as_deref() else {
            log::error!("generation attempted without GEMINI_API_KEY configured");
            return Err(Error::GenerationFailed("GEMINI_API_KEY is not configured".into()));
        };

        let mut last_err: Option<Error> = None;
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                log::warn!(
                    "retrying generation, attempt {} of {} after {:?}",
                    attempt + 1,
                    self.retry.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(api_key, request).await {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Transient(err)) => last_err = Some(err),
            }
        }

        log::warn!("generation retries exhausted after {} attempts", self.retry.max_attempts);
        Err(last_err.unwrap_or_else(|| Error::GenerationFailed("no attempts were made".into())))
    }
}

/// Outcome of a single upstream call: transient failures are retried while
/// attempts remain, fatal ones propagate immediately.
enum Attempt {
    Transient(Error),
    Fatal(Error),
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl<'a> GenerateBody<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &request.prompt }],
            }],
            system_instruction: request
                .system_instruction
                .as_deref()
                .map(|text| Content { role: None, parts: vec![Part { text }] }),
            generation_config: request
                .json_output
                .then_some(GenerationConfig { response_mime_type: "application/json" }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX { format!("{}...", &body[..MAX]) } else { body.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(Some("gem-key".into()))
            .with_base_url(server.uri())
            .with_retry(RetryPolicy::new(3, 1, 5))
    }

    fn reply_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        // Capped from here on.
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(5000));
    }

    #[test]
    fn body_includes_system_instruction_and_json_mode() {
        let request = GenerationRequest::new("hello")
            .with_system_instruction("be brief")
            .with_json_output();

        let body = serde_json::to_value(GenerateBody::from_request(&request))
            .expect("body must serialize");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn plain_request_omits_optional_fields() {
        let request = GenerationRequest::new("hello");
        let body = serde_json::to_value(GenerateBody::from_request(&request))
            .expect("body must serialize");

        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn success_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let text = client.generate(&GenerationRequest::new("hello")).await.expect("generate");

        assert_eq!(text.as_deref(), Some("hi there"));
    }

    #[tokio::test]
    async fn missing_candidates_is_none_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let text = client.generate(&GenerationRequest::new("hello")).await.expect("generate");

        assert!(text.is_none());
    }

    #[tokio::test]
    async fn retries_past_rate_limiting() {
        let server = MockServer::start().await;
        // First two calls are throttled, the third succeeds.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("eventually")))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let text = client.generate(&GenerationRequest::new("hello")).await.expect("generate");

        assert_eq!(text.as_deref(), Some("eventually"));
    }

    #[tokio::test]
    async fn gives_up_after_three_rate_limited_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.generate(&GenerationRequest::new("hello")).await.unwrap_err();

        assert!(matches!(err, Error::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn non_transient_status_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.generate(&GenerationRequest::new("hello")).await.unwrap_err();

        assert!(matches!(err, Error::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn malformed_response_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.generate(&GenerationRequest::new("hello")).await.unwrap_err();

        assert!(matches!(err, Error::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GeminiClient::new(None).with_base_url(server.uri());
        let err = client.generate(&GenerationRequest::new("hello")).await.unwrap_err();

        assert!(matches!(err, Error::GenerationFailed(_)));
    }
}

use thiserror::Error;

/// Failures surfaced by the upstream clients and request validation.
///
/// Display messages are what callers may see; the payload strings carry the
/// upstream detail and only ever reach the logs via `Debug`.
#[derive(Debug, Error)]
pub enum Error {
    /// Required input was missing or malformed. Maps to HTTP 400.
    #[error("{0}")]
    InvalidRequest(String),

    /// The weather upstream reports the queried location does not exist.
    /// Maps to HTTP 404.
    #[error("location not found")]
    NotFound,

    /// The weather upstream failed, answered with a non-success status, or
    /// returned a payload we could not use. Maps to HTTP 500.
    #[error("weather service unavailable")]
    UpstreamUnavailable(String),

    /// The language-model upstream failed after retries or answered with a
    /// non-success status. Maps to HTTP 500.
    #[error("text generation failed")]
    GenerationFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

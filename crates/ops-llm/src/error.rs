use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("No LLM provider available")]
    NoProvider,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("Unexpected {provider} response: {detail}")]
    MalformedResponse {
        provider: &'static str,
        detail: String,
    },
}

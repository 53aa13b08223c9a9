use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One outbound call to a generation provider
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Structured-output schema constraining the reply shape
    pub schema: Value,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Transport(String),
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("{0}")]
    EmptyReply(String),
    #[error("missing API key")]
    MissingApiKey,
    /// Failure with no usable detail
    #[error("unknown error")]
    Unknown,
}

impl BackendError {
    /// Human-readable detail, if the failure carried any
    pub fn detail(&self) -> Option<String> {
        match self {
            BackendError::Unknown => None,
            BackendError::Transport(m) | BackendError::EmptyReply(m) if m.trim().is_empty() => {
                None
            }
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send the request and return the reply's primary text payload
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}

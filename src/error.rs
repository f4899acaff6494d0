use thiserror::Error;

use crate::request::Endpoint;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Request to {endpoint} failed after {attempts} attempt(s): {reason}")]
    Transport {
        endpoint: Endpoint,
        attempts: u32,
        reason: String,
    },

    #[error("Couldn't decode {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Expected {expected} region results, but the workers only handed over {received}.")]
    MissingRegionResults { expected: usize, received: usize },

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>, reason: impl ToString) -> Self {
        Error::Decode {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a single failed request attempt.
#[derive(Debug, Error)]
pub enum SendError {
    /// Connection errors, timeouts, 5xx and 429 responses.
    #[error("{0}")]
    Retryable(String),
    /// Any other non-2xx response.
    #[error("{0}")]
    Rejected(String),
}

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Order {0} is not registered in the accrual system")]
    NotRegistered(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl AccrualError {
    /// Map a reqwest failure, singling out timeouts
    pub fn from_request(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AccrualError::Timeout
        } else {
            AccrualError::Http(e)
        }
    }
}

use thiserror::Error;

/// Why a schedule fetch produced no usable data. Every variant is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("schedule request failed: {0}")]
    Transport(String),
    #[error("schedule HTTP error: {0}")]
    HttpStatus(u16),
    #[error("schedule payload has no events")]
    EmptyPayload,
    #[error("invalid schedule JSON response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Short message shown in the overlay while waiting for the retry.
    pub fn display_message(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "Connection error",
            FetchError::HttpStatus(_) => "Error fetching data",
            FetchError::EmptyPayload | FetchError::Parse(_) => "No Metaforge data available",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::HttpStatus(status.as_u16()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

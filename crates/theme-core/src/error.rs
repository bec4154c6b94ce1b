use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by an AI theme classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClassifierError {
    /// Only rate-limit class failures are worth another attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClassifierError::RateLimited(_))
    }

    /// Classify an upstream error message; quota wording counts as a rate limit.
    pub fn from_message(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        match status {
            Some(429) => ClassifierError::RateLimited(message),
            Some(401) | Some(403) => ClassifierError::Unauthorized(message),
            _ if lower.contains("429") || lower.contains("quota") => {
                ClassifierError::RateLimited(message)
            }
            Some(code) if code >= 500 => ClassifierError::Unavailable(message),
            _ => ClassifierError::InvalidResponse(message),
        }
    }
}

pub type ThemeResult<T> = Result<T, ThemeError>;

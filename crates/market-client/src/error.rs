use thiserror::Error;

/// Failures talking to the market-data gateway.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway still throttling {path} after {attempts} attempts")]
    Throttled { path: String, attempts: u32 },

    #[error("HTTP {status} for {path}: {body}")]
    Status { path: String, status: u16, body: String },

    #[error("Malformed payload from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ClientError::Throttled { .. })
    }
}

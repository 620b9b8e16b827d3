use thiserror::Error;

/// Failures surfaced by the remote endpoints and the process action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport failure (connection refused, DNS, TLS, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body was not the JSON shape we expected
    #[error("Parse error: {0}")]
    Parse(String),

    /// Server answered with a non-2xx status
    #[error("Server responded with status {0}")]
    HttpStatus(u16),

    /// Process action invoked before a company URL was resolved
    #[error("No company URL selected")]
    MissingUrl,
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Parse(e.to_string())
    }
}

impl From<hyper::Error> for ApiError {
    fn from(e: hyper::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

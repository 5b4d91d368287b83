use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Failures raised by an [`HttpTransport`](crate::transport::HttpTransport).
///
/// Non-2xx statuses are never reported here; they come back as ordinary
/// responses.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Body error: {0}")]
    Body(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_convert_into_gateway_errors() {
        let err: GatewayError = TransportError::Cancelled.into();
        assert!(matches!(err, GatewayError::Transport(TransportError::Cancelled)));
        assert_eq!(err.to_string(), "Request cancelled");
    }

    #[test]
    fn timeout_reports_the_deadline() {
        let err = TransportError::Timeout(Duration::from_millis(250));
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "Request timed out after 250ms");
    }
}

use std::time::Duration;

/// Typed error hierarchy for backend API operations.
/// Classifies errors as rejections (caller mistakes) or degradable failures
/// the analysis loop can absorb by continuing with empty results.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    // Rejections
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Degradable
    #[error("service error: {0}")]
    Service(String),
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the analysis loop may swallow this error and proceed with
    /// an empty result instead of aborting.
    pub fn is_degradable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Service(_) => "service_error",
            Self::Http { .. } => "http_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode_error",
        }
    }

    /// Wrap a non-success HTTP status. Anything the wire returns is a
    /// degradable failure; `InvalidRequest` is reserved for local
    /// validation before a request is ever sent.
    pub fn from_status(status: u16, body: String) -> Self {
        Self::Http { status, body }
    }
}

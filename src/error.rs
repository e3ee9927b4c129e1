use isahc::http::{Method, StatusCode};
use thiserror::Error;

/// A non-429 4xx response, decoded into Discord's JSON error body.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub code: Option<i64>,
    pub status: StatusCode,
    pub method: Method,
    pub url: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} {}: {}",
            self.method,
            self.url,
            self.status.as_u16(),
            self.code.map(|c| c.to_string()).unwrap_or_default(),
            self.message
        )
    }
}

impl std::error::Error for ApiError {}

/// A 5xx response that survived retries without recovering.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub status_text: String,
    pub method: Method,
    pub url: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.method,
            self.url,
            self.status.as_u16(),
            self.status_text
        )
    }
}

impl std::error::Error for HttpError {}

/// Raised by the host transport; opaque to this crate by design (§4.H
/// leaves the concrete transport's error type to the transport impl).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Invalid or missing dispatcher configuration (e.g. no token and none in
/// the environment, when one is required).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConfigurationError(pub String);

/// Reserved for the out-of-scope route catalog / REST facade layer: a
/// request built against this crate's generic surface can still fail
/// request assembly (e.g. an unresolvable URL template), which is surfaced
/// here rather than invented by a caller.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request to {0} timed out after exhausting retries")]
    Timeout(String),

    #[error(transparent)]
    Http(HttpError),

    #[error(transparent)]
    Api(ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl From<HttpError> for DispatchError {
    fn from(e: HttpError) -> Self {
        DispatchError::Http(e)
    }
}

impl From<ApiError> for DispatchError {
    fn from(e: ApiError) -> Self {
        DispatchError::Api(e)
    }
}

//! Error types for Scoreline

/// Result type alias using Scoreline's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Scoreline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (missing environment, bad config file)
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A model artifact could not be found or decoded
    #[error("artifact error: {0}")]
    Artifact(String),

    /// The inference graph could not be built or inspected
    #[error("model error: {0}")]
    Model(String),

    /// The request body is not a usable payload
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The feature vector has the wrong number of values
    #[error("shape error: {0}")]
    Shape(String),

    /// Feature scaling failed
    #[error("scaler error: {0}")]
    Scaler(String),

    /// Graph execution or output extraction failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new artifact error
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new invalid payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Create a new shape error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a new scaler error
    pub fn scaler(msg: impl Into<String>) -> Self {
        Self::Scaler(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable short code for this error, used in metrics labels and the
    /// `x-scoreline-error` response header.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Artifact(_) => "artifact",
            Self::Model(_) => "model",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Shape(_) => "shape",
            Self::Scaler(_) => "scaler",
            Self::Inference(_) => "inference",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether this error belongs to the request path rather than startup
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::Shape(_)
                | Self::Scaler(_)
                | Self::Inference(_)
                | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(Error::config("x").kind(), "config");
        assert_eq!(Error::invalid_payload("x").kind(), "invalid_payload");
        assert_eq!(Error::shape("x").kind(), "shape");
        assert_eq!(Error::inference("x").kind(), "inference");
    }

    #[test]
    fn test_request_errors() {
        assert!(Error::shape("wrong length").is_request_error());
        assert!(Error::scaler("bad").is_request_error());
        assert!(!Error::config("missing env").is_request_error());
        assert!(!Error::artifact("corrupt").is_request_error());
    }

    #[test]
    fn test_display() {
        let err = Error::shape("expected 6 features, got 3");
        assert_eq!(err.to_string(), "shape error: expected 6 features, got 3");
    }
}

//! Error types for maksu operations.
//!
//! The taxonomy separates conditions a caller must react to differently:
//! configuration problems surface at adapter construction, transport and
//! protocol problems surface from remote calls, and ordinary verification
//! failures are *not* errors at all: they are `Ok(false)` results from the
//! verify operations.

/// Comprehensive error type for maksu operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required initialization parameter is absent or empty.
    #[error("missing required '{0}' parameter in initialization string")]
    MissingParameter(&'static str),

    /// An initialization parameter is present but unusable.
    #[error("invalid '{parameter}' parameter: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the initialization string.
        parameter: &'static str,
        /// Reason the value was rejected.
        reason: String,
    },

    /// Key material (PEM private key or certificate) could not be loaded.
    #[error("failed to load key material: {0}")]
    Key(String),

    /// Network-level failure while talking to a remote verification service.
    #[error("transport error: {0}")]
    Transport(String),

    /// An in-flight remote verification was cancelled by the caller.
    #[error("verification request cancelled")]
    Cancelled,

    /// A remote service answered outside its documented response grammar.
    ///
    /// This indicates an integration break rather than a declined payment,
    /// so it is surfaced loudly instead of being folded into `Ok(false)`.
    /// The raw response payload is carried for diagnosis.
    #[error("{message}")]
    Protocol {
        /// Human-readable description of the unexpected shape.
        message: String,
        /// Raw response body, when one was received.
        response: Option<String>,
    },

    /// RSA signing failed; indicates unusable key material.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl Error {
    /// Create a protocol error carrying the offending raw response.
    pub fn protocol(message: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            response: Some(response.into()),
        }
    }

    /// Raw response payload attached to a protocol error, if any.
    pub fn response_content(&self) -> Option<&str> {
        match self {
            Self::Protocol { response, .. } => response.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_carries_response() {
        let err = Error::protocol("service returned unknown response", "garbage body");
        assert_eq!(err.response_content(), Some("garbage body"));
        assert_eq!(err.to_string(), "service returned unknown response");
    }

    #[test]
    fn missing_parameter_names_the_key() {
        let err = Error::MissingParameter("secret");
        assert!(err.to_string().contains("'secret'"));
    }
}

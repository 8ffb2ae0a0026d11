//! Error types for the Switchboard runtime.
//!
//! Every failure the registry, dispatcher and proxy can produce is a variant of
//! [`RpcError`]. On the wire all of them flatten to the `Display` message; the
//! richer kinds exist for callers that want to branch on them.

use serde_json::Value;
use thiserror::Error;

/// Boxed error used as the source of handler and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the Switchboard runtime.
#[derive(Debug, Error)]
pub enum RpcError {
    // Dispatch errors
    #[error("unable to read request")]
    MalformedRequest {
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("invalid method name: {method}")]
    InvalidMethodName { method: String },

    #[error("no such method exists: {method}")]
    UnknownMethod { method: String },

    /// A handler operation failed, or its parameters could not be coerced.
    #[error("{message}")]
    Invocation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    // Registration errors
    #[error("handler already exists: {key}")]
    DuplicateHandler { key: String },

    #[error("invalid capability {capability}: {message}")]
    InvalidCapability { capability: String, message: String },

    // Client-side errors
    /// The remote side answered with an `error` field.
    ///
    /// `payload` carries the raw value when the error was structured rather
    /// than a plain scalar.
    #[error("{message}")]
    Remote {
        message: String,
        payload: Option<Value>,
    },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for Switchboard operations.
pub type Result<T> = std::result::Result<T, RpcError>;

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RpcError {
    /// Create an invocation error from a plain message.
    ///
    /// This is what handler implementations return to report a failure; the
    /// message reaches the caller verbatim.
    pub fn invocation(message: impl Into<String>) -> Self {
        RpcError::Invocation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        RpcError::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Collapse any failure raised while running a handler into `Invocation`.
    ///
    /// An existing `Invocation` passes through untouched so the original
    /// message is kept; anything else is wrapped once with its own message.
    pub(crate) fn into_invocation(self) -> Self {
        match self {
            RpcError::Invocation { .. } => self,
            other => RpcError::Invocation {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Raw structured payload of a remote error, if one was attached.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            RpcError::Remote { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

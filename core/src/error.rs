//! Error types for the HTTP client.
//!
//! # Design
//! Only transport-level failures are retried, so they get their own type
//! that the retry loop can carry around. Error statuses (4xx/5xx) are not
//! errors at all; they come back as an `InboundResponse`.

use thiserror::Error;

/// A failure before any response was obtained for one attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// DNS failure or connection refused.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The attempt exceeded its timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The connection broke while sending or receiving.
    #[error("I/O failure: {0}")]
    Io(String),

    /// Anything else the HTTP stack reports before a status line.
    #[error("{0}")]
    Other(String),
}

/// Errors returned by `HttpClient` and the decode helpers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request payload could not be serialized to JSON. No request was sent.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The method, URL or headers could not form a valid request. No request was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every attempt failed at the transport level.
    #[error("request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The caller cancelled the request or its deadline passed. Carries the
    /// attempts made so far and the last transport failure, if any.
    #[error("request cancelled after {attempts} attempt(s){}", last_error_suffix(.last_error))]
    Cancelled {
        attempts: u32,
        last_error: Option<TransportError>,
    },

    /// The response body could not be decoded into the expected type.
    #[error("decode failed: {0}")]
    DecodeError(String),

    /// The response body stream failed while being read.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled { .. })
    }

    /// Number of attempts made, for transport failures and cancellations.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ClientError::Transport { attempts, .. } | ClientError::Cancelled { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// The transport failure behind this error, if one was recorded.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ClientError::Transport { source, .. } => Some(source),
            ClientError::Cancelled { last_error, .. } => last_error.as_ref(),
            _ => None,
        }
    }
}

fn last_error_suffix(last_error: &Option<TransportError>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {err})"),
        None => String::new(),
    }
}

/// Errors from loading a `ClientConfig` out of the environment or JSON.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: String, value: String },

    #[error("invalid config JSON: {0}")]
    Json(String),
}

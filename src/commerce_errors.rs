//! # Commerce Error Types Module
//!
//! This module defines the error types returned by the SMM panel client.
//! Every variant is an upstream failure: the flow controller reports it to the
//! user and keeps the conversation where it was.

/// Custom error types for Commerce API operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceError {
    /// Connection or protocol failure before a response arrived
    Transport(String),
    /// The request exceeded the configured timeout
    Timeout(String),
    /// Non-2xx HTTP status
    Status(u16),
    /// Response body was not the expected JSON
    Decode(String),
    /// The panel answered but refused the request (error payload, missing order id)
    Rejected(String),
    /// Circuit breaker is open, the request was not sent
    CircuitOpen,
}

impl CommerceError {
    /// Whether an idempotent read may be retried after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            CommerceError::Transport(_) | CommerceError::Timeout(_) => true,
            CommerceError::Status(code) => *code >= 500,
            CommerceError::Decode(_) | CommerceError::Rejected(_) | CommerceError::CircuitOpen => {
                false
            }
        }
    }
}

impl std::fmt::Display for CommerceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommerceError::Transport(msg) => write!(f, "Transport error: {msg}"),
            CommerceError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            CommerceError::Status(code) => write!(f, "Unexpected status: {code}"),
            CommerceError::Decode(msg) => write!(f, "Decode error: {msg}"),
            CommerceError::Rejected(msg) => write!(f, "Rejected by panel: {msg}"),
            CommerceError::CircuitOpen => write!(f, "Circuit breaker open"),
        }
    }
}

impl std::error::Error for CommerceError {}

impl From<reqwest::Error> for CommerceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CommerceError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            CommerceError::Status(status.as_u16())
        } else if err.is_decode() {
            CommerceError::Decode(err.to_string())
        } else {
            CommerceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(err: serde_json::Error) -> Self {
        CommerceError::Decode(err.to_string())
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

/// Auth Client Error Types
///
/// This module defines all error types used by the auth client,
/// providing structured error handling with proper context.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthClientError {
    /// The signature-verification backend could not be initialized
    VerificationInit(String),

    /// A signature failed to verify, or verification could not be performed
    Verification(String),

    /// The identity provider reported an explicit failure, or the handshake
    /// broke while processing a success message
    Failure(String),

    /// Storage adapter get/set/remove failed
    Storage(String),

    /// Serialization/deserialization errors
    Serialization(String),

    /// A persisted or received key blob could not be decoded
    KeyDecode(String),

    /// The identity-provider URL has no usable origin
    InvalidProviderUrl(String),

    /// The provider surface could not be opened at all
    SurfaceUnavailable(String),

    /// Posting a message to the provider surface failed
    Transport(String),

    /// The delegation chain has at least one expired link
    ChainExpired,

    /// The delegation chain does not authorize the requested target
    TargetNotAuthorized(String),

    /// The pending handshake channel was torn down before resolving
    Interrupted,
}

impl fmt::Display for AuthClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthClientError::VerificationInit(msg) => {
                write!(f, "Cannot initialize signature verification: {}", msg)
            }
            AuthClientError::Verification(msg) => {
                write!(f, "Signature verification failed: {}", msg)
            }
            AuthClientError::Failure(text) => {
                write!(f, "Authentication failed: {}", text)
            }
            AuthClientError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AuthClientError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AuthClientError::KeyDecode(msg) => write!(f, "Key decode error: {}", msg),
            AuthClientError::InvalidProviderUrl(url) => {
                write!(f, "Invalid identity provider URL: {}", url)
            }
            AuthClientError::SurfaceUnavailable(msg) => {
                write!(f, "Identity provider surface unavailable: {}", msg)
            }
            AuthClientError::Transport(msg) => {
                write!(f, "Failed to reach identity provider surface: {}", msg)
            }
            AuthClientError::ChainExpired => {
                write!(f, "Delegation chain is expired")
            }
            AuthClientError::TargetNotAuthorized(target) => {
                write!(f, "Delegation chain is not scoped to target: {}", target)
            }
            AuthClientError::Interrupted => {
                write!(f, "Handshake was torn down before completing")
            }
        }
    }
}

impl std::error::Error for AuthClientError {}

impl From<serde_json::Error> for AuthClientError {
    fn from(err: serde_json::Error) -> Self {
        AuthClientError::Serialization(err.to_string())
    }
}

impl From<AuthClientError> for JsValue {
    fn from(err: AuthClientError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<AuthClientError> for String {
    fn from(err: AuthClientError) -> Self {
        err.to_string()
    }
}

// Result type alias for convenience
pub type AuthResult<T> = Result<T, AuthClientError>;

// Helper functions for creating specific errors
impl AuthClientError {
    pub fn verification_init(msg: &str) -> Self {
        AuthClientError::VerificationInit(msg.to_string())
    }

    pub fn verification(msg: &str) -> Self {
        AuthClientError::Verification(msg.to_string())
    }

    pub fn storage(msg: &str) -> Self {
        AuthClientError::Storage(msg.to_string())
    }

    pub fn serialization(msg: &str) -> Self {
        AuthClientError::Serialization(msg.to_string())
    }

    pub fn key_decode(msg: &str) -> Self {
        AuthClientError::KeyDecode(msg.to_string())
    }

    pub fn invalid_provider_url(url: &str) -> Self {
        AuthClientError::InvalidProviderUrl(url.to_string())
    }

    pub fn surface_unavailable(msg: &str) -> Self {
        AuthClientError::SurfaceUnavailable(msg.to_string())
    }

    pub fn transport(msg: &str) -> Self {
        AuthClientError::Transport(msg.to_string())
    }
}

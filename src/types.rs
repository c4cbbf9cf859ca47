use serde::{Deserialize, Serialize};

use crate::config::message_kinds;
use crate::delegation::DelegatedIdentity;

/// Protocol messages exchanged with the identity-provider surface.
///
/// These are the only values that cross the handshake boundary. Inbound
/// payloads are modeled as a closed sum type over the known kinds; anything
/// else lands in `Unknown` and is ignored without a state transition.

/// Permission scopes a relying application can request from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "permissions-identity")]
    Identity,
    #[serde(rename = "permissions-wallet")]
    Wallet,
}

/// The `authorize-client` request posted to the provider once it is ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub kind: String,
    #[serde(with = "serde_bytes")]
    pub session_public_key: Vec<u8>,
    pub permissions: Vec<Permission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_time_to_live: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl AuthRequest {
    pub fn authorize_client(
        session_public_key: Vec<u8>,
        permissions: Vec<Permission>,
        targets: Option<Vec<String>>,
        max_time_to_live: Option<u64>,
        app_id: Option<String>,
    ) -> Self {
        Self {
            kind: message_kinds::CLIENT_REQUEST.to_string(),
            session_public_key,
            permissions,
            targets,
            max_time_to_live,
            app_id,
        }
    }
}

/// One delegation link as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDelegation {
    #[serde(with = "serde_bytes")]
    pub pubkey: Vec<u8>,
    pub expiration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSignedDelegation {
    pub delegation: WireDelegation,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// Payload of an `authorize-client-success` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccess {
    pub delegations: Vec<WireSignedDelegation>,
    #[serde(with = "serde_bytes")]
    pub user_public_key: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

/// Inbound messages from the provider surface, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderMessage {
    #[serde(rename = "authorize-ready")]
    Ready,
    #[serde(rename = "authorize-client-success")]
    Success(AuthSuccess),
    #[serde(rename = "authorize-client-failure")]
    Failure { text: String },
    // Forward-compatible no-op, not a missing-case bug.
    #[serde(other)]
    Unknown,
}

/// Options accepted by [`crate::AuthClient::login`].
pub struct LoginOptions {
    /// Identity provider URL; the default provider is used when unset.
    pub identity_provider: Option<String>,
    /// Requested delegation lifetime in nanoseconds.
    pub max_time_to_live: Option<u64>,
    /// Requested permissions; an empty list means identity-only.
    pub permissions: Vec<Permission>,
    /// Scope targets to request; unset means unrestricted.
    pub targets: Option<Vec<String>>,
    /// Invoked once the handshake succeeds, before the returned future resolves.
    pub on_success: Option<Box<dyn FnOnce(&DelegatedIdentity)>>,
    /// Invoked when the handshake fails, before the returned future rejects.
    pub on_error: Option<Box<dyn FnOnce(Option<&str>)>>,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            identity_provider: None,
            max_time_to_live: None,
            permissions: Vec::new(),
            targets: None,
            on_success: None,
            on_error: None,
        }
    }
}

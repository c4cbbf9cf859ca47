/// Configuration constants for the auth client
///
/// This module centralizes configuration to ensure consistency
/// and make updates easier.

// === LOGGING CONFIGURATION ===

/// Log level for the auth client
/// Change this constant and recompile to adjust logging verbosity
/// Available levels: Error, Warn, Info, Debug, Trace
pub const CURRENT_LOG_LEVEL: log::Level = log::Level::Info;

// === STORAGE ===

/// Storage slot holding the serialized session keypair
pub const STORAGE_KEY_IDENTITY: &str = "identity";

/// Storage slot holding the serialized delegation chain (JSON)
pub const STORAGE_KEY_DELEGATION: &str = "delegation";

/// Storage slot holding the opaque auxiliary wallet token
pub const STORAGE_KEY_WALLET: &str = "wallet";

/// Default namespace prefix applied by the storage adapters
pub const DEFAULT_STORAGE_PREFIX: &str = "ic-";

// === IDENTITY PROVIDER ===

/// Default identity-provider surface URL
pub const IDENTITY_PROVIDER_DEFAULT: &str = "https://identity.ic0.app";

/// Fragment appended to the provider URL when the caller did not set one
pub const IDENTITY_PROVIDER_ENDPOINT: &str = "#authorize";

/// Window target name used when opening the provider popup
pub const POPUP_TARGET_NAME: &str = "idpWindow";

/// Default window feature string for the provider popup.
/// Sizing is a human-facing boundary detail; callers can override it.
pub const DEFAULT_POPUP_FEATURES: &str =
    "height=500, width=640, top=0, right=0, toolbar=no, menubar=no, scrollbars=no, resizable=no, location=no, status=no";

/// Default delegation lifetime requested from the provider (nanoseconds)
pub const DEFAULT_MAX_TIME_TO_LIVE_NS: u64 = 8 * 60 * 60 * 1_000_000_000;

// === PROTOCOL MESSAGE KINDS ===

/// `kind` discriminators exchanged with the identity-provider surface.
/// Inbound messages with any other kind are a deliberate no-op.
pub mod message_kinds {
    pub const READY: &str = "authorize-ready";
    pub const CLIENT_REQUEST: &str = "authorize-client";
    pub const SUCCESS: &str = "authorize-client-success";
    pub const FAILURE: &str = "authorize-client-failure";
}

// === CRYPTOGRAPHIC CONSTANTS ===

/// Domain separator prefixed to the signable bytes of a delegation link
pub const DELEGATION_DOMAIN_SEPARATOR: &[u8] = b"\x1aic-request-auth-delegation";

/// Hash-to-curve domain separation tag for BLS12-381 G1 signatures
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Compressed G1 signature size in bytes
pub const BLS_SIGNATURE_SIZE: usize = 48;

/// Compressed G2 public key size in bytes
pub const BLS_PUBLIC_KEY_SIZE: usize = 96;

/// DER (SPKI) prefix for an Ed25519 public key; the raw 32 key bytes follow
pub const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Raw Ed25519 public key size in bytes
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 secret key (seed) size in bytes
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

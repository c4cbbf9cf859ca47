use crate::config::{ED25519_DER_PREFIX, ED25519_PUBLIC_KEY_SIZE};
use crate::errors::{AuthClientError, AuthResult};

// === TIME ===

/// Current wall-clock time as a nanosecond epoch.
#[cfg(target_arch = "wasm32")]
pub fn current_time_ns() -> u64 {
    (js_sys::Date::now() * 1_000_000.0) as u64
}

#[cfg(not(target_arch = "wasm32"))]
pub fn current_time_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

// === URL ORIGIN ===

/// Extract the `scheme://host[:port]` origin of a URL.
///
/// Both sides of the origin equality check in the handshake go through this
/// function, so the comparison is exact by construction. Default ports are
/// stripped because browsers omit them from reported message origins.
pub fn origin_of(url: &str) -> AuthResult<String> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| AuthClientError::invalid_provider_url(url))?;
    if scheme.is_empty() {
        return Err(AuthClientError::invalid_provider_url(url));
    }
    let scheme = scheme.to_ascii_lowercase();
    let authority = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or("");
    // Userinfo is not part of an origin.
    let host = authority.rsplit('@').next().unwrap_or("");
    if host.is_empty() {
        return Err(AuthClientError::invalid_provider_url(url));
    }
    let mut host = host.to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "https" => Some(":443"),
        "http" => Some(":80"),
        _ => None,
    };
    if let Some(port) = default_port {
        if let Some(stripped) = host.strip_suffix(port) {
            if stripped.is_empty() {
                return Err(AuthClientError::invalid_provider_url(url));
            }
            host.truncate(stripped.len());
        }
    }
    Ok(format!("{}://{}", scheme, host))
}

// === DER (SPKI) ===

/// Wrap a raw Ed25519 public key in its DER SubjectPublicKeyInfo envelope.
/// This is the encoding the session public key uses on the wire.
pub fn der_encode_ed25519_spki(raw: &[u8; ED25519_PUBLIC_KEY_SIZE]) -> Vec<u8> {
    let mut der = Vec::with_capacity(ED25519_DER_PREFIX.len() + raw.len());
    der.extend_from_slice(&ED25519_DER_PREFIX);
    der.extend_from_slice(raw);
    der
}

/// Recover the raw key bytes from a DER-wrapped Ed25519 public key.
pub fn der_decode_ed25519_spki(der: &[u8]) -> AuthResult<[u8; ED25519_PUBLIC_KEY_SIZE]> {
    let raw = der
        .strip_prefix(&ED25519_DER_PREFIX[..])
        .ok_or_else(|| AuthClientError::key_decode("not a DER-encoded Ed25519 public key"))?;
    raw.try_into()
        .map_err(|_| AuthClientError::key_decode("DER-encoded Ed25519 public key has wrong length"))
}

//! BLS12-381 signature verification over delegation chains.
//!
//! Two backends: the in-process pairing implementation, and (on wasm only) a
//! host bridge for embedders that inject their own verifier into the global
//! scope. Backend selection happens once; every caller awaits the same shared
//! initialization future.

use std::cell::RefCell;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use log::debug;

use crate::errors::{AuthClientError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    InProcess,
    #[cfg(target_arch = "wasm32")]
    Remote,
}

type InitFuture = Shared<LocalBoxFuture<'static, Result<BackendKind, AuthClientError>>>;

thread_local! {
    static BACKEND: RefCell<Option<InitFuture>> = RefCell::new(None);
}

/// Verify a BLS signature on `message` against a 96-byte G2 public key.
///
/// Initializes the backend on first use. Concurrent first calls share a
/// single initialization; a failed initialization is returned to every
/// waiter.
pub async fn verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> AuthResult<bool> {
    let init = BACKEND.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| init_backend().boxed_local().shared())
            .clone()
    });
    let backend = init.await?;
    match backend {
        // The in-process primitive takes (signature, message, public-key)
        // while callers hand us (public-key, signature, message); a swapped
        // argument verifies garbage instead of erroring, so the remap lives
        // in exactly this one place. The host bridge keeps the public order.
        BackendKind::InProcess => Ok(bls12381_verify(signature, message, public_key)),
        #[cfg(target_arch = "wasm32")]
        BackendKind::Remote => remote::verify(public_key, signature, message).await,
    }
}

/// Encoding handed to the host bridge, in the public argument order: hex
/// public key, hex signature, message as text.
#[cfg(any(target_arch = "wasm32", test))]
pub(crate) fn bridge_payload(
    public_key: &[u8],
    signature: &[u8],
    message: &[u8],
) -> (String, String, String) {
    (
        hex::encode(public_key),
        hex::encode(signature),
        String::from_utf8_lossy(message).into_owned(),
    )
}

async fn init_backend() -> Result<BackendKind, AuthClientError> {
    #[cfg(target_arch = "wasm32")]
    if remote::bridge_available() {
        remote::init().await?;
        debug!("BLS backend: host bridge");
        return Ok(BackendKind::Remote);
    }
    init_in_process()?;
    debug!("BLS backend: in-process");
    Ok(BackendKind::InProcess)
}

fn init_in_process() -> Result<(), AuthClientError> {
    use blstrs::{pairing, G1Affine, G2Affine, Gt};
    use group::prime::PrimeCurveAffine;
    use group::Group;

    // Generator pairing sanity check; a degenerate pairing would make every
    // later verification meaningless.
    if pairing(&G1Affine::generator(), &G2Affine::generator()) == Gt::identity() {
        return Err(AuthClientError::verification_init(
            "pairing self-check failed",
        ));
    }
    Ok(())
}

/// Core verification: e(sig, g2) == e(H(m), pk).
///
/// Signatures live in G1 (48 bytes compressed), public keys in G2 (96 bytes
/// compressed). Any malformed input verifies as false, never as an error.
fn bls12381_verify(signature: &[u8], message: &[u8], public_key: &[u8]) -> bool {
    use blstrs::{pairing, G1Affine, G1Projective, G2Affine};
    use group::prime::PrimeCurveAffine;
    use group::Curve;

    use crate::config::{BLS_DST, BLS_PUBLIC_KEY_SIZE, BLS_SIGNATURE_SIZE};

    let sig_bytes: [u8; BLS_SIGNATURE_SIZE] = match signature.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let pk_bytes: [u8; BLS_PUBLIC_KEY_SIZE] = match public_key.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let sig = match Option::<G1Affine>::from(G1Affine::from_compressed(&sig_bytes)) {
        Some(point) => point,
        None => return false,
    };
    let pk = match Option::<G2Affine>::from(G2Affine::from_compressed(&pk_bytes)) {
        Some(point) => point,
        None => return false,
    };
    // The identity public key would validate any signature.
    if pk.is_identity().into() {
        return false;
    }

    let hm = G1Projective::hash_to_curve(message, BLS_DST, &[]).to_affine();
    pairing(&sig, &G2Affine::generator()) == pairing(&hm, &pk)
}

/// Host-provided verifier bridge. Embedders expose `authDelegateBlsInit` and
/// `authDelegateBlsVerify` on the global object; when present, verification
/// is delegated to them.
#[cfg(target_arch = "wasm32")]
mod remote {
    use js_sys::{Function, Reflect};
    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;

    use crate::errors::{AuthClientError, AuthResult};

    const INIT_FN: &str = "authDelegateBlsInit";
    const VERIFY_FN: &str = "authDelegateBlsVerify";

    fn global_function(name: &str) -> Option<Function> {
        Reflect::get(&js_sys::global(), &JsValue::from_str(name))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
    }

    pub fn bridge_available() -> bool {
        global_function(INIT_FN).is_some() && global_function(VERIFY_FN).is_some()
    }

    pub async fn init() -> AuthResult<()> {
        let init_fn = global_function(INIT_FN)
            .ok_or_else(|| AuthClientError::verification_init("cannot initialize BLS"))?;
        let promise = init_fn
            .call0(&JsValue::NULL)
            .map_err(|_| AuthClientError::verification_init("cannot initialize BLS"))?;
        let outcome = JsFuture::from(js_sys::Promise::resolve(&promise))
            .await
            .map_err(|_| AuthClientError::verification_init("cannot initialize BLS"))?;
        if !outcome.is_truthy() {
            return Err(AuthClientError::verification_init("cannot initialize BLS"));
        }
        Ok(())
    }

    /// The bridge takes the public argument order: hex public key, hex
    /// signature, then the message as text. It reports a numeric verdict
    /// where zero means verified.
    pub async fn verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> AuthResult<bool> {
        let verify_fn = global_function(VERIFY_FN)
            .ok_or_else(|| AuthClientError::transport("BLS bridge went away"))?;
        let (pk_hex, sig_hex, msg_text) = super::bridge_payload(public_key, signature, message);
        let promise = verify_fn
            .call3(
                &JsValue::NULL,
                &JsValue::from_str(&pk_hex),
                &JsValue::from_str(&sig_hex),
                &JsValue::from_str(&msg_text),
            )
            .map_err(|_| AuthClientError::transport("BLS bridge call failed"))?;
        let verdict = JsFuture::from(js_sys::Promise::resolve(&promise))
            .await
            .map_err(|_| AuthClientError::transport("BLS bridge call failed"))?;
        Ok(verdict.as_f64() == Some(0.0))
    }
}

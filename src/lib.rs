use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};

use log::{debug, info};
use serde::Deserialize;
use wasm_bindgen_futures::spawn_local;

mod auth_client;
mod bls;
mod config;
mod delegation;
mod errors;
mod session;
mod storage;
mod surface;
mod types;
mod utils;

#[cfg(test)]
mod tests;

// Re-export the crate surface for native (rlib) consumers
pub use auth_client::{AuthClient, CreateOptions, HandshakeState, Identity};
pub use config::*;
pub use delegation::{
    signable_bytes, DelegatedIdentity, Delegation, DelegationChain, SignedDelegation,
};
pub use errors::{AuthClientError, AuthResult};
pub use session::{SessionKey, SessionKeyStore};
pub use storage::{delete_storage, AuthClientStorage, BrowserStorage, MemoryStorage};
pub use surface::{
    IdentityProviderSurface, PopupSurface, PopupSurfaceProvider, SurfaceProvider,
};
pub use types::{
    AuthRequest, AuthSuccess, LoginOptions, Permission, ProviderMessage, WireDelegation,
    WireSignedDelegation,
};
pub use utils::{der_decode_ed25519_spki, der_encode_ed25519_spki, origin_of};

// Set up panic hook for better error messages
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // Initialize logger with the configured log level
    wasm_logger::init(wasm_logger::Config::new(config::CURRENT_LOG_LEVEL));

    info!("Auth client starting up...");
    debug!(
        "Logging system initialized with level: {:?}",
        config::CURRENT_LOG_LEVEL
    );
}

// === WASM EXPORTS ===

/// Standalone BLS verification export for embedders that only need the
/// signature check.
#[wasm_bindgen]
pub async fn bls_verify(
    public_key_hex: String,
    signature_hex: String,
    message: Vec<u8>,
) -> Result<bool, JsValue> {
    let public_key = hex::decode(&public_key_hex)
        .map_err(|e| AuthClientError::key_decode(&format!("bad public key hex: {}", e)))?;
    let signature = hex::decode(&signature_hex)
        .map_err(|e| AuthClientError::key_decode(&format!("bad signature hex: {}", e)))?;
    Ok(bls::verify(&public_key, &signature, &message).await?)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WasmCreateOptions {
    app_id: Option<String>,
    storage_prefix: Option<String>,
    window_features: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WasmLoginOptions {
    identity_provider: Option<String>,
    /// Decimal nanoseconds as a string; u64 does not survive a JS number.
    max_time_to_live: Option<String>,
    permissions: Option<Vec<Permission>>,
    targets: Option<Vec<String>>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct WasmIdentityInfo {
    user_public_key: String,
    session_public_key: String,
    delegation_chain: String,
}

fn identity_info(identity: &DelegatedIdentity) -> Result<JsValue, JsValue> {
    let info = WasmIdentityInfo {
        user_public_key: hex::encode(identity.user_public_key()),
        session_public_key: hex::encode(identity.session_public_key_der()),
        delegation_chain: identity.chain().to_json()?,
    };
    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| AuthClientError::serialization(&e.to_string()).into())
}

/// Browser-facing wrapper: browser storage, popup surface, and a window
/// `message` listener that feeds provider events into the client.
#[wasm_bindgen]
pub struct WasmAuthClient {
    client: Rc<AuthClient<BrowserStorage, PopupSurfaceProvider>>,
    listener: RefCell<Option<Closure<dyn FnMut(web_sys::MessageEvent)>>>,
}

#[wasm_bindgen]
impl WasmAuthClient {
    /// Build a client and attach the window message listener.
    pub async fn create(options: JsValue) -> Result<WasmAuthClient, JsValue> {
        let options: WasmCreateOptions = if options.is_undefined() || options.is_null() {
            WasmCreateOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)
                .map_err(|e| AuthClientError::serialization(&e.to_string()))?
        };

        let storage = match options.storage_prefix {
            Some(prefix) => BrowserStorage::new(prefix),
            None => BrowserStorage::default(),
        };
        let provider = match options.window_features {
            Some(features) => PopupSurfaceProvider::new(features),
            None => PopupSurfaceProvider::default(),
        };
        let client = AuthClient::create(
            storage,
            provider,
            CreateOptions {
                app_id: options.app_id,
                session_key: None,
            },
        )
        .await?;

        let wrapper = WasmAuthClient {
            client: Rc::new(client),
            listener: RefCell::new(None),
        };
        wrapper.attach_listener()?;
        Ok(wrapper)
    }

    fn attach_listener(&self) -> Result<(), JsValue> {
        let window = web_sys::window()
            .ok_or_else(|| AuthClientError::surface_unavailable("no window object available"))?;
        let client = Rc::clone(&self.client);
        let closure = Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let origin = event.origin();
            let payload: serde_json::Value = match serde_wasm_bindgen::from_value(event.data()) {
                Ok(payload) => payload,
                Err(err) => {
                    debug!("dropping non-JSON window message: {}", err);
                    return;
                }
            };
            let client = Rc::clone(&client);
            spawn_local(async move {
                client.dispatch_provider_event(&origin, payload).await;
            });
        }) as Box<dyn FnMut(web_sys::MessageEvent)>);
        window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(|_| AuthClientError::surface_unavailable("cannot listen for messages"))?;
        *self.listener.borrow_mut() = Some(closure);
        Ok(())
    }

    /// Run the login handshake; resolves with the identity summary once the
    /// provider answers.
    pub async fn login(&self, options: JsValue) -> Result<JsValue, JsValue> {
        let options: WasmLoginOptions = if options.is_undefined() || options.is_null() {
            WasmLoginOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)
                .map_err(|e| AuthClientError::serialization(&e.to_string()))?
        };
        let max_time_to_live = match options.max_time_to_live {
            Some(text) => Some(text.parse::<u64>().map_err(|e| {
                AuthClientError::serialization(&format!("bad maxTimeToLive: {}", e))
            })?),
            None => None,
        };
        let identity = self
            .client
            .login(LoginOptions {
                identity_provider: options.identity_provider,
                max_time_to_live,
                permissions: options.permissions.unwrap_or_default(),
                targets: options.targets,
                on_success: None,
                on_error: None,
            })
            .await?;
        identity_info(&identity)
    }

    pub async fn logout(&self) {
        self.client.logout().await;
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }

    /// Identity summary for the current session, or `undefined` when
    /// anonymous.
    pub fn identity(&self) -> Result<JsValue, JsValue> {
        match self.client.identity() {
            Identity::Anonymous => Ok(JsValue::UNDEFINED),
            Identity::Delegated(identity) => identity_info(&identity),
        }
    }

    /// Sign request bytes with the session key, re-verifying the delegation
    /// chain's root anchor first. Resolves with the hex-encoded signature.
    pub async fn sign(&self, message: Vec<u8>) -> Result<String, JsValue> {
        match self.client.identity() {
            Identity::Anonymous => Err(AuthClientError::Failure(
                "no authenticated identity; log in first".to_string(),
            )
            .into()),
            Identity::Delegated(identity) => {
                Ok(hex::encode(identity.sign_verified(&message).await?))
            }
        }
    }

    pub fn wallet(&self) -> Option<String> {
        self.client.wallet()
    }

    pub async fn set_wallet(&self, wallet: Option<String>) -> Result<(), JsValue> {
        Ok(self.client.set_wallet(wallet).await?)
    }

    /// Detach the window message listener. Call before dropping the client.
    pub fn dispose(&self) {
        if let Some(closure) = self.listener.borrow_mut().take() {
            if let Some(window) = web_sys::window() {
                let _ = window.remove_event_listener_with_callback(
                    "message",
                    closure.as_ref().unchecked_ref(),
                );
            }
        }
    }
}

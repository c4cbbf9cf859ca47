use log::warn;

use crate::errors::AuthResult;
use crate::types::AuthRequest;

/// An open identity-provider surface: somewhere to post the authorization
/// request, and something to tear down afterwards.
pub trait IdentityProviderSurface {
    fn post_message(&self, request: &AuthRequest) -> AuthResult<()>;
    fn close(&mut self);
}

/// Opens a provider surface for a given URL. The popup provider is the
/// production implementation; tests substitute their own.
pub trait SurfaceProvider {
    type Surface: IdentityProviderSurface;

    fn open(&self, url: &str) -> AuthResult<Self::Surface>;
}

/// Opens the provider in a browser popup window.
pub struct PopupSurfaceProvider {
    window_features: String,
}

impl PopupSurfaceProvider {
    pub fn new(window_features: impl Into<String>) -> Self {
        Self {
            window_features: window_features.into(),
        }
    }
}

impl Default for PopupSurfaceProvider {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POPUP_FEATURES)
    }
}

impl SurfaceProvider for PopupSurfaceProvider {
    type Surface = PopupSurface;

    fn open(&self, url: &str) -> AuthResult<Self::Surface> {
        use crate::config::POPUP_TARGET_NAME;
        use crate::errors::AuthClientError;
        use crate::utils::origin_of;

        let origin = origin_of(url)?;
        let window = web_sys::window()
            .ok_or_else(|| AuthClientError::surface_unavailable("no window object available"))?;
        let popup = window
            .open_with_url_and_target_and_features(url, POPUP_TARGET_NAME, &self.window_features)
            .map_err(|_| AuthClientError::surface_unavailable("failed to open popup window"))?;
        if popup.is_none() {
            // Popup blockers land here. The caller's login future stays
            // pending; the embedder decides how long to wait.
            warn!("popup was blocked; handshake will stall until the caller times out");
        }
        Ok(PopupSurface {
            window: popup,
            origin,
        })
    }
}

/// A popup window bound to the provider origin it was opened for. Every
/// outbound message is addressed to that origin and no other.
pub struct PopupSurface {
    window: Option<web_sys::Window>,
    origin: String,
}

impl IdentityProviderSurface for PopupSurface {
    fn post_message(&self, request: &AuthRequest) -> AuthResult<()> {
        use crate::errors::AuthClientError;

        let window = match &self.window {
            Some(window) => window,
            None => return Ok(()),
        };
        let payload = serde_wasm_bindgen::to_value(request)
            .map_err(|e| AuthClientError::serialization(&e.to_string()))?;
        window
            .post_message(&payload, &self.origin)
            .map_err(|_| AuthClientError::transport("failed to post message to provider window"))
    }

    fn close(&mut self) {
        if let Some(window) = self.window.take() {
            if window.close().is_err() {
                warn!("failed to close provider window");
            }
        }
    }
}

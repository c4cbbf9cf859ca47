use std::cell::RefCell;

use futures::channel::oneshot;
use log::{debug, warn};

use crate::config::{
    DEFAULT_MAX_TIME_TO_LIVE_NS, IDENTITY_PROVIDER_DEFAULT, IDENTITY_PROVIDER_ENDPOINT,
    STORAGE_KEY_DELEGATION, STORAGE_KEY_WALLET,
};
use crate::delegation::{DelegatedIdentity, Delegation, DelegationChain, SignedDelegation};
use crate::errors::{AuthClientError, AuthResult};
use crate::session::{SessionKey, SessionKeyStore};
use crate::storage::{delete_storage, AuthClientStorage};
use crate::surface::{IdentityProviderSurface, SurfaceProvider};
use crate::types::{AuthRequest, AuthSuccess, LoginOptions, Permission, ProviderMessage};
use crate::utils::{current_time_ns, origin_of};

/// Where the handshake currently stands. Exposed for observability; the
/// client itself transitions between states only in response to login calls,
/// provider events and logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    OpeningSurface,
    AwaitingReady,
    RequestSent,
    AwaitingResult,
    Succeeded,
    Failed,
    Closed,
}

/// The caller-visible identity: anonymous until a handshake completes.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Delegated(DelegatedIdentity),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// Options for [`AuthClient::create`].
#[derive(Default)]
pub struct CreateOptions {
    /// Opaque application identifier forwarded to the provider.
    pub app_id: Option<String>,
    /// Use this session key instead of loading or generating one.
    pub session_key: Option<SessionKey>,
}

struct PendingHandshake {
    /// Origin of the provider surface this handshake was opened against.
    /// Every inbound event is checked against it.
    origin: String,
    sender: oneshot::Sender<AuthResult<DelegatedIdentity>>,
    request: AuthRequest,
    on_success: Option<Box<dyn FnOnce(&DelegatedIdentity)>>,
    on_error: Option<Box<dyn FnOnce(Option<&str>)>>,
}

struct Inner<W> {
    identity: Identity,
    key: Option<SessionKey>,
    chain: Option<DelegationChain>,
    wallet: Option<String>,
    surface: Option<W>,
    pending: Option<PendingHandshake>,
    /// Senders of superseded handshakes. Parked instead of dropped so the
    /// abandoned login futures never resolve; dropping a sender would cancel
    /// its receiver. Deliberately retained for the client's lifetime, one
    /// entry per superseded login.
    parked: Vec<oneshot::Sender<AuthResult<DelegatedIdentity>>>,
    state: HandshakeState,
}

/// The relying-application side of the delegation handshake.
///
/// Owns the persisted credentials, the provider surface and the single
/// in-flight handshake. Not `Send`; it lives on the event-loop thread and
/// serializes all state changes through a `RefCell`.
pub struct AuthClient<S: AuthClientStorage, P: SurfaceProvider> {
    storage: S,
    provider: P,
    app_id: Option<String>,
    inner: RefCell<Inner<P::Surface>>,
}

fn provider_url(custom: Option<&str>) -> String {
    let base = custom.unwrap_or(IDENTITY_PROVIDER_DEFAULT);
    if base.contains('#') {
        base.to_string()
    } else {
        format!("{}{}", base, IDENTITY_PROVIDER_ENDPOINT)
    }
}

impl<S: AuthClientStorage, P: SurfaceProvider> AuthClient<S, P> {
    /// Build a client, restoring any persisted session from storage.
    ///
    /// A stored chain that is expired or unreadable clears all cached
    /// credentials and the client starts anonymous. A stored key without a
    /// chain is kept for reuse by the next login.
    pub async fn create(storage: S, provider: P, options: CreateOptions) -> AuthResult<Self> {
        let mut key = match options.session_key {
            Some(key) => Some(key),
            None => SessionKeyStore::new(&storage).load().await,
        };

        let mut chain = None;
        if key.is_some() {
            let stored = match storage.get(STORAGE_KEY_DELEGATION).await {
                Ok(stored) => stored,
                Err(err) => {
                    warn!("failed to read stored delegation chain: {}", err);
                    None
                }
            };
            if let Some(blob) = stored {
                match DelegationChain::from_json(&blob) {
                    Ok(parsed) if parsed.is_valid(current_time_ns()) => chain = Some(parsed),
                    Ok(_) => {
                        warn!("stored delegation chain is expired, clearing cached credentials");
                        if let Err(err) = delete_storage(&storage).await {
                            warn!("failed to clear storage: {}", err);
                        }
                        key = None;
                    }
                    Err(err) => {
                        warn!(
                            "stored delegation chain is unreadable, clearing cached credentials: {}",
                            err
                        );
                        if let Err(err) = delete_storage(&storage).await {
                            warn!("failed to clear storage: {}", err);
                        }
                        key = None;
                    }
                }
            }
        }

        let wallet = match storage.get(STORAGE_KEY_WALLET).await {
            Ok(wallet) => wallet,
            Err(err) => {
                warn!("failed to read stored wallet token: {}", err);
                None
            }
        };

        let identity = match (&key, &chain) {
            (Some(key), Some(chain)) => {
                Identity::Delegated(DelegatedIdentity::new(key.clone(), chain.clone()))
            }
            _ => Identity::Anonymous,
        };

        Ok(Self {
            storage,
            provider,
            app_id: options.app_id,
            inner: RefCell::new(Inner {
                identity,
                key,
                chain,
                wallet,
                surface: None,
                pending: None,
                parked: Vec::new(),
                state: HandshakeState::Idle,
            }),
        })
    }

    /// Start a handshake and resolve once the provider answers.
    ///
    /// The returned future stays pending until a success or failure event
    /// arrives; a blocked popup or an abandoned provider window never
    /// resolves it. Calling `login` again supersedes the previous handshake,
    /// whose future is likewise left pending forever.
    pub async fn login(&self, options: LoginOptions) -> AuthResult<DelegatedIdentity> {
        let key = self.inner.borrow().key.clone();
        let key = match key {
            Some(key) => key,
            None => {
                let key = SessionKeyStore::new(&self.storage).ensure().await?;
                self.inner.borrow_mut().key = Some(key.clone());
                key
            }
        };

        let url = provider_url(options.identity_provider.as_deref());
        let origin = origin_of(&url)?;

        {
            let mut inner = self.inner.borrow_mut();
            if let Some(mut surface) = inner.surface.take() {
                surface.close();
            }
            if let Some(superseded) = inner.pending.take() {
                debug!("superseding in-flight handshake");
                inner.parked.push(superseded.sender);
            }
            inner.state = HandshakeState::OpeningSurface;
        }

        let surface = match self.provider.open(&url) {
            Ok(surface) => surface,
            Err(err) => {
                self.inner.borrow_mut().state = HandshakeState::Idle;
                return Err(err);
            }
        };

        let permissions = if options.permissions.is_empty() {
            vec![Permission::Identity]
        } else {
            options.permissions
        };
        let request = AuthRequest::authorize_client(
            key.public_key_der(),
            permissions,
            options.targets,
            Some(
                options
                    .max_time_to_live
                    .unwrap_or(DEFAULT_MAX_TIME_TO_LIVE_NS),
            ),
            self.app_id.clone(),
        );

        let (sender, receiver) = oneshot::channel();
        {
            let mut inner = self.inner.borrow_mut();
            inner.surface = Some(surface);
            inner.pending = Some(PendingHandshake {
                origin,
                sender,
                request,
                on_success: options.on_success,
                on_error: options.on_error,
            });
            inner.state = HandshakeState::AwaitingReady;
        }

        match receiver.await {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(AuthClientError::Interrupted),
        }
    }

    /// Feed one inbound provider event into the state machine.
    ///
    /// `origin` is the origin the event arrived from; events from any origin
    /// other than the pending handshake's provider are dropped without a
    /// state transition, as are events while no handshake is pending.
    pub async fn dispatch_provider_event(&self, origin: &str, payload: serde_json::Value) {
        let expected = match self
            .inner
            .borrow()
            .pending
            .as_ref()
            .map(|pending| pending.origin.clone())
        {
            Some(expected) => expected,
            None => {
                debug!("ignoring provider event with no handshake pending");
                return;
            }
        };
        if origin != expected {
            debug!("ignoring provider event from unexpected origin {}", origin);
            return;
        }

        let message: ProviderMessage = match serde_json::from_value(payload.clone()) {
            Ok(message) => message,
            Err(err) => {
                // A success we cannot decode is a broken handshake, not
                // something to silently wait past.
                let kind = payload.get("kind").and_then(|kind| kind.as_str());
                if kind == Some(crate::config::message_kinds::SUCCESS) {
                    self.fail_current_handshake(format!("malformed success payload: {}", err));
                } else {
                    debug!("ignoring undecodable provider event: {}", err);
                }
                return;
            }
        };

        match message {
            ProviderMessage::Ready => self.handle_ready(),
            ProviderMessage::Success(success) => self.handle_success(success).await,
            ProviderMessage::Failure { text } => self.fail_current_handshake(text),
            ProviderMessage::Unknown => debug!("ignoring provider event of unknown kind"),
        }
    }

    fn handle_ready(&self) {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != HandshakeState::AwaitingReady {
                debug!("ignoring ready signal in state {:?}", inner.state);
                return;
            }
            inner.state = HandshakeState::RequestSent;
            let request = inner.pending.as_ref().map(|pending| pending.request.clone());
            match (&inner.surface, request) {
                (Some(surface), Some(request)) => {
                    let posted = surface.post_message(&request);
                    if posted.is_ok() {
                        inner.state = HandshakeState::AwaitingResult;
                    }
                    posted
                }
                _ => Err(AuthClientError::transport("no surface to post request to")),
            }
        };
        if let Err(err) = outcome {
            self.fail_current_handshake(err.to_string());
        }
    }

    async fn handle_success(&self, success: AuthSuccess) {
        // Everything the completion needs is taken out up front; a new login
        // may legitimately start while persistence below is in flight.
        let (pending, surface, key) = {
            let mut inner = self.inner.borrow_mut();
            let key = inner.key.clone();
            (inner.pending.take(), inner.surface.take(), key)
        };
        let pending = match pending {
            Some(pending) => pending,
            None => return,
        };
        let key = match key {
            Some(key) => key,
            None => {
                self.finish_failed(
                    pending,
                    surface,
                    "no session key for the completed handshake".to_string(),
                );
                return;
            }
        };

        let chain = DelegationChain::from_signed_delegations(
            success
                .delegations
                .into_iter()
                .map(|wire| SignedDelegation {
                    delegation: Delegation {
                        pubkey: wire.delegation.pubkey,
                        expiration: wire.delegation.expiration,
                        targets: wire.delegation.targets,
                    },
                    signature: wire.signature,
                })
                .collect(),
            success.user_public_key,
        );
        if !chain.is_valid(current_time_ns()) {
            self.finish_failed(pending, surface, "delegation chain is expired".to_string());
            return;
        }

        let chain_json = match chain.to_json() {
            Ok(json) => json,
            Err(err) => {
                self.finish_failed(pending, surface, err.to_string());
                return;
            }
        };
        // Persistence failures degrade to a session-only login; the identity
        // in memory is still good.
        if let Err(err) = self.storage.set(STORAGE_KEY_DELEGATION, &chain_json).await {
            warn!("failed to persist delegation chain: {}", err);
        }
        if let Some(wallet) = &success.wallet {
            if let Err(err) = self.storage.set(STORAGE_KEY_WALLET, wallet).await {
                warn!("failed to persist wallet token: {}", err);
            }
        }

        let identity = DelegatedIdentity::new(key, chain.clone());
        {
            let mut inner = self.inner.borrow_mut();
            inner.chain = Some(chain);
            inner.wallet = success.wallet;
            inner.identity = Identity::Delegated(identity.clone());
            inner.state = HandshakeState::Succeeded;
        }

        if let Some(mut surface) = surface {
            surface.close();
        }
        if let Some(on_success) = pending.on_success {
            on_success(&identity);
        }
        let _ = pending.sender.send(Ok(identity));
    }

    fn fail_current_handshake(&self, text: String) {
        let (pending, surface) = {
            let mut inner = self.inner.borrow_mut();
            (inner.pending.take(), inner.surface.take())
        };
        match pending {
            Some(pending) => self.finish_failed(pending, surface, text),
            None => {
                if let Some(mut surface) = surface {
                    surface.close();
                }
            }
        }
    }

    fn finish_failed(
        &self,
        pending: PendingHandshake,
        surface: Option<P::Surface>,
        text: String,
    ) {
        if let Some(mut surface) = surface {
            surface.close();
        }
        self.inner.borrow_mut().state = HandshakeState::Failed;
        if let Some(on_error) = pending.on_error {
            on_error(Some(&text));
        }
        let _ = pending.sender.send(Err(AuthClientError::Failure(text)));
    }

    /// Drop all credentials, in storage and in memory, and tear down any
    /// in-flight handshake. The superseded login future is left pending.
    pub async fn logout(&self) {
        if let Err(err) = delete_storage(&self.storage).await {
            warn!("failed to clear storage on logout: {}", err);
        }
        let (surface, pending) = {
            let mut inner = self.inner.borrow_mut();
            inner.identity = Identity::Anonymous;
            inner.key = None;
            inner.chain = None;
            inner.wallet = None;
            inner.state = HandshakeState::Closed;
            (inner.surface.take(), inner.pending.take())
        };
        if let Some(mut surface) = surface {
            surface.close();
        }
        if let Some(pending) = pending {
            self.inner.borrow_mut().parked.push(pending.sender);
        }
    }

    pub fn identity(&self) -> Identity {
        self.inner.borrow().identity.clone()
    }

    /// Authenticated means a non-anonymous identity backed by a chain.
    pub fn is_authenticated(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.identity.is_anonymous() && inner.chain.is_some()
    }

    pub fn delegation_chain(&self) -> Option<DelegationChain> {
        self.inner.borrow().chain.clone()
    }

    pub fn inner_key(&self) -> Option<SessionKey> {
        self.inner.borrow().key.clone()
    }

    pub fn wallet(&self) -> Option<String> {
        self.inner.borrow().wallet.clone()
    }

    /// Set or clear the auxiliary wallet token, persisting the change.
    pub async fn set_wallet(&self, wallet: Option<String>) -> AuthResult<()> {
        match &wallet {
            Some(token) => self.storage.set(STORAGE_KEY_WALLET, token).await?,
            None => self.storage.remove(STORAGE_KEY_WALLET).await?,
        }
        self.inner.borrow_mut().wallet = wallet;
        Ok(())
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.inner.borrow().state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

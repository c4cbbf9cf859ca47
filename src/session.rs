use std::fmt;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use log::warn;
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::config::{ED25519_SECRET_KEY_SIZE, STORAGE_KEY_IDENTITY};
use crate::errors::{AuthClientError, AuthResult};
use crate::storage::{delete_storage, AuthClientStorage};
use crate::utils::der_encode_ed25519_spki;

/// The ephemeral Ed25519 keypair that signs requests for one authenticated
/// session. Its authority comes from the delegation chain, never from the key
/// itself.
#[derive(Clone)]
pub struct SessionKey {
    signing_key: SigningKey,
}

impl SessionKey {
    /// Generate a fresh keypair from the platform CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// DER (SPKI) encoding of the public key; this is what goes on the wire
    /// in the `client-request` message.
    pub fn public_key_der(&self) -> Vec<u8> {
        der_encode_ed25519_spki(&self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Storage blob format: a JSON array `[public_hex, secret_hex]`.
    pub fn to_json(&self) -> String {
        let public_hex = hex::encode(self.public_key());
        let secret_hex = Zeroizing::new(hex::encode(self.signing_key.to_bytes()));
        format!("[\"{}\",\"{}\"]", public_hex, &*secret_hex)
    }

    pub fn from_json(blob: &str) -> AuthResult<Self> {
        let parts: [String; 2] = serde_json::from_str(blob)
            .map_err(|e| AuthClientError::key_decode(&format!("invalid key blob: {}", e)))?;
        let [public_hex, secret_hex] = parts;

        let secret = Zeroizing::new(
            hex::decode(&secret_hex)
                .map_err(|e| AuthClientError::key_decode(&format!("bad secret hex: {}", e)))?,
        );
        let seed: [u8; ED25519_SECRET_KEY_SIZE] = secret
            .as_slice()
            .try_into()
            .map_err(|_| AuthClientError::key_decode("secret key has wrong length"))?;
        let signing_key = SigningKey::from_bytes(&seed);

        // The stored public half must belong to the stored secret; a mismatch
        // means the blob was corrupted or tampered with.
        let public = hex::decode(&public_hex)
            .map_err(|e| AuthClientError::key_decode(&format!("bad public hex: {}", e)))?;
        let expected: VerifyingKey = signing_key.verifying_key();
        if public != expected.to_bytes() {
            return Err(AuthClientError::key_decode(
                "public key does not match secret key",
            ));
        }
        Ok(Self { signing_key })
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half.
        f.debug_struct("SessionKey")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

/// Load/ensure/clear lifecycle of the persisted session keypair.
pub struct SessionKeyStore<'a, S: AuthClientStorage> {
    storage: &'a S,
}

impl<'a, S: AuthClientStorage> SessionKeyStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Load the persisted keypair, or `None` when absent or unreadable.
    ///
    /// An unreadable blob also clears all three credential slots: a keypair
    /// without a consistent chain is useless and potentially stale.
    pub async fn load(&self) -> Option<SessionKey> {
        let blob = match self.storage.get(STORAGE_KEY_IDENTITY).await {
            Ok(blob) => blob?,
            Err(err) => {
                warn!("failed to read stored session key: {}", err);
                return None;
            }
        };
        match SessionKey::from_json(&blob) {
            Ok(key) => Some(key),
            Err(err) => {
                warn!("stored session key is unreadable, clearing cached credentials: {}", err);
                if let Err(err) = delete_storage(self.storage).await {
                    warn!("failed to clear storage after corrupt session key: {}", err);
                }
                None
            }
        }
    }

    /// Load the persisted keypair or generate a new one. A generated pair is
    /// persisted before it is returned.
    pub async fn ensure(&self) -> AuthResult<SessionKey> {
        if let Some(key) = self.load().await {
            return Ok(key);
        }
        let key = SessionKey::generate();
        self.storage
            .set(STORAGE_KEY_IDENTITY, &key.to_json())
            .await?;
        Ok(key)
    }

    /// Drop all persisted credentials.
    pub async fn clear(&self) -> AuthResult<()> {
        delete_storage(self.storage).await
    }
}

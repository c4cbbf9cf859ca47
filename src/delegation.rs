use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bls;
use crate::config::DELEGATION_DOMAIN_SEPARATOR;
use crate::errors::{AuthClientError, AuthResult};
use crate::session::SessionKey;
use crate::utils::current_time_ns;

/// A capability grant: `pubkey` may act on behalf of the delegator until
/// `expiration`, restricted to `targets` when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub pubkey: Vec<u8>,
    /// Nanosecond epoch after which this link is dead.
    pub expiration: u64,
    pub targets: Option<Vec<String>>,
}

/// A delegation plus the proof that the delegator's key authorized it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    pub signature: Vec<u8>,
}

/// Ordered sequence of signed delegations, root-most first, plus the root
/// public key that originated the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationChain {
    pub delegations: Vec<SignedDelegation>,
    pub public_key: Vec<u8>,
}

/// The bytes a delegator signs to authorize one link: a fixed domain
/// separator followed by the SHA-256 of the link's canonical content.
/// Fields are length-prefixed so distinct links can never collide.
pub fn signable_bytes(delegation: &Delegation) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update((delegation.pubkey.len() as u64).to_be_bytes());
    hasher.update(&delegation.pubkey);
    hasher.update(delegation.expiration.to_be_bytes());
    if let Some(targets) = &delegation.targets {
        hasher.update((targets.len() as u64).to_be_bytes());
        for target in targets {
            hasher.update((target.len() as u64).to_be_bytes());
            hasher.update(target.as_bytes());
        }
    }
    let digest = hasher.finalize();

    let mut signable = Vec::with_capacity(DELEGATION_DOMAIN_SEPARATOR.len() + digest.len());
    signable.extend_from_slice(DELEGATION_DOMAIN_SEPARATOR);
    signable.extend_from_slice(&digest);
    signable
}

// JSON wire representation: byte fields as hex strings, expiration as a hex
// string. This is both the on-the-wire and on-disk format and round-trips
// byte-exact.

#[derive(Serialize, Deserialize)]
struct DelegationJson {
    pubkey: String,
    expiration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct SignedDelegationJson {
    delegation: DelegationJson,
    signature: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainJson {
    delegations: Vec<SignedDelegationJson>,
    public_key: String,
}

impl DelegationChain {
    /// Structural assembly only; signature authenticity is established by the
    /// trusted provider channel at construction time and re-checked by
    /// [`DelegationChain::verify_root_anchor`] at point of use.
    pub fn from_signed_delegations(
        delegations: Vec<SignedDelegation>,
        root_public_key: Vec<u8>,
    ) -> Self {
        Self {
            delegations,
            public_key: root_public_key,
        }
    }

    /// A chain is valid only if it has at least one link and every link is
    /// unexpired. One expired link invalidates the whole chain; there is no
    /// partial trust.
    pub fn is_valid(&self, now_ns: u64) -> bool {
        if self.delegations.is_empty() {
            return false;
        }
        self.delegations
            .iter()
            .all(|signed| now_ns < signed.delegation.expiration)
    }

    /// The composed target scope across all links: `None` means unrestricted,
    /// otherwise the intersection of every restricting link. A link later in
    /// the chain can only narrow scope, never widen it.
    pub fn authorized_targets(&self) -> Option<Vec<String>> {
        let mut composed: Option<Vec<String>> = None;
        for signed in &self.delegations {
            if let Some(targets) = &signed.delegation.targets {
                composed = Some(match composed {
                    None => targets.clone(),
                    Some(current) => current
                        .into_iter()
                        .filter(|t| targets.contains(t))
                        .collect(),
                });
            }
        }
        composed
    }

    pub fn is_scoped_to(&self, target: &str) -> bool {
        match self.authorized_targets() {
            None => true,
            Some(targets) => targets.iter().any(|t| t == target),
        }
    }

    /// Verify that the root public key actually signed the root-most link.
    /// This anchors trust in the chain independently of the provider channel
    /// that delivered it.
    pub async fn verify_root_anchor(&self) -> AuthResult<()> {
        let first = self.delegations.first().ok_or_else(|| {
            AuthClientError::verification("delegation chain has no links to verify")
        })?;
        let message = signable_bytes(&first.delegation);
        let verified = bls::verify(&self.public_key, &first.signature, &message).await?;
        if !verified {
            return Err(AuthClientError::verification(
                "root delegation signature does not verify against the root public key",
            ));
        }
        debug!("delegation chain root anchor verified");
        Ok(())
    }

    pub fn to_json(&self) -> AuthResult<String> {
        let dto = ChainJson {
            delegations: self
                .delegations
                .iter()
                .map(|signed| SignedDelegationJson {
                    delegation: DelegationJson {
                        pubkey: hex::encode(&signed.delegation.pubkey),
                        expiration: format!("{:x}", signed.delegation.expiration),
                        targets: signed.delegation.targets.clone(),
                    },
                    signature: hex::encode(&signed.signature),
                })
                .collect(),
            public_key: hex::encode(&self.public_key),
        };
        Ok(serde_json::to_string(&dto)?)
    }

    pub fn from_json(blob: &str) -> AuthResult<Self> {
        let dto: ChainJson = serde_json::from_str(blob)?;
        let mut delegations = Vec::with_capacity(dto.delegations.len());
        for signed in dto.delegations {
            delegations.push(SignedDelegation {
                delegation: Delegation {
                    pubkey: decode_hex_field(&signed.delegation.pubkey, "pubkey")?,
                    expiration: u64::from_str_radix(&signed.delegation.expiration, 16).map_err(
                        |e| {
                            AuthClientError::serialization(&format!(
                                "bad expiration in delegation chain: {}",
                                e
                            ))
                        },
                    )?,
                    targets: signed.delegation.targets,
                },
                signature: decode_hex_field(&signed.signature, "signature")?,
            });
        }
        Ok(Self {
            delegations,
            public_key: decode_hex_field(&dto.public_key, "publicKey")?,
        })
    }
}

fn decode_hex_field(value: &str, field: &str) -> AuthResult<Vec<u8>> {
    hex::decode(value).map_err(|e| {
        AuthClientError::serialization(&format!("bad hex in delegation chain {}: {}", field, e))
    })
}

/// The session keypair paired with the chain that proves its authority.
/// Used for all signing until the chain expires.
#[derive(Debug, Clone)]
pub struct DelegatedIdentity {
    session_key: SessionKey,
    chain: DelegationChain,
}

impl DelegatedIdentity {
    pub fn new(session_key: SessionKey, chain: DelegationChain) -> Self {
        Self { session_key, chain }
    }

    pub fn chain(&self) -> &DelegationChain {
        &self.chain
    }

    /// The root public key the identity ultimately acts for.
    pub fn user_public_key(&self) -> &[u8] {
        &self.chain.public_key
    }

    pub fn session_public_key_der(&self) -> Vec<u8> {
        self.session_key.public_key_der()
    }

    /// Sign a request with the session key. Expired chains must never be
    /// silently used, so this refuses rather than producing a signature
    /// nobody should trust.
    pub fn sign(&self, message: &[u8]) -> AuthResult<[u8; 64]> {
        if !self.chain.is_valid(current_time_ns()) {
            return Err(AuthClientError::ChainExpired);
        }
        Ok(self.session_key.sign(message))
    }

    /// Sign a request addressed to a specific scope target.
    pub fn sign_scoped(&self, message: &[u8], target: &str) -> AuthResult<[u8; 64]> {
        if !self.chain.is_scoped_to(target) {
            return Err(AuthClientError::TargetNotAuthorized(target.to_string()));
        }
        self.sign(message)
    }

    /// Primary signing entry point: re-verifies the chain's root anchor
    /// before producing a signature, so a chain whose provenance cannot be
    /// re-established never signs. [`DelegatedIdentity::sign`] is the
    /// unverified fast path for callers that have already anchored the chain.
    pub async fn sign_verified(&self, message: &[u8]) -> AuthResult<[u8; 64]> {
        self.chain.verify_root_anchor().await?;
        self.sign(message)
    }
}

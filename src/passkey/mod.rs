//! Passwordless (passkey) credential management.
//!
//! The platform authenticator is a constructor-injected [`Authenticator`]
//! so the engine never touches hardware directly. Registration errors
//! propagate; authentication is fail-closed — any authenticator failure
//! (user cancel, no matching credential, verification failure) comes back
//! as an unsuccessful outcome, never as silent acceptance.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, VaultError};
use crate::types::*;

const CHALLENGE_BYTES: usize = 32;

/// A stored public-key credential bound to a relying party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyCredential {
    pub credential_id: String,
    pub public_key: String,
    pub relying_party_id: String,
    pub user_handle: String,
    /// Monotonically non-decreasing signature counter.
    pub counter: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    pub device: String,
    #[serde(default)]
    pub synced: bool,
}

/// Parameters for creating a new credential.
#[derive(Debug, Clone)]
pub struct CredentialRequest {
    pub relying_party_id: String,
    pub user_handle: String,
    pub challenge: Vec<u8>,
    /// Platform-attached authenticator only.
    pub platform_attachment: bool,
    /// The credential must be discoverable (resident).
    pub resident_key: bool,
    pub require_user_verification: bool,
}

/// What the authenticator returns from credential creation.
#[derive(Debug, Clone)]
pub struct CreatedCredential {
    pub credential_id: String,
    pub public_key: String,
    /// Human-readable descriptor of the creating device.
    pub device: String,
}

/// Parameters for requesting an assertion.
#[derive(Debug, Clone)]
pub struct AssertionRequest {
    pub relying_party_id: String,
    pub challenge: Vec<u8>,
    /// Restrict to a specific credential, or any discoverable one.
    pub allow_credential: Option<String>,
    pub require_user_verification: bool,
}

/// A signed assertion from the authenticator.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub credential_id: String,
    pub user_handle: String,
    pub counter: u32,
    pub user_verified: bool,
}

/// The platform authenticator collaborator.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether a user-verifying platform authenticator is available.
    async fn is_available(&self) -> bool;
    async fn make_credential(&self, request: &CredentialRequest) -> Result<CreatedCredential>;
    async fn get_assertion(&self, request: &AssertionRequest) -> Result<Assertion>;
}

/// Outcome of an authentication attempt. Callers distinguish "not
/// authenticated" from "system error" only via logged diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub success: bool,
    pub user_handle: Option<String>,
    /// Counter value observed on success, for the caller to persist.
    pub counter: Option<u32>,
}

impl AuthOutcome {
    fn failure() -> Self {
        Self {
            success: false,
            user_handle: None,
            counter: None,
        }
    }
}

/// Manages creation and verification of passkeys for one relying party.
pub struct PasskeyManager {
    authenticator: Arc<dyn Authenticator>,
    relying_party_id: String,
}

impl PasskeyManager {
    pub fn new(authenticator: Arc<dyn Authenticator>, relying_party_id: impl Into<String>) -> Self {
        Self {
            authenticator,
            relying_party_id: relying_party_id.into(),
        }
    }

    pub fn relying_party_id(&self) -> &str {
        &self.relying_party_id
    }

    /// Register a new discoverable platform credential for `user_handle`.
    pub async fn register(&self, user_handle: &str) -> Result<PasskeyCredential> {
        self.ensure_supported().await?;

        let request = CredentialRequest {
            relying_party_id: self.relying_party_id.clone(),
            user_handle: user_handle.to_string(),
            challenge: fresh_challenge(),
            platform_attachment: true,
            resident_key: true,
            require_user_verification: true,
        };

        let created = self.authenticator.make_credential(&request).await?;
        debug!(credential_id = %created.credential_id, "passkey registered");

        Ok(PasskeyCredential {
            credential_id: created.credential_id,
            public_key: created.public_key,
            relying_party_id: self.relying_party_id.clone(),
            user_handle: user_handle.to_string(),
            counter: 0,
            created_at: Utc::now(),
            last_used: None,
            device: created.device,
            synced: true,
        })
    }

    /// Authenticate with a fresh challenge, optionally pinned to a stored
    /// credential. A stored credential also enables clone detection: an
    /// assertion whose counter does not advance past the stored value is
    /// rejected and flagged.
    pub async fn authenticate(&self, credential: Option<&PasskeyCredential>) -> Result<AuthOutcome> {
        self.ensure_supported().await?;

        let request = AssertionRequest {
            relying_party_id: self.relying_party_id.clone(),
            challenge: fresh_challenge(),
            allow_credential: credential.map(|c| c.credential_id.clone()),
            require_user_verification: true,
        };

        let assertion = match self.authenticator.get_assertion(&request).await {
            Ok(assertion) => assertion,
            Err(e) => {
                warn!(error = %e, "passkey assertion failed");
                return Ok(AuthOutcome::failure());
            }
        };

        if !assertion.user_verified {
            warn!("assertion returned without user verification");
            return Ok(AuthOutcome::failure());
        }

        if let Some(stored) = credential {
            if !counter_advances(stored.counter, assertion.counter) {
                warn!(
                    credential_id = %stored.credential_id,
                    stored = stored.counter,
                    observed = assertion.counter,
                    "signature counter did not advance, possible cloned credential"
                );
                return Ok(AuthOutcome::failure());
            }
        }

        Ok(AuthOutcome {
            success: true,
            user_handle: Some(assertion.user_handle),
            counter: Some(assertion.counter),
        })
    }

    async fn ensure_supported(&self) -> Result<()> {
        if self.authenticator.is_available().await {
            Ok(())
        } else {
            Err(VaultError::PasskeyUnsupported)
        }
    }
}

/// Counters must strictly advance unless the authenticator never
/// increments (both sides zero).
fn counter_advances(stored: u32, observed: u32) -> bool {
    (stored == 0 && observed == 0) || observed > stored
}

fn fresh_challenge() -> Vec<u8> {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.to_vec()
}

/// Encode a challenge or credential id for transport.
pub fn encode_binary(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

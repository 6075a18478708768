//! Master-credential verification.
//!
//! The vault never stores the plaintext master credential. A salted
//! PBKDF2-HMAC-SHA256 verifier is stored instead, and comparison is
//! equality-only in constant time — no partial-match information leaks.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::types::*;

const SALT_LEN: usize = 16;
const VERIFIER_LEN: usize = 32;

/// Stored verifier for the master credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterVerifier {
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    pub iterations: u32,
    #[serde(with = "base64_bytes")]
    verifier: Vec<u8>,
}

impl MasterVerifier {
    /// Derive a fresh verifier from a passphrase with a random salt.
    pub fn create(passphrase: &str, iterations: u32) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let iterations = iterations.max(1);
        let verifier = derive(passphrase, &salt, iterations);
        Self {
            salt,
            iterations,
            verifier: verifier.to_vec(),
        }
    }

    /// Constant-time equality check of a candidate credential.
    pub fn verify(&self, candidate: &str) -> bool {
        let derived = derive(candidate, &self.salt, self.iterations);
        derived.ct_eq(&self.verifier).into()
    }

    /// Derive the persistence-blob passphrase from the master credential.
    /// Domain-separated from the verifier so neither reveals the other.
    pub fn key_material(&self, passphrase: &str) -> Zeroizing<String> {
        let prk = derive(passphrase, &self.salt, self.iterations);
        let hk = Hkdf::<Sha256>::new(None, prk.as_ref());
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(b"cube-vault item-store", okm.as_mut())
            .expect("HKDF output length too large");
        Zeroizing::new(hex::encode(okm.as_ref()))
    }
}

fn derive(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; VERIFIER_LEN]> {
    let mut out = Zeroizing::new([0u8; VERIFIER_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, out.as_mut());
    out
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

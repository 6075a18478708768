use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault is locked. Unlock it first.")]
    Locked,

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("No user-verifying platform authenticator is available")]
    PasskeyUnsupported,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Caller contract violation: {0}")]
    ContractViolation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Whether the caller can recover by unlocking or retrying later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VaultError::Locked | VaultError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

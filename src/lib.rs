//! cube-vault — local password vault engine with breach checking, passkeys,
//! sharing and emergency-access ledgers, and security scoring.
//!
//! This library exposes the vault store and its collaborator modules for
//! programmatic use. All state is owned by the embedding application; the
//! engine holds no global state and performs no background work of its own.
//!
//! # Quick start
//!
//! ```
//! use cubevault::generator::{self, PasswordRules};
//!
//! let password = generator::generate_password(&PasswordRules::default())?;
//! assert_eq!(password.chars().count(), 16);
//! # Ok::<(), cubevault::error::VaultError>(())
//! ```

pub mod auth;
pub mod breach;
pub mod config;
pub mod emergency;
pub mod error;
pub mod generator;
pub mod item;
pub mod passkey;
pub mod share;
pub mod store;
pub mod types;

pub use error::{Result, VaultError};
pub use store::{ItemDraft, ItemFilter, ItemPatch, VaultStore};

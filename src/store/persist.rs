//! Persistence collaborator for vault items.
//!
//! The store is a key-value collaborator keyed by item id. Failed writes
//! are never retried automatically — failure propagates to the caller.
//! [`FileStore`] keeps every item in a single age-encrypted MessagePack
//! blob and replaces it atomically on each mutation.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::item::VaultItem;
use crate::types::*;

/// Key-value object store for vault items.
pub trait ItemStore: Send {
    fn load_all(&self) -> Result<Vec<VaultItem>>;
    fn put(&mut self, item: &VaultItem) -> Result<()>;
    fn delete(&mut self, id: &Uuid) -> Result<()>;
}

/// Encrypted single-file store.
pub struct FileStore {
    path: PathBuf,
    passphrase: Zeroizing<String>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_blob(&self) -> Result<Vec<VaultItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let ciphertext = fs::read(&self.path)?;
        let plaintext = decrypt_with_passphrase(&ciphertext, &self.passphrase)?;
        rmp_serde::from_slice(&plaintext).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    fn write_blob(&self, items: &[VaultItem]) -> Result<()> {
        let plaintext = Zeroizing::new(
            rmp_serde::to_vec_named(items).map_err(|e| VaultError::Serialization(e.to_string()))?,
        );
        let ciphertext = encrypt_with_passphrase(&plaintext, &self.passphrase)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Atomic write: temp file, then rename.
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &ciphertext)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl ItemStore for FileStore {
    fn load_all(&self) -> Result<Vec<VaultItem>> {
        self.read_blob()
    }

    fn put(&mut self, item: &VaultItem) -> Result<()> {
        let mut items = self.read_blob()?;
        match items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        self.write_blob(&items)
    }

    fn delete(&mut self, id: &Uuid) -> Result<()> {
        let mut items = self.read_blob()?;
        items.retain(|item| item.id() != *id);
        self.write_blob(&items)
    }
}

/// In-memory store for tests and ephemeral vaults.
#[derive(Default)]
pub struct MemoryStore {
    items: BTreeMap<Uuid, VaultItem>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<VaultItem>> {
        Ok(self.items.values().cloned().collect())
    }

    fn put(&mut self, item: &VaultItem) -> Result<()> {
        self.items.insert(item.id(), item.clone());
        Ok(())
    }

    fn delete(&mut self, id: &Uuid) -> Result<()> {
        self.items.remove(id);
        Ok(())
    }
}

fn encrypt_with_passphrase(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_user_passphrase(age::secrecy::Secret::new(
        passphrase.to_string(),
    ));

    let mut encrypted = vec![];
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    Ok(encrypted)
}

fn decrypt_with_passphrase(ciphertext: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(ciphertext)
        .map_err(|e| VaultError::Decryption(e.to_string()))?
    {
        age::Decryptor::Passphrase(d) => d,
        _ => {
            return Err(VaultError::Decryption(
                "Expected passphrase-encrypted data".into(),
            ))
        }
    };

    let mut decrypted = vec![];
    let mut reader = decryptor
        .decrypt(&age::secrecy::Secret::new(passphrase.to_string()), None)
        .map_err(|e| VaultError::Decryption(e.to_string()))?;
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| VaultError::Decryption(e.to_string()))?;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemMeta, SecureNote};

    fn note(title: &str) -> VaultItem {
        VaultItem::SecureNote(SecureNote {
            meta: ItemMeta::new(title.into()),
        })
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("vault.bin"), "pw");
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn put_and_reload_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vault.bin");
        let mut store = FileStore::new(&path, "pw");

        let a = note("first");
        let b = note("second");
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        let reloaded = FileStore::new(&path, "pw").load_all().unwrap();
        assert_eq!(reloaded.len(), 2);

        // Replacing an existing id must not duplicate it.
        let mut a2 = a.clone();
        a2.meta_mut().title = "renamed".into();
        store.put(&a2).unwrap();
        let reloaded = store.load_all().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.iter().any(|i| i.meta().title == "renamed"));
    }

    #[test]
    fn delete_removes_item() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("vault.bin"), "pw");

        let a = note("keep");
        let b = note("drop");
        store.put(&a).unwrap();
        store.put(&b).unwrap();
        store.delete(&b.id()).unwrap();

        let items = store.load_all().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), a.id());
    }

    #[test]
    fn wrong_passphrase_fails_decryption() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vault.bin");

        let mut store = FileStore::new(&path, "right");
        store.put(&note("x")).unwrap();

        let err = FileStore::new(&path, "wrong").load_all().unwrap_err();
        assert!(matches!(err, VaultError::Decryption(_)));
    }

    #[test]
    fn no_temp_file_remains_after_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vault.bin");
        let mut store = FileStore::new(&path, "pw");
        store.put(&note("x")).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}

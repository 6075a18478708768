//! The vault item data model.
//!
//! Items are a closed sum type so every consumer handles all five variants
//! exhaustively. Each variant embeds a shared [`ItemMeta`] carrying the
//! fields common to every item kind.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::breach::BreachStatus;
use crate::passkey::PasskeyCredential;
use crate::types::*;

/// Fields shared by every vault item variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Hidden from every read path while travel mode is enabled.
    #[serde(default)]
    pub travel_mode_hidden: bool,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ItemMeta {
    pub fn new(title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            category: None,
            tags: BTreeSet::new(),
            favorite: false,
            created_at: now,
            updated_at: now,
            last_accessed: None,
            travel_mode_hidden: false,
            custom_fields: Vec::new(),
            notes: None,
            attachments: Vec::new(),
        }
    }

    /// Refresh the modified timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A user-defined typed field attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Hidden,
    Url,
    Email,
    Date,
    Otp,
}

/// A file attached to an item. The encrypted blob itself is optional so
/// listings can carry attachment metadata without the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

/// One prior secret of a login. Append-only: entries are never mutated
/// or reordered once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PasswordHistoryEntry {
    pub secret: String,
    #[zeroize(skip)]
    pub changed_at: DateTime<Utc>,
}

/// A login credential item.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Login {
    #[zeroize(skip)]
    pub meta: ItemMeta,
    #[zeroize(skip)]
    pub username: String,
    #[zeroize(skip)]
    pub email: Option<String>,
    /// Opaque ciphertext outside the engine's own algorithms.
    pub secret: String,
    #[zeroize(skip)]
    pub urls: Vec<String>,
    pub otp_seed: Option<String>,
    /// Prior secrets, oldest first.
    pub password_history: Vec<PasswordHistoryEntry>,
    #[zeroize(skip)]
    pub compromised: bool,
    #[zeroize(skip)]
    pub breach_info: Option<BreachStatus>,
    #[zeroize(skip)]
    pub passkey: Option<PasskeyCredential>,
}

/// A payment card item.
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CreditCard {
    #[zeroize(skip)]
    pub meta: ItemMeta,
    #[zeroize(skip)]
    pub cardholder: String,
    pub number: String,
    #[zeroize(skip)]
    pub expiry_month: u8,
    #[zeroize(skip)]
    pub expiry_year: u16,
    pub cvv: String,
    #[zeroize(skip)]
    pub brand: Option<String>,
}

/// A personal identity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub meta: ItemMeta,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
}

/// A free-form encrypted note. The body lives in `meta.notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureNote {
    pub meta: ItemMeta,
}

/// A stored document. The payload lives in `meta.attachments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureDocument {
    pub meta: ItemMeta,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
}

/// A single vault item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultItem {
    Login(Login),
    CreditCard(CreditCard),
    Identity(Identity),
    SecureNote(SecureNote),
    SecureDocument(SecureDocument),
}

/// Discriminant of a [`VaultItem`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Login,
    CreditCard,
    Identity,
    SecureNote,
    SecureDocument,
}

impl VaultItem {
    pub fn meta(&self) -> &ItemMeta {
        match self {
            VaultItem::Login(i) => &i.meta,
            VaultItem::CreditCard(i) => &i.meta,
            VaultItem::Identity(i) => &i.meta,
            VaultItem::SecureNote(i) => &i.meta,
            VaultItem::SecureDocument(i) => &i.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ItemMeta {
        match self {
            VaultItem::Login(i) => &mut i.meta,
            VaultItem::CreditCard(i) => &mut i.meta,
            VaultItem::Identity(i) => &mut i.meta,
            VaultItem::SecureNote(i) => &mut i.meta,
            VaultItem::SecureDocument(i) => &mut i.meta,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta().id
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            VaultItem::Login(_) => ItemKind::Login,
            VaultItem::CreditCard(_) => ItemKind::CreditCard,
            VaultItem::Identity(_) => ItemKind::Identity,
            VaultItem::SecureNote(_) => ItemKind::SecureNote,
            VaultItem::SecureDocument(_) => ItemKind::SecureDocument,
        }
    }

    pub fn as_login(&self) -> Option<&Login> {
        match self {
            VaultItem::Login(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_login_mut(&mut self) -> Option<&mut Login> {
        match self {
            VaultItem::Login(i) => Some(i),
            _ => None,
        }
    }
}

impl Login {
    /// Record the current secret in history and replace it.
    ///
    /// The previous secret is appended before the new one is written, so
    /// history length always equals the number of secret changes.
    pub fn rotate_secret(&mut self, new_secret: String) {
        let previous = std::mem::take(&mut self.secret);
        self.password_history.push(PasswordHistoryEntry {
            secret: previous,
            changed_at: Utc::now(),
        });
        self.secret = new_secret;
    }
}

//! The vault store: lock lifecycle, item CRUD, queries, travel mode, and
//! composition of the sub-services.
//!
//! The store is the only component with write access to persisted state.
//! It is single-writer by construction — mutating operations take
//! `&mut self`, and an owning application serializes access (mutex or a
//! single-threaded actor). Sub-services never hold references to item
//! content, only values passed in per operation.

pub mod persist;
pub mod score;

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::MasterVerifier;
use crate::breach::{BreachClient, BreachStatus, RangeIndex};
use crate::config::EngineConfig;
use crate::emergency::{EmergencyContact, EmergencyLedger};
use crate::error::{Result, VaultError};
use crate::generator::{self, PasswordRules};
use crate::item::{
    CreditCard, Identity, ItemKind, ItemMeta, Login, SecureDocument, SecureNote, VaultItem,
};
use crate::passkey::{AuthOutcome, Authenticator, PasskeyCredential, PasskeyManager};
use crate::share::{SharePermission, SharedItem, SharingLedger};
use crate::store::persist::ItemStore;
use crate::store::score::SecurityReport;
use crate::types::*;

/// Typed payload for creating a new item. Variant-required fields are
/// validated before anything is committed.
#[derive(Debug, Clone)]
pub enum ItemDraft {
    Login {
        title: String,
        username: String,
        email: Option<String>,
        secret: String,
        urls: Vec<String>,
        otp_seed: Option<String>,
    },
    CreditCard {
        title: String,
        cardholder: String,
        number: String,
        expiry_month: u8,
        expiry_year: u16,
        cvv: String,
        brand: Option<String>,
    },
    Identity {
        title: String,
        first_name: String,
        last_name: String,
        email: Option<String>,
        phone: Option<String>,
        address: Option<String>,
        national_id: Option<String>,
    },
    SecureNote {
        title: String,
        body: String,
    },
    SecureDocument {
        title: String,
        file_name: String,
        mime_type: String,
        size: u64,
    },
}

impl ItemDraft {
    fn validate(&self) -> Result<()> {
        let violation = |msg: &str| Err(VaultError::ContractViolation(msg.into()));
        match self {
            ItemDraft::Login { title, secret, .. } => {
                if title.trim().is_empty() {
                    return violation("login title must not be empty");
                }
                if secret.is_empty() {
                    return violation("login secret must not be empty");
                }
            }
            ItemDraft::CreditCard {
                title,
                number,
                expiry_month,
                ..
            } => {
                if title.trim().is_empty() {
                    return violation("card title must not be empty");
                }
                if number.trim().is_empty() {
                    return violation("card number must not be empty");
                }
                if !(1..=12).contains(expiry_month) {
                    return violation("card expiry month must be 1-12");
                }
            }
            ItemDraft::Identity {
                title,
                first_name,
                last_name,
                ..
            } => {
                if title.trim().is_empty() {
                    return violation("identity title must not be empty");
                }
                if first_name.trim().is_empty() && last_name.trim().is_empty() {
                    return violation("identity requires a name");
                }
            }
            ItemDraft::SecureNote { title, .. } => {
                if title.trim().is_empty() {
                    return violation("note title must not be empty");
                }
            }
            ItemDraft::SecureDocument {
                title, file_name, ..
            } => {
                if title.trim().is_empty() {
                    return violation("document title must not be empty");
                }
                if file_name.trim().is_empty() {
                    return violation("document file name must not be empty");
                }
            }
        }
        Ok(())
    }
}

/// Partial update of an existing item. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
    pub favorite: Option<bool>,
    pub notes: Option<Option<String>>,
    pub travel_mode_hidden: Option<bool>,
    // Login-only fields. Setting them on another variant is a caller error.
    pub username: Option<String>,
    pub email: Option<Option<String>>,
    pub secret: Option<String>,
    pub urls: Option<Vec<String>>,
    pub otp_seed: Option<Option<String>>,
}

impl ItemPatch {
    fn touches_login_fields(&self) -> bool {
        self.username.is_some()
            || self.email.is_some()
            || self.secret.is_some()
            || self.urls.is_some()
            || self.otp_seed.is_some()
    }
}

/// Query predicates for [`VaultStore::get_items`].
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kind: Option<ItemKind>,
    pub category: Option<String>,
    pub favorite: Option<bool>,
    /// Case-insensitive substring over title, notes, username, and URLs.
    pub search: Option<String>,
}

impl ItemFilter {
    fn matches(&self, item: &VaultItem) -> bool {
        let meta = item.meta();
        if let Some(kind) = self.kind {
            if item.kind() != kind {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if meta.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(favorite) = self.favorite {
            if meta.favorite != favorite {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let mut haystacks: Vec<String> = vec![meta.title.to_lowercase()];
            if let Some(notes) = &meta.notes {
                haystacks.push(notes.to_lowercase());
            }
            if let VaultItem::Login(login) = item {
                haystacks.push(login.username.to_lowercase());
                haystacks.extend(login.urls.iter().map(|u| u.to_lowercase()));
            }
            if !haystacks.iter().any(|hay| hay.contains(&needle)) {
                return false;
            }
        }
        true
    }
}

/// Vault-wide travel mode state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelModeSettings {
    pub enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub hidden_item_count: usize,
}

struct UnlockedState {
    items: BTreeMap<Uuid, VaultItem>,
}

/// The orchestrating vault engine.
pub struct VaultStore {
    config: EngineConfig,
    verifier: MasterVerifier,
    store: Box<dyn ItemStore>,
    breach: BreachClient,
    passkeys: PasskeyManager,
    shares: SharingLedger,
    emergency: EmergencyLedger,
    state: Option<UnlockedState>,
    travel_enabled: bool,
    travel_started: Option<DateTime<Utc>>,
}

impl VaultStore {
    /// Build a vault engine from explicit collaborators. No global state:
    /// the owning application constructs and owns every dependency.
    pub fn new(
        config: EngineConfig,
        verifier: MasterVerifier,
        store: Box<dyn ItemStore>,
        breach_index: Arc<dyn RangeIndex>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let breach = BreachClient::new(breach_index, config.breach.cache_ttl_hours);
        let passkeys = PasskeyManager::new(authenticator, config.passkey.relying_party_id.clone());
        Self {
            config,
            verifier,
            store,
            breach,
            passkeys,
            shares: SharingLedger::new(),
            emergency: EmergencyLedger::new(),
            state: None,
            travel_enabled: false,
            travel_started: None,
        }
    }

    // ── lock lifecycle ───────────────────────────────────────────

    pub fn is_locked(&self) -> bool {
        self.state.is_none()
    }

    /// Verify the master credential and load the item set into memory.
    /// Comparison is equality-only; no partial-match information leaks.
    /// The credential is verified even when the vault is already unlocked,
    /// in which case a correct one is a no-op.
    pub fn unlock(&mut self, passphrase: &str) -> Result<()> {
        if !self.verifier.verify(passphrase) {
            return Err(VaultError::AuthFailed("master credential rejected".into()));
        }
        if self.state.is_some() {
            return Ok(());
        }

        let items: BTreeMap<Uuid, VaultItem> = self
            .store
            .load_all()?
            .into_iter()
            .map(|item| (item.id(), item))
            .collect();
        info!(items = items.len(), "vault unlocked");
        self.state = Some(UnlockedState { items });
        Ok(())
    }

    /// Discard the in-memory item set immediately. Any derived data
    /// (scores, breach results) computed before the lock is invalid and
    /// must be re-fetched after the next unlock.
    pub fn lock(&mut self) {
        self.state = None;
        info!("vault locked");
    }

    // ── item CRUD ────────────────────────────────────────────────

    /// Create a new item from a validated draft.
    ///
    /// Login secrets are checked against the breach oracle before the item
    /// is committed; dropping the future mid-check commits nothing.
    pub async fn add_item(&mut self, draft: ItemDraft) -> Result<Uuid> {
        self.ensure_unlocked()?;
        draft.validate()?;

        let item = match draft {
            ItemDraft::Login {
                title,
                username,
                email,
                secret,
                urls,
                otp_seed,
            } => {
                let status = self.breach.check(&secret).await;
                VaultItem::Login(Login {
                    meta: ItemMeta::new(title),
                    username,
                    email,
                    secret,
                    urls,
                    otp_seed,
                    password_history: Vec::new(),
                    compromised: status.compromised,
                    breach_info: Some(status),
                    passkey: None,
                })
            }
            ItemDraft::CreditCard {
                title,
                cardholder,
                number,
                expiry_month,
                expiry_year,
                cvv,
                brand,
            } => VaultItem::CreditCard(CreditCard {
                meta: ItemMeta::new(title),
                cardholder,
                number,
                expiry_month,
                expiry_year,
                cvv,
                brand,
            }),
            ItemDraft::Identity {
                title,
                first_name,
                last_name,
                email,
                phone,
                address,
                national_id,
            } => VaultItem::Identity(Identity {
                meta: ItemMeta::new(title),
                first_name,
                last_name,
                email,
                phone,
                address,
                national_id,
            }),
            ItemDraft::SecureNote { title, body } => {
                let mut meta = ItemMeta::new(title);
                meta.notes = Some(body);
                VaultItem::SecureNote(SecureNote { meta })
            }
            ItemDraft::SecureDocument {
                title,
                file_name,
                mime_type,
                size,
            } => VaultItem::SecureDocument(SecureDocument {
                meta: ItemMeta::new(title),
                file_name,
                mime_type,
                size,
            }),
        };

        let id = item.id();
        self.store.put(&item)?;
        self.items_mut()?.insert(id, item);
        debug!(%id, "item added");
        Ok(id)
    }

    /// Apply a partial update. When the patch changes a login's secret,
    /// the prior secret is appended to password history first and the new
    /// secret is re-checked against the breach oracle.
    pub async fn update_item(&mut self, id: Uuid, patch: ItemPatch) -> Result<()> {
        self.ensure_unlocked()?;

        let mut item = self
            .visible_item(&id)?
            .ok_or_else(|| VaultError::ItemNotFound(id.to_string()))?;

        if patch.touches_login_fields() && item.as_login().is_none() {
            return Err(VaultError::ContractViolation(
                "login fields patched on a non-login item".into(),
            ));
        }

        let secret_change = match (&patch.secret, item.as_login()) {
            (Some(new_secret), Some(login)) if *new_secret != login.secret => {
                Some((new_secret.clone(), self.breach.check(new_secret).await))
            }
            _ => None,
        };

        let meta = item.meta_mut();
        if let Some(title) = patch.title {
            meta.title = title;
        }
        if let Some(category) = patch.category {
            meta.category = category;
        }
        if let Some(tags) = patch.tags {
            meta.tags = tags;
        }
        if let Some(favorite) = patch.favorite {
            meta.favorite = favorite;
        }
        if let Some(notes) = patch.notes {
            meta.notes = notes;
        }
        if let Some(hidden) = patch.travel_mode_hidden {
            meta.travel_mode_hidden = hidden;
        }

        if let Some(login) = item.as_login_mut() {
            if let Some(username) = patch.username {
                login.username = username;
            }
            if let Some(email) = patch.email {
                login.email = email;
            }
            if let Some(urls) = patch.urls {
                login.urls = urls;
            }
            if let Some(otp_seed) = patch.otp_seed {
                login.otp_seed = otp_seed;
            }
            if let Some((new_secret, status)) = secret_change {
                login.rotate_secret(new_secret);
                login.compromised = status.compromised;
                login.breach_info = Some(status);
            }
        }

        item.meta_mut().touch();
        self.store.put(&item)?;
        self.items_mut()?.insert(id, item);
        Ok(())
    }

    /// Irreversibly delete an item from memory and persistence. Items
    /// hidden by travel mode read as absent here too.
    pub fn delete_item(&mut self, id: Uuid) -> Result<()> {
        self.ensure_unlocked()?;
        if self.visible_item(&id)?.is_none() {
            return Err(VaultError::ItemNotFound(id.to_string()));
        }
        self.store.delete(&id)?;
        self.items_mut()?.remove(&id);
        debug!(%id, "item deleted");
        Ok(())
    }

    /// Stamp an item's last-accessed time without touching `updated_at`.
    pub fn touch_access(&mut self, id: Uuid) -> Result<()> {
        self.ensure_unlocked()?;
        let mut item = self
            .visible_item(&id)?
            .ok_or_else(|| VaultError::ItemNotFound(id.to_string()))?;
        item.meta_mut().last_accessed = Some(Utc::now());
        self.store.put(&item)?;
        self.items_mut()?.insert(id, item);
        Ok(())
    }

    // ── queries ──────────────────────────────────────────────────

    /// Items matching `filter`, excluding travel-hidden items while travel
    /// mode is on, sorted by `updated_at` descending. The ordering is a
    /// stable contract callers may rely on.
    pub fn get_items(&self, filter: &ItemFilter) -> Result<Vec<VaultItem>> {
        let mut items: Vec<VaultItem> = self
            .items()?
            .values()
            .filter(|item| self.is_visible(item))
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.meta().updated_at.cmp(&a.meta().updated_at));
        Ok(items)
    }

    /// Fetch one item by id. Travel-hidden items read as absent while
    /// travel mode is enabled.
    pub fn get_item(&self, id: Uuid) -> Result<VaultItem> {
        self.visible_item(&id)?
            .ok_or_else(|| VaultError::ItemNotFound(id.to_string()))
    }

    // ── travel mode ──────────────────────────────────────────────

    pub fn enable_travel_mode(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        if !self.travel_enabled {
            self.travel_enabled = true;
            self.travel_started = Some(Utc::now());
            info!("travel mode enabled");
        }
        Ok(())
    }

    pub fn disable_travel_mode(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        self.travel_enabled = false;
        self.travel_started = None;
        info!("travel mode disabled");
        Ok(())
    }

    pub fn travel_status(&self) -> Result<TravelModeSettings> {
        let hidden_item_count = self
            .items()?
            .values()
            .filter(|item| item.meta().travel_mode_hidden)
            .count();
        Ok(TravelModeSettings {
            enabled: self.travel_enabled,
            started_at: self.travel_started,
            hidden_item_count,
        })
    }

    // ── security score ───────────────────────────────────────────

    /// Recompute the aggregate security posture over visible logins.
    pub fn security_score(&self) -> Result<SecurityReport> {
        let items = self.items()?;
        let logins: Vec<&Login> = items
            .values()
            .filter(|item| self.is_visible(item))
            .filter_map(VaultItem::as_login)
            .collect();
        Ok(score::assess(
            &logins,
            self.config.score.max_password_age_days,
            Utc::now(),
        ))
    }

    // ── credential generation ────────────────────────────────────

    /// Generate a password. Stateless; available even while locked.
    pub fn generate_password(&self, rules: &PasswordRules) -> Result<String> {
        generator::generate_password(rules)
    }

    // ── breach oracle ────────────────────────────────────────────

    /// Advisory breach check for a candidate secret. Fails open.
    pub async fn check_breach(&self, secret: &str) -> BreachStatus {
        self.breach.check(secret).await
    }

    // ── passkeys ─────────────────────────────────────────────────

    /// Register a platform passkey and bind it to a login item.
    pub async fn register_passkey(
        &mut self,
        item_id: Uuid,
        user_handle: &str,
    ) -> Result<PasskeyCredential> {
        self.ensure_unlocked()?;
        let mut item = self
            .visible_item(&item_id)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_string()))?;
        let Some(login) = item.as_login_mut() else {
            return Err(VaultError::ContractViolation(
                "passkeys bind to login items only".into(),
            ));
        };

        let credential = self.passkeys.register(user_handle).await?;
        login.passkey = Some(credential.clone());
        item.meta_mut().touch();
        self.store.put(&item)?;
        self.items_mut()?.insert(item_id, item);
        Ok(credential)
    }

    /// Authenticate with the passkey bound to `item_id`, or with any
    /// discoverable credential when `item_id` is `None`. On success the
    /// bound credential's counter and last-used stamp are persisted.
    pub async fn authenticate_passkey(&mut self, item_id: Option<Uuid>) -> Result<AuthOutcome> {
        self.ensure_unlocked()?;

        let Some(item_id) = item_id else {
            return self.passkeys.authenticate(None).await;
        };

        let mut item = self
            .visible_item(&item_id)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_string()))?;
        let credential = item
            .as_login()
            .and_then(|login| login.passkey.clone())
            .ok_or_else(|| {
                VaultError::ContractViolation("item has no bound passkey".into())
            })?;

        let outcome = self.passkeys.authenticate(Some(&credential)).await?;
        if outcome.success {
            if let Some(login) = item.as_login_mut() {
                if let Some(passkey) = login.passkey.as_mut() {
                    if let Some(counter) = outcome.counter {
                        passkey.counter = counter;
                    }
                    passkey.last_used = Some(Utc::now());
                }
            }
            self.store.put(&item)?;
            self.items_mut()?.insert(item_id, item);
        }
        Ok(outcome)
    }

    // ── secure sharing ───────────────────────────────────────────

    pub fn create_share(
        &mut self,
        item_id: Uuid,
        recipient: impl Into<String>,
        permission: SharePermission,
        expires_in_hours: Option<i64>,
    ) -> Result<SharedItem> {
        self.ensure_unlocked()?;
        if self.visible_item(&item_id)?.is_none() {
            return Err(VaultError::ItemNotFound(item_id.to_string()));
        }
        Ok(self
            .shares
            .create_share(item_id, recipient, permission, expires_in_hours))
    }

    pub fn revoke_share(&mut self, share_id: &Uuid) -> Result<()> {
        self.ensure_unlocked()?;
        self.shares.revoke(share_id)
    }

    pub fn record_share_access(&mut self, share_id: &Uuid) -> Result<u64> {
        self.ensure_unlocked()?;
        self.shares.record_access(share_id)
    }

    pub fn shares(&self) -> Result<&SharingLedger> {
        self.ensure_unlocked()?;
        Ok(&self.shares)
    }

    // ── emergency access ─────────────────────────────────────────

    pub fn add_emergency_contact(
        &mut self,
        name: impl Into<String>,
        contact_ref: impl Into<String>,
        wait_days: i64,
    ) -> Result<EmergencyContact> {
        self.ensure_unlocked()?;
        self.emergency.add_contact(name, contact_ref, wait_days)
    }

    pub fn activate_emergency_contact(&mut self, id: &Uuid) -> Result<bool> {
        self.ensure_unlocked()?;
        self.emergency.activate(id)
    }

    pub fn request_emergency_access(&mut self, id: &Uuid) -> Result<bool> {
        self.ensure_unlocked()?;
        self.emergency.request_access(id)
    }

    pub fn approve_emergency_access(&mut self, id: &Uuid) -> Result<bool> {
        self.ensure_unlocked()?;
        self.emergency.approve_access(id)
    }

    pub fn deny_emergency_access(&mut self, id: &Uuid) -> Result<bool> {
        self.ensure_unlocked()?;
        self.emergency.deny_access(id)
    }

    /// The periodic safety valve: auto-grant overdue requests.
    pub fn check_emergency_requests(&mut self, now: DateTime<Utc>) -> Result<Vec<EmergencyContact>> {
        self.ensure_unlocked()?;
        Ok(self.emergency.check_pending_requests(now))
    }

    pub fn emergency_contacts(&self) -> Result<&EmergencyLedger> {
        self.ensure_unlocked()?;
        Ok(&self.emergency)
    }

    // ── internal helpers ─────────────────────────────────────────

    fn ensure_unlocked(&self) -> Result<()> {
        if self.state.is_some() {
            Ok(())
        } else {
            Err(VaultError::Locked)
        }
    }

    fn items(&self) -> Result<&BTreeMap<Uuid, VaultItem>> {
        self.state
            .as_ref()
            .map(|state| &state.items)
            .ok_or(VaultError::Locked)
    }

    fn items_mut(&mut self) -> Result<&mut BTreeMap<Uuid, VaultItem>> {
        self.state
            .as_mut()
            .map(|state| &mut state.items)
            .ok_or(VaultError::Locked)
    }

    fn is_visible(&self, item: &VaultItem) -> bool {
        !(self.travel_enabled && item.meta().travel_mode_hidden)
    }

    fn visible_item(&self, id: &Uuid) -> Result<Option<VaultItem>> {
        Ok(self
            .items()?
            .get(id)
            .filter(|item| self.is_visible(item))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_item(title: &str, username: &str, url: &str) -> VaultItem {
        VaultItem::Login(Login {
            meta: ItemMeta::new(title.into()),
            username: username.into(),
            email: None,
            secret: "s3cret".into(),
            urls: vec![url.into()],
            otp_seed: None,
            password_history: Vec::new(),
            compromised: false,
            breach_info: None,
            passkey: None,
        })
    }

    #[test]
    fn filter_matches_kind_and_search_fields() {
        let item = login_item("Personal Mail", "jane.doe", "https://mail.example.com");

        assert!(ItemFilter::default().matches(&item));
        assert!(ItemFilter {
            kind: Some(ItemKind::Login),
            ..Default::default()
        }
        .matches(&item));
        assert!(!ItemFilter {
            kind: Some(ItemKind::SecureNote),
            ..Default::default()
        }
        .matches(&item));

        // Search is case-insensitive and covers username and URLs.
        for needle in ["personal", "JANE.DOE", "mail.example.com"] {
            assert!(ItemFilter {
                search: Some(needle.into()),
                ..Default::default()
            }
            .matches(&item));
        }
        assert!(!ItemFilter {
            search: Some("absent".into()),
            ..Default::default()
        }
        .matches(&item));
    }

    #[test]
    fn filter_matches_category_and_favorite() {
        let mut item = login_item("a", "u", "https://x");
        item.meta_mut().category = Some("work".into());

        assert!(ItemFilter {
            category: Some("work".into()),
            ..Default::default()
        }
        .matches(&item));
        assert!(!ItemFilter {
            category: Some("personal".into()),
            ..Default::default()
        }
        .matches(&item));
        assert!(!ItemFilter {
            favorite: Some(true),
            ..Default::default()
        }
        .matches(&item));
    }

    #[test]
    fn draft_validation_rejects_bad_fields() {
        let bad_month = ItemDraft::CreditCard {
            title: "card".into(),
            cardholder: "J. Doe".into(),
            number: "4111111111111111".into(),
            expiry_month: 0,
            expiry_year: 2030,
            cvv: "123".into(),
            brand: None,
        };
        assert!(bad_month.validate().is_err());

        let nameless = ItemDraft::Identity {
            title: "id".into(),
            first_name: "  ".into(),
            last_name: "".into(),
            email: None,
            phone: None,
            address: None,
            national_id: None,
        };
        assert!(nameless.validate().is_err());

        let ok = ItemDraft::SecureNote {
            title: "note".into(),
            body: String::new(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn patch_knows_when_it_touches_login_fields() {
        assert!(!ItemPatch::default().touches_login_fields());
        assert!(!ItemPatch {
            favorite: Some(true),
            ..Default::default()
        }
        .touches_login_fields());
        assert!(ItemPatch {
            otp_seed: Some(None),
            ..Default::default()
        }
        .touches_login_fields());
    }
}

//! Secure sharing ledger.
//!
//! Bookkeeping for time-boxed, permissioned references to single vault
//! items. The ledger records shares and access counts; it is not an access
//! gate. Callers must check [`SharedItem::is_honorable`] before honoring a
//! share.

use crate::error::{Result, VaultError};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    #[default]
    View,
    Edit,
}

/// One issued share of a vault item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedItem {
    pub share_id: Uuid,
    pub item_id: Uuid,
    pub recipient: String,
    pub permission: SharePermission,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    /// Once false, never true again. Re-sharing requires a new share.
    pub active: bool,
}

impl SharedItem {
    /// Caller-side gate: whether this share should be honored at `now`.
    pub fn is_honorable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

/// In-memory ledger of issued shares.
#[derive(Debug, Default)]
pub struct SharingLedger {
    shares: BTreeMap<Uuid, SharedItem>,
}

impl SharingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new share of `item_id` to `recipient`.
    pub fn create_share(
        &mut self,
        item_id: Uuid,
        recipient: impl Into<String>,
        permission: SharePermission,
        expires_in_hours: Option<i64>,
    ) -> SharedItem {
        let now = Utc::now();
        let share = SharedItem {
            share_id: Uuid::new_v4(),
            item_id,
            recipient: recipient.into(),
            permission,
            expires_at: expires_in_hours.map(|hours| now + Duration::hours(hours)),
            created_at: now,
            access_count: 0,
            active: true,
        };
        self.shares.insert(share.share_id, share.clone());
        share
    }

    /// Deactivate a share. Idempotent and irreversible.
    pub fn revoke(&mut self, share_id: &Uuid) -> Result<()> {
        let share = self
            .shares
            .get_mut(share_id)
            .ok_or_else(|| VaultError::ItemNotFound(share_id.to_string()))?;
        share.active = false;
        Ok(())
    }

    /// Record one access. Pure bookkeeping: counts even for revoked or
    /// expired shares, since enforcement is the caller's job.
    pub fn record_access(&mut self, share_id: &Uuid) -> Result<u64> {
        let share = self
            .shares
            .get_mut(share_id)
            .ok_or_else(|| VaultError::ItemNotFound(share_id.to_string()))?;
        share.access_count += 1;
        Ok(share.access_count)
    }

    pub fn get(&self, share_id: &Uuid) -> Option<&SharedItem> {
        self.shares.get(share_id)
    }

    pub fn shares_for_item(&self, item_id: &Uuid) -> Vec<&SharedItem> {
        self.shares
            .values()
            .filter(|share| share.item_id == *item_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedItem> {
        self.shares.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_share_defaults() {
        let mut ledger = SharingLedger::new();
        let item_id = Uuid::new_v4();
        let share = ledger.create_share(item_id, "alice@example.com", SharePermission::View, None);

        assert!(share.active);
        assert_eq!(share.access_count, 0);
        assert!(share.expires_at.is_none());
        assert_eq!(ledger.shares_for_item(&item_id).len(), 1);
    }

    #[test]
    fn revoke_is_idempotent_and_irreversible() {
        let mut ledger = SharingLedger::new();
        let share = ledger.create_share(Uuid::new_v4(), "bob", SharePermission::Edit, Some(1));

        ledger.revoke(&share.share_id).unwrap();
        ledger.revoke(&share.share_id).unwrap();
        assert!(!ledger.get(&share.share_id).unwrap().active);
    }

    #[test]
    fn access_counts_even_after_revoke() {
        let mut ledger = SharingLedger::new();
        let share = ledger.create_share(Uuid::new_v4(), "bob", SharePermission::View, None);

        ledger.record_access(&share.share_id).unwrap();
        ledger.revoke(&share.share_id).unwrap();
        let count = ledger.record_access(&share.share_id).unwrap();

        assert_eq!(count, 2);
        assert!(!ledger.get(&share.share_id).unwrap().active);
    }

    #[test]
    fn expiry_is_enforced_by_caller_not_ledger() {
        let mut ledger = SharingLedger::new();
        let share = ledger.create_share(Uuid::new_v4(), "carol", SharePermission::View, Some(1));

        // Two hours later the ledger still reports the share active...
        let later = Utc::now() + Duration::hours(2);
        let stored = ledger.get(&share.share_id).unwrap();
        assert!(stored.active);
        // ...but a caller-side gate denies it.
        assert!(!stored.is_honorable(later));
        assert!(stored.is_honorable(Utc::now()));
    }

    #[test]
    fn unknown_share_is_an_error() {
        let mut ledger = SharingLedger::new();
        assert!(matches!(
            ledger.record_access(&Uuid::new_v4()),
            Err(VaultError::ItemNotFound(_))
        ));
    }
}

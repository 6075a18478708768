//! Emergency access ledger.
//!
//! Trusted contacts move through `pending → active → requested →
//! granted/denied`. Transitions are monotonic; granted and denied are
//! terminal for a request cycle. [`EmergencyLedger::check_pending_requests`]
//! is the dead-man's-switch: once a request has waited out its configured
//! period without an explicit denial, access is granted automatically.

use tracing::info;

use crate::error::{Result, VaultError};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Pending,
    Active,
    Requested,
    Granted,
    Denied,
}

/// A trusted contact who may request emergency access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: Uuid,
    pub name: String,
    /// How the contact is reached (email, phone, ...).
    pub contact_ref: String,
    pub wait_days: i64,
    pub status: EmergencyStatus,
    pub request_date: Option<DateTime<Utc>>,
    pub grant_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Longest accepted wait period.
const MAX_WAIT_DAYS: i64 = 365;

/// In-memory ledger of emergency contacts.
#[derive(Debug, Default)]
pub struct EmergencyLedger {
    contacts: BTreeMap<Uuid, EmergencyContact>,
}

impl EmergencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trusted contact. The wait period must be between one day
    /// and [`MAX_WAIT_DAYS`]; anything else would defeat or break the wait
    /// clock and is a caller error.
    pub fn add_contact(
        &mut self,
        name: impl Into<String>,
        contact_ref: impl Into<String>,
        wait_days: i64,
    ) -> Result<EmergencyContact> {
        if !(1..=MAX_WAIT_DAYS).contains(&wait_days) {
            return Err(VaultError::ContractViolation(format!(
                "wait period must be 1-{MAX_WAIT_DAYS} days, got {wait_days}"
            )));
        }
        let contact = EmergencyContact {
            id: Uuid::new_v4(),
            name: name.into(),
            contact_ref: contact_ref.into(),
            wait_days,
            status: EmergencyStatus::Pending,
            request_date: None,
            grant_date: None,
            created_at: Utc::now(),
        };
        self.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    /// Administrative promotion of an invited contact. Returns false if the
    /// contact was not pending.
    pub fn activate(&mut self, id: &Uuid) -> Result<bool> {
        let contact = self.get_mut(id)?;
        if contact.status != EmergencyStatus::Pending {
            return Ok(false);
        }
        contact.status = EmergencyStatus::Active;
        Ok(true)
    }

    /// A contact requests access, starting the wait clock. Only valid from
    /// `Active`; anything else is a no-op returning false.
    pub fn request_access(&mut self, id: &Uuid) -> Result<bool> {
        let contact = self.get_mut(id)?;
        if contact.status != EmergencyStatus::Active {
            return Ok(false);
        }
        contact.status = EmergencyStatus::Requested;
        contact.request_date = Some(Utc::now());
        Ok(true)
    }

    /// Owner approves an outstanding request. No-op unless `Requested`.
    pub fn approve_access(&mut self, id: &Uuid) -> Result<bool> {
        let contact = self.get_mut(id)?;
        if contact.status != EmergencyStatus::Requested {
            return Ok(false);
        }
        contact.status = EmergencyStatus::Granted;
        contact.grant_date = Some(Utc::now());
        Ok(true)
    }

    /// Owner denies an outstanding request. No-op unless `Requested`.
    /// A denial before the wait elapses takes precedence over auto-grant.
    pub fn deny_access(&mut self, id: &Uuid) -> Result<bool> {
        let contact = self.get_mut(id)?;
        if contact.status != EmergencyStatus::Requested {
            return Ok(false);
        }
        contact.status = EmergencyStatus::Denied;
        Ok(true)
    }

    /// Auto-grant every requested contact whose wait period has elapsed by
    /// `now`. Contacts no longer in `Requested` state are skipped. Returns
    /// the contacts granted by this pass. Intended to run periodically.
    pub fn check_pending_requests(&mut self, now: DateTime<Utc>) -> Vec<EmergencyContact> {
        let mut granted = Vec::new();
        for contact in self.contacts.values_mut() {
            if contact.status != EmergencyStatus::Requested {
                continue;
            }
            let Some(requested_at) = contact.request_date else {
                continue;
            };
            if now - requested_at >= Duration::days(contact.wait_days) {
                contact.status = EmergencyStatus::Granted;
                contact.grant_date = Some(now);
                info!(contact = %contact.name, "emergency access auto-granted after wait period");
                granted.push(contact.clone());
            }
        }
        granted
    }

    pub fn get(&self, id: &Uuid) -> Option<&EmergencyContact> {
        self.contacts.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmergencyContact> {
        self.contacts.values()
    }

    fn get_mut(&mut self, id: &Uuid) -> Result<&mut EmergencyContact> {
        self.contacts
            .get_mut(id)
            .ok_or_else(|| VaultError::ItemNotFound(id.to_string()))
    }
}

//! Common imports shared across modules.

pub use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use chrono::{DateTime, Duration, Utc};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

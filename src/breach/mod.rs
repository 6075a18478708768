//! k-anonymity breach index client.
//!
//! A secret is hashed locally and only the first five hex characters of the
//! digest ever leave the process. The index answers with every known
//! `SUFFIX:COUNT` pair sharing that prefix, and the exact match is found by
//! scanning locally. Breach checking is advisory: any network or protocol
//! failure degrades to "not compromised" with a logged diagnostic rather
//! than blocking the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::error::{Result, VaultError};
use crate::types::*;

/// Hex length of the hash prefix sent to the index.
const PREFIX_LEN: usize = 5;

/// Result of a breach lookup for one secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreachStatus {
    pub compromised: bool,
    /// Number of breach corpus occurrences (0 when not found).
    pub count: u64,
    pub checked_at: DateTime<Utc>,
}

impl BreachStatus {
    fn clear() -> Self {
        Self {
            compromised: false,
            count: 0,
            checked_at: Utc::now(),
        }
    }
}

/// A remote hash-range index queried by 5-character prefix.
#[async_trait]
pub trait RangeIndex: Send + Sync {
    /// Fetch the newline-delimited `SUFFIX:COUNT` body for a prefix.
    async fn lookup(&self, prefix: &str) -> Result<String>;
}

/// HTTP range-index backend (`GET {base}/range/{prefix}`).
pub struct HttpRangeIndex {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRangeIndex {
    pub fn new(base_url: impl Into<String>, request_timeout: StdDuration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("cube-vault/{}", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .connect_timeout(StdDuration::from_secs(10))
            .build()
            .map_err(|e| VaultError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RangeIndex for HttpRangeIndex {
    async fn lookup(&self, prefix: &str) -> Result<String> {
        let url = format!("{}/range/{}", self.base_url, prefix);
        let response = self
            .http
            .get(&url)
            // Ask the index to pad responses against traffic analysis.
            .header("Add-Padding", "true")
            .send()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VaultError::Network(format!(
                "range query returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| VaultError::Network(e.to_string()))
    }
}

/// Client implementing the k-anonymity protocol with a response cache.
pub struct BreachClient {
    index: Arc<dyn RangeIndex>,
    cache: Mutex<HashMap<String, BreachStatus>>,
    cache_ttl: Duration,
}

impl BreachClient {
    pub fn new(index: Arc<dyn RangeIndex>, cache_ttl_hours: i64) -> Self {
        Self {
            index,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: Duration::hours(cache_ttl_hours),
        }
    }

    /// Check a plaintext secret against the breach corpus.
    ///
    /// Fails open: a failed round trip yields a clear status and a warning
    /// log entry. The failure result is not cached so the next check retries.
    pub async fn check(&self, secret: &str) -> BreachStatus {
        let digest = hex::encode_upper(Sha1::digest(secret.as_bytes()));
        let (prefix, suffix) = digest.split_at(PREFIX_LEN);
        let cache_key = format!("{prefix}:{suffix}");

        if let Some(cached) = self.cached(&cache_key) {
            return cached;
        }

        let body = match self.index.lookup(prefix).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "breach range query failed, treating secret as not compromised");
                return BreachStatus::clear();
            }
        };

        let status = scan_range(&body, suffix);
        debug!(compromised = status.compromised, "breach check completed");
        self.cache
            .lock()
            .expect("breach cache poisoned")
            .insert(cache_key, status.clone());
        status
    }

    fn cached(&self, key: &str) -> Option<BreachStatus> {
        let cache = self.cache.lock().expect("breach cache poisoned");
        cache
            .get(key)
            .filter(|status| Utc::now() - status.checked_at < self.cache_ttl)
            .cloned()
    }
}

/// Scan a `SUFFIX:COUNT` response body for an exact suffix match.
fn scan_range(body: &str, suffix: &str) -> BreachStatus {
    for line in body.lines() {
        let Some((candidate, count)) = line.trim().split_once(':') else {
            continue;
        };
        if candidate.eq_ignore_ascii_case(suffix) {
            return BreachStatus {
                compromised: true,
                count: count.trim().parse().unwrap_or(0),
                checked_at: Utc::now(),
            };
        }
    }
    BreachStatus::clear()
}

//! Security posture scoring.
//!
//! Derived data, recomputed on demand from the unlocked item set and never
//! persisted as a source of truth.

use crate::item::Login;
use crate::types::*;

/// Strength scores below this count as weak.
pub const WEAK_THRESHOLD: u8 = 50;

/// Secrets too common to ever be acceptable.
const DENY_LIST: &[&str] = &[
    "password", "passwort", "123456", "1234567", "12345678", "123456789", "qwerty", "abc123",
    "letmein", "111111", "iloveyou", "admin", "welcome", "monkey", "dragon", "sunshine",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    WeakPassword,
    ReusedPassword,
    CompromisedPassword,
    OldPassword,
    MissingTwoFactor,
}

/// One actionable finding about a login item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRecommendation {
    pub item_id: Uuid,
    pub item_title: String,
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub description: String,
}

/// Aggregate security posture of the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    /// 0–100. Defined as 100 for a vault without logins (vacuous truth).
    pub overall: u8,
    pub weak: usize,
    pub reused: usize,
    pub compromised: usize,
    pub old: usize,
    pub missing_two_factor: usize,
    /// Sorted critical > high > medium > low.
    pub recommendations: Vec<SecurityRecommendation>,
    pub calculated_at: DateTime<Utc>,
}

/// Score a single secret 0–100 from length, class variety, and penalties.
pub fn strength_score(secret: &str) -> u8 {
    if secret.is_empty() {
        return 0;
    }

    let mut score: i32 = 0;
    let len = secret.chars().count();
    if len >= 8 {
        score += 15;
    }
    if len >= 12 {
        score += 15;
    }
    if len >= 16 {
        score += 10;
    }
    if len >= 20 {
        score += 10;
    }

    let has_lower = secret.chars().any(|c| c.is_lowercase());
    let has_upper = secret.chars().any(|c| c.is_uppercase());
    let has_digit = secret.chars().any(|c| c.is_ascii_digit());
    let has_symbol = secret.chars().any(|c| !c.is_alphanumeric());

    if has_lower {
        score += 10;
    }
    if has_upper {
        score += 10;
    }
    if has_digit {
        score += 10;
    }
    // Symbols are the rarest class in practice, weight them highest.
    if has_symbol {
        score += 20;
    }

    if has_repeated_run(secret, 3) {
        score -= 15;
    }

    let class_count = [has_lower, has_upper, has_digit, has_symbol]
        .iter()
        .filter(|&&present| present)
        .count();
    if class_count == 1 {
        score -= 20;
    }

    if DENY_LIST.contains(&secret.to_lowercase().as_str()) {
        score -= 50;
    }

    score.clamp(0, 100) as u8
}

fn has_repeated_run(secret: &str, run_len: usize) -> bool {
    let chars: Vec<char> = secret.chars().collect();
    chars
        .windows(run_len)
        .any(|window| window.iter().all(|c| *c == window[0]))
}

/// Assess every login and derive the aggregate report.
pub fn assess(logins: &[&Login], max_age_days: i64, now: DateTime<Utc>) -> SecurityReport {
    let mut report = SecurityReport {
        overall: 100,
        weak: 0,
        reused: 0,
        compromised: 0,
        old: 0,
        missing_two_factor: 0,
        recommendations: Vec::new(),
        calculated_at: now,
    };

    if logins.is_empty() {
        return report;
    }

    // Every occurrence of a multiply-used secret counts, matching the
    // reference weighting (see DESIGN.md).
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for login in logins {
        *frequency.entry(login.secret.as_str()).or_default() += 1;
    }

    for login in logins {
        let meta = &login.meta;

        if strength_score(&login.secret) < WEAK_THRESHOLD {
            report.weak += 1;
            report.recommendations.push(SecurityRecommendation {
                item_id: meta.id,
                item_title: meta.title.clone(),
                kind: RecommendationKind::WeakPassword,
                priority: Priority::Medium,
                description: "Password is weak. Generate a longer password with mixed character classes.".into(),
            });
        }

        if frequency.get(login.secret.as_str()).copied().unwrap_or(0) > 1 {
            report.reused += 1;
            report.recommendations.push(SecurityRecommendation {
                item_id: meta.id,
                item_title: meta.title.clone(),
                kind: RecommendationKind::ReusedPassword,
                priority: Priority::High,
                description: "Password is reused by another item. Use a unique password per site.".into(),
            });
        }

        if login.compromised {
            report.compromised += 1;
            report.recommendations.push(SecurityRecommendation {
                item_id: meta.id,
                item_title: meta.title.clone(),
                kind: RecommendationKind::CompromisedPassword,
                priority: Priority::Critical,
                description: "Password appeared in a data breach. Change it immediately.".into(),
            });
        }

        if now - meta.updated_at >= Duration::days(max_age_days) {
            report.old += 1;
            report.recommendations.push(SecurityRecommendation {
                item_id: meta.id,
                item_title: meta.title.clone(),
                kind: RecommendationKind::OldPassword,
                priority: Priority::Low,
                description: format!(
                    "Password has not changed in over {max_age_days} days. Consider rotating it."
                ),
            });
        }

        if login.otp_seed.is_none() && login.passkey.is_none() {
            report.missing_two_factor += 1;
            report.recommendations.push(SecurityRecommendation {
                item_id: meta.id,
                item_title: meta.title.clone(),
                kind: RecommendationKind::MissingTwoFactor,
                priority: Priority::Medium,
                description: "No second factor configured. Add a one-time-password seed or a passkey.".into(),
            });
        }
    }

    report
        .recommendations
        .sort_by(|a, b| a.priority.cmp(&b.priority));

    let issues =
        report.weak + report.reused + report.compromised + report.old + report.missing_two_factor;
    let ratio = issues as f64 / (5.0 * logins.len() as f64);
    report.overall = (100.0 - ratio * 100.0).round().clamp(0.0, 100.0) as u8;

    report
}

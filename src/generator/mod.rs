//! Credential generation: passwords, passphrases, and usernames.
//!
//! All draws come from the OS entropy source. Generated passwords are
//! guaranteed to contain at least the configured minimum of every enabled
//! character class and to be exactly the requested length.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, VaultError};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{}|;:,.<>?";

/// Characters easily confused with one another (i/l/1, o/0, ...).
const SIMILAR: &str = "il1Lo0O";
/// Symbols that are error-prone to transcribe or quote.
const AMBIGUOUS: &str = "{}[]()|;:,.<>";

/// Short built-in word list for passphrase and username generation.
const WORDS: &[&str] = &[
    "alpha", "amber", "anchor", "apex", "atlas", "aurora", "basalt", "beacon", "birch", "bolt",
    "breeze", "canyon", "cedar", "cipher", "cobalt", "comet", "coral", "crane", "cyber", "data",
    "delta", "drift", "eagle", "ember", "falcon", "fern", "flint", "forge", "frost", "ghost",
    "glade", "granite", "hawk", "helix", "iron", "jade", "knight", "lagoon", "lunar", "maple",
    "meadow", "mesa", "nebula", "north", "onyx", "orbit", "otter", "pine", "prism", "quartz",
    "raven", "reef", "ridge", "river", "saber", "sage", "slate", "solar", "spruce", "summit",
    "tundra", "vector", "willow", "zephyr",
];

/// Rules driving password generation.
#[derive(Debug, Clone)]
pub struct PasswordRules {
    pub length: usize,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
    pub exclude_ambiguous: bool,
    pub exclude_similar: bool,
    /// Minimum count per enabled class. Ignored for disabled classes.
    pub min_lowercase: usize,
    pub min_uppercase: usize,
    pub min_digits: usize,
    pub min_symbols: usize,
}

impl Default for PasswordRules {
    fn default() -> Self {
        Self {
            length: 16,
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
            exclude_ambiguous: false,
            exclude_similar: false,
            min_lowercase: 1,
            min_uppercase: 1,
            min_digits: 1,
            min_symbols: 1,
        }
    }
}

fn build_pool(source: &str, rules: &PasswordRules, strip_ambiguous: bool) -> Vec<char> {
    source
        .chars()
        .filter(|c| !(rules.exclude_similar && SIMILAR.contains(*c)))
        .filter(|c| !(strip_ambiguous && rules.exclude_ambiguous && AMBIGUOUS.contains(*c)))
        .collect()
}

/// Generate a password satisfying `rules`.
///
/// Draws the minimum required characters from each enabled class, fills the
/// remaining slots uniformly from the combined pool, then shuffles. If no
/// class is enabled the lowercase pool is used as a fallback. Minimums
/// exceeding the requested length are a caller error, not a truncation.
pub fn generate_password(rules: &PasswordRules) -> Result<String> {
    if rules.length == 0 {
        return Err(VaultError::ContractViolation(
            "password length must be at least 1".into(),
        ));
    }

    let mut classes: Vec<(Vec<char>, usize)> = Vec::new();
    if rules.lowercase {
        classes.push((build_pool(LOWERCASE, rules, false), rules.min_lowercase));
    }
    if rules.uppercase {
        classes.push((build_pool(UPPERCASE, rules, false), rules.min_uppercase));
    }
    if rules.digits {
        classes.push((build_pool(DIGITS, rules, false), rules.min_digits));
    }
    if rules.symbols {
        classes.push((build_pool(SYMBOLS, rules, true), rules.min_symbols));
    }

    // Disabling every class falls back to lowercase rather than failing.
    if classes.is_empty() {
        classes.push((build_pool(LOWERCASE, rules, false), 1));
    }

    if classes.iter().any(|(pool, _)| pool.is_empty()) {
        return Err(VaultError::ContractViolation(
            "exclusion flags emptied a character class".into(),
        ));
    }

    let total_min: usize = classes.iter().map(|(_, min)| min).sum();
    if total_min > rules.length {
        return Err(VaultError::ContractViolation(format!(
            "minimum class counts ({total_min}) exceed requested length ({})",
            rules.length
        )));
    }

    let mut rng = OsRng;
    let mut chars: Vec<char> = Vec::with_capacity(rules.length);

    for (pool, min) in &classes {
        for _ in 0..*min {
            chars.push(pool[rng.gen_range(0..pool.len())]);
        }
    }

    let combined: Vec<char> = classes.iter().flat_map(|(pool, _)| pool.clone()).collect();
    while chars.len() < rules.length {
        chars.push(combined[rng.gen_range(0..combined.len())]);
    }

    chars.shuffle(&mut rng);
    Ok(chars.into_iter().collect())
}

/// Generate a passphrase of `words` words joined by `separator`.
/// Words may repeat; there is no uniqueness guarantee.
pub fn generate_passphrase(words: usize, separator: &str) -> Result<String> {
    if words == 0 {
        return Err(VaultError::ContractViolation(
            "passphrase must contain at least one word".into(),
        ));
    }

    let mut rng = OsRng;
    let picked: Vec<&str> = (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect();
    Ok(picked.join(separator))
}

/// Generate a pronounceable username of the form `word-word123`.
pub fn generate_username(separator: &str, include_number: bool) -> String {
    let mut rng = OsRng;
    let first = WORDS[rng.gen_range(0..WORDS.len())];
    let second = WORDS[rng.gen_range(0..WORDS.len())];
    if include_number {
        format!("{first}{separator}{second}{}", rng.gen_range(0..1000u16))
    } else {
        format!("{first}{separator}{second}")
    }
}

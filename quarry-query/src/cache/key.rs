//! Cache key derivation and glob patterns.
//!
//! Derived keys look like `{prefix}query:{hash}` where `hash` is the leading
//! hex digits of `SHA-256(sql ++ json(bindings))`. Equal statements with equal
//! bindings always share a key; any difference in text or values changes it.

use std::fmt::{self, Display};
use std::sync::OnceLock;

use regex_lite::Regex;
use sha2::{Digest, Sha256};

use crate::value::SqlValue;

/// Derive the cache key for a compiled statement.
pub fn generate_key(prefix: &str, sql: &str, bindings: &[SqlValue], hash_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    // A Vec<SqlValue> always serializes; the fallback keeps the signature total.
    let encoded = serde_json::to_string(bindings).unwrap_or_default();
    hasher.update(encoded.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let len = hash_len.clamp(8, digest.len());
    format!("{}query:{}", prefix, &digest[..len])
}

/// Tables a statement reads or writes, lowercased and deduplicated in order
/// of appearance.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    static TABLE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = TABLE_RE
        .get_or_init(|| {
            Regex::new(r#"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+([`"\[]?[A-Za-z_][\w$]*[`"\]]?(?:\.[`"\[]?[A-Za-z_][\w$]*[`"\]]?)*)"#).ok()
        })
        .as_ref()
    else {
        return Vec::new();
    };

    let mut tables: Vec<String> = Vec::new();
    for caps in re.captures_iter(sql) {
        let Some(m) = caps.get(1) else { continue };
        let name = m
            .as_str()
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
            .to_lowercase();
        if !name.is_empty() && !tables.contains(&name) {
            tables.push(name);
        }
    }
    tables
}

/// A glob pattern over cache keys. `*` matches any run of characters and `?`
/// exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    pattern: String,
}

impl KeyPattern {
    /// Create a new pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Every key under `prefix`.
    pub fn all(prefix: &str) -> Self {
        Self::new(format!("{}*", prefix))
    }

    /// Keys under `prefix` mentioning `name` anywhere.
    pub fn mentioning(prefix: &str, name: &str) -> Self {
        Self::new(format!("{}*{}*", prefix, name))
    }

    /// Get the pattern string.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Check if a key matches this pattern.
    pub fn matches(&self, key: &str) -> bool {
        glob_match(&self.pattern, key)
    }
}

impl Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let mut pattern_chars = pattern.chars();
    let mut text_chars = text.chars();

    while let Some(p) = pattern_chars.next() {
        match p {
            '*' => {
                let rest = pattern_chars.as_str();
                if rest.is_empty() {
                    return true;
                }
                let remaining = text_chars.as_str();
                return remaining
                    .char_indices()
                    .map(|(i, _)| i)
                    .chain(std::iter::once(remaining.len()))
                    .any(|i| glob_match(rest, &remaining[i..]));
            }
            '?' => {
                if text_chars.next().is_none() {
                    return false;
                }
            }
            c => match text_chars.next() {
                Some(t) if t == c => {}
                _ => return false,
            },
        }
    }

    text_chars.next().is_none()
}

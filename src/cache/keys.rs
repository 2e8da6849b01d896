//! Key composition and parsing
//!
//! Fully-qualified keys follow `namespace:[prefix:]base`. Call-site prefixes
//! and `set_prefix` chain calls stack left-to-right with the same separator.

use crate::constants::keys::{KEY_SEPARATOR, SCAN_WILDCARD};
use serde::{Deserialize, Serialize};

/// Prepend `prefix` to `key`; an empty prefix leaves the key unchanged
pub fn prepend_prefix(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{KEY_SEPARATOR}{key}")
    }
}

/// Qualify an already-prefixed key with the namespace
pub fn qualify(namespace: &str, key: &str) -> String {
    format!("{namespace}{KEY_SEPARATOR}{key}")
}

/// Build `namespace:[prefix:]base`
pub fn build_key(namespace: &str, prefix: Option<&str>, base: &str) -> String {
    qualify(namespace, &prepend_prefix(prefix.unwrap_or_default(), base))
}

/// SCAN match pattern for every key directly under `prefix`
///
/// One trailing wildcard on the caller's prefix is dropped first.
pub fn scan_pattern(namespace: &str, prefix: &str) -> String {
    let prefix = prefix.strip_suffix(SCAN_WILDCARD).unwrap_or(prefix);
    format!("{namespace}{KEY_SEPARATOR}{prefix}{KEY_SEPARATOR}{SCAN_WILDCARD}")
}

/// Structured view of a scanned key
///
/// The last segment is the key, the one before it the prefix, and whatever
/// remains is the namespace. Keys with more than three segments therefore
/// fold the extra leading segments into `namespace`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyer {
    pub namespace: String,
    pub prefix: String,
    pub key: String,
}

impl Keyer {
    pub fn parse(full_key: &str) -> Self {
        let mut segments = full_key.rsplitn(3, KEY_SEPARATOR);
        let key = segments.next().unwrap_or_default().to_string();
        let prefix = segments.next().unwrap_or_default().to_string();
        let namespace = segments.next().unwrap_or_default().to_string();
        Self {
            namespace,
            prefix,
            key,
        }
    }

    /// Reassemble the fully-qualified key
    pub fn full_key(&self) -> String {
        [self.namespace.as_str(), self.prefix.as_str(), self.key.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR)
    }
}

/// Redis-style glob match supporting `*` and `?`
pub(crate) fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, c));
            p += 1;
        } else if let Some((star_p, star_c)) = star {
            p = star_p + 1;
            c = star_c + 1;
            star = Some((star_p, star_c + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&ch| ch == '*')
}

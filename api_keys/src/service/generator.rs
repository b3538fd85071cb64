//! API key generation and hashing.
//!
//! Keys are bearer credentials: a fixed prefix followed by random alphanumerics
//! drawn from the operating system's CSPRNG. Only the SHA-256 hex digest of a
//! key is ever persisted.

use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use sha2::{Digest, Sha256};

pub const DEFAULT_KEY_LENGTH: usize = 32;
pub const MIN_KEY_LENGTH: usize = 16;
pub const MAX_KEY_LENGTH: usize = 64;

/// Length of a hex-encoded SHA-256 digest.
pub const KEY_HASH_LENGTH: usize = 64;

/// Random characters kept after the prefix in a key preview.
const PREVIEW_CHARS: usize = 4;

#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
    default_length: usize,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            default_length: DEFAULT_KEY_LENGTH,
        }
    }

    /// Length used when a request does not ask for one.
    pub fn with_default_length(mut self, length: usize) -> Self {
        self.default_length = normalize_length(Some(length as i64));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generates `<prefix><random alphanumerics>`.
    ///
    /// Lengths outside `[MIN_KEY_LENGTH, MAX_KEY_LENGTH]` fall back to the default.
    pub fn generate(&self, length: Option<i64>) -> String {
        let length = match length {
            Some(_) => normalize_length(length),
            None => self.default_length,
        };
        let suffix: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        let key = format!("{}{}", self.prefix, suffix);

        log::debug!("Generated API key {}", self.preview(&key));
        key
    }

    /// The part of a key that is safe to log and to store next to its hash.
    pub fn preview(&self, key: &str) -> String {
        let visible = match key.strip_prefix(self.prefix.as_str()) {
            Some(_) => self.prefix.chars().count() + PREVIEW_CHARS,
            None => PREVIEW_CHARS,
        };
        let preview: String = key.chars().take(visible).collect();
        format!("{}...", preview)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new("LUNAR_")
    }
}

pub fn normalize_length(length: Option<i64>) -> usize {
    match length {
        Some(length) if (MIN_KEY_LENGTH as i64..=MAX_KEY_LENGTH as i64).contains(&length) => {
            length as usize
        }
        _ => DEFAULT_KEY_LENGTH,
    }
}

/// SHA-256 over the UTF-8 bytes of `key`, hex encoded.
pub fn key_to_hash(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Whether `value` already looks like a key hash rather than a plaintext key.
pub fn is_key_hash(value: &str) -> bool {
    value.len() == KEY_HASH_LENGTH && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Hash in a form short enough for log lines.
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

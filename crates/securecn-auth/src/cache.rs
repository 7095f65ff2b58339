//! Per-signer cache of the derived signing key.
//!
//! The key chain depends only on the secret, the UTC date, and the credential
//! scope, so the derived key can be reused for every request signed on the same
//! date. The cache holds a single slot and is replaced when the date (or scope)
//! changes. Signatures are identical with or without it.

use parking_lot::Mutex;

/// Length of an HMAC-SHA256 output.
pub const SIGNING_KEY_LEN: usize = 32;

#[derive(Debug)]
struct CachedKey {
    short_date: String,
    scope: String,
    key: [u8; SIGNING_KEY_LEN],
}

/// Single-slot signing key cache keyed by `(short date, scope)`.
#[derive(Debug, Default)]
pub struct SigningKeyCache {
    slot: Mutex<Option<CachedKey>>,
}

impl SigningKeyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key for `(short_date, scope)`, deriving and storing it on a miss.
    pub fn get_or_derive(
        &self,
        short_date: &str,
        scope: &str,
        derive: impl FnOnce() -> [u8; SIGNING_KEY_LEN],
    ) -> [u8; SIGNING_KEY_LEN] {
        let mut slot = self.slot.lock();
        if let Some(cached) = slot.as_ref() {
            if cached.short_date == short_date && cached.scope == scope {
                return cached.key;
            }
        }

        let key = derive();
        *slot = Some(CachedKey {
            short_date: short_date.to_owned(),
            scope: scope.to_owned(),
            key,
        });
        key
    }

    /// Drop the cached key.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// The date of the currently cached key, if any.
    #[must_use]
    pub fn cached_date(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|c| c.short_date.clone())
    }
}

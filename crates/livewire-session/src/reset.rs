//! Password-reset codes.
//!
//! A code is mailed to the account owner and must be redeemed before it
//! expires. Expired entries are swept lazily, on the next read.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::SessionError;

/// A pending reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetEntry {
    pub code: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetEntry {
    /// Returns `true` if the entry is void at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Process-wide map of reset code to [`ResetEntry`].
#[derive(Debug)]
pub struct ResetCodeRegistry {
    ttl: Duration,
    entries: RwLock<HashMap<String, ResetEntry>>,
}

impl ResetCodeRegistry {
    /// Default lifetime of a code.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60);

    /// Creates an empty registry whose codes live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Generates a code for `email`, stores it, and returns the entry.
    pub fn issue(&self, email: &str) -> ResetEntry {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = ResetEntry {
            code: generate_reset_code(),
            email: email.to_string(),
            expires_at,
        };
        self.insert(entry.clone());
        entry
    }

    /// Stores an entry as is, replacing any entry with the same code.
    pub fn insert(&self, entry: ResetEntry) {
        self.entries.write().insert(entry.code.clone(), entry);
    }

    /// Sweeps expired entries, then looks up `code`.
    ///
    /// # Errors
    /// [`SessionError::InvalidCode`] if the code is unknown or expired.
    pub fn read(&self, code: &str) -> Result<ResetEntry, SessionError> {
        let now = Utc::now();
        let mut entries = self.entries.write();

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, "expired reset codes swept");
        }

        entries.get(code).cloned().ok_or(SessionError::InvalidCode)
    }

    /// Removes `code`. Removing an absent code is not an error.
    pub fn remove(&self, code: &str) {
        self.entries.write().remove(code);
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ResetCodeRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

/// A short code: the last 12 hex characters of a random UUID.
pub fn generate_reset_code() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    uuid[uuid.len() - 12..].to_string()
}

//! Shared bearer-token state for inbound credential checks
//!
//! Holds the current token and the one it replaced. The replaced token stays
//! valid until a grace deadline fixed at the moment of rotation, so callers
//! that picked up the old token just before a refresh are not rejected.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// How long a superseded token keeps being accepted after rotation
pub fn grace_window() -> TimeDelta {
    TimeDelta::minutes(5)
}

/// Consistent copy of the token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub current: String,
    pub previous: String,
    pub previous_deadline: DateTime<Utc>,
}

impl CredentialSnapshot {
    /// Whether `token` is accepted at instant `now`
    pub fn accepts(&self, token: &str, now: DateTime<Utc>) -> bool {
        token == self.current || (token == self.previous && now < self.previous_deadline)
    }
}

/// Token pair guarded by a single lock.
///
/// Written only by the rotation task; read by every request carrying a token.
/// No I/O happens while the lock is held.
#[derive(Debug)]
pub struct CredentialStore {
    inner: Mutex<CredentialSnapshot>,
    grace: TimeDelta,
}

impl CredentialStore {
    /// Store seeded with its first token; there is no real previous token yet
    pub fn new(token: String, now: DateTime<Utc>) -> Self {
        Self::with_grace(token, now, grace_window())
    }

    pub fn with_grace(token: String, now: DateTime<Utc>, grace: TimeDelta) -> Self {
        Self {
            inner: Mutex::new(CredentialSnapshot {
                previous: token.clone(),
                current: token,
                previous_deadline: now,
            }),
            grace,
        }
    }

    pub fn read(&self) -> CredentialSnapshot {
        self.inner.lock().clone()
    }

    pub fn rotate(&self, token: String) {
        self.rotate_at(token, Utc::now());
    }

    /// Make `token` current and keep the old one valid until `now + grace`
    pub fn rotate_at(&self, token: String, now: DateTime<Utc>) {
        let mut pair = self.inner.lock();
        pair.previous = std::mem::replace(&mut pair.current, token);
        pair.previous_deadline = now + self.grace;
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.is_valid_at(token, Utc::now())
    }

    pub fn is_valid_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.inner.lock().accepts(token, now)
    }
}

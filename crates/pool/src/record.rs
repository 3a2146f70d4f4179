//! Identity records and priority classes.

use std::time::{Duration, Instant};

/// Deactivation threshold: the third attributable failure deactivates a record.
pub const FAILURE_THRESHOLD: u32 = 3;

/// A cached access credential is usable only if it has more than this much
/// validity left.
pub const CREDENTIAL_MIN_VALIDITY: Duration = Duration::from_secs(120);

/// Selection preference, ascending: anonymous identities are tried first to
/// conserve personal quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Anonymous = 1,
    Shared = 2,
    Personal = 3,
}

impl Priority {
    /// All classes in ascending selection order.
    pub const ORDER: [Priority; 3] = [Priority::Anonymous, Priority::Shared, Priority::Personal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Anonymous => "anonymous",
            Priority::Shared => "shared",
            Priority::Personal => "personal",
        }
    }
}

/// One refresh-token identity tracked by the pool.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub refresh_token: String,
    pub priority: Priority,
    pub display_name: String,
    pub last_used_at: Option<Instant>,
    pub failure_count: u32,
    pub active: bool,
    pub cached_access_credential: Option<String>,
    pub cached_access_expiry: Option<Instant>,
}

impl IdentityRecord {
    pub fn new(refresh_token: String, priority: Priority, display_name: String) -> Self {
        Self {
            refresh_token,
            priority,
            display_name,
            last_used_at: None,
            failure_count: 0,
            active: true,
            cached_access_credential: None,
            cached_access_expiry: None,
        }
    }

    /// A record is selectable iff it is active and below the failure threshold.
    /// The two conditions are kept in lockstep by `mark_failure`/`recover`.
    pub fn selectable(&self) -> bool {
        self.active && self.failure_count < FAILURE_THRESHOLD
    }

    /// Whether the cached credential, if any, still has more than
    /// [`CREDENTIAL_MIN_VALIDITY`] left (strictly greater than).
    pub fn has_usable_credential(&self, now: Instant) -> bool {
        match (&self.cached_access_credential, self.cached_access_expiry) {
            (Some(_), Some(expiry)) => expiry.saturating_duration_since(now) > CREDENTIAL_MIN_VALIDITY,
            _ => false,
        }
    }

    pub fn credential_expires_in(&self, now: Instant) -> Option<Duration> {
        self.cached_access_expiry.map(|e| e.saturating_duration_since(now))
    }
}

/// A snapshot of one identity handed back to a caller. Carries the record's
/// usable access credential, if the caller already had one cached.
#[derive(Debug, Clone)]
pub struct SelectedIdentity {
    pub refresh_token: String,
    pub display_name: String,
    pub priority: Priority,
    pub cached_access_credential: Option<String>,
    pub cached_access_expiry: Option<Instant>,
}

impl SelectedIdentity {
    /// Mirrors [`IdentityRecord::has_usable_credential`] on the snapshot.
    pub fn has_usable_credential(&self, now: Instant) -> bool {
        match (&self.cached_access_credential, self.cached_access_expiry) {
            (Some(_), Some(expiry)) => expiry.saturating_duration_since(now) > CREDENTIAL_MIN_VALIDITY,
            _ => false,
        }
    }
}

impl From<&IdentityRecord> for SelectedIdentity {
    fn from(r: &IdentityRecord) -> Self {
        Self {
            refresh_token: r.refresh_token.clone(),
            display_name: r.display_name.clone(),
            priority: r.priority,
            cached_access_credential: r.cached_access_credential.clone(),
            cached_access_expiry: r.cached_access_expiry,
        }
    }
}

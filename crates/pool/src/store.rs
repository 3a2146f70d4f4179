//! The Identity Store: a single-mutex collection of refresh-token identities.
//!
//! All mutation is mediated by one `std::sync::Mutex` to guarantee
//! linearizability. Every operation here is synchronous and O(k) in the
//! size of one priority class; no network I/O ever runs while the lock is
//! held. Callers cross the lock boundary to validate or refresh a cached
//! credential outside the lock, then write the result back in a second,
//! separate critical section.

use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::record::{IdentityRecord, Priority, SelectedIdentity};

/// Read-only projection of pool contents.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub anonymous: usize,
    pub shared: usize,
    pub personal: usize,
}

/// Per-identity status for the health report.
#[derive(Debug, Clone)]
pub struct IdentityHealth {
    pub display_name: String,
    pub priority: Priority,
    pub active: bool,
    pub healthy: bool,
    pub failure_count: u32,
    pub last_used_at: Option<Instant>,
    pub has_cached_credential: bool,
    pub credential_expires_in_seconds: Option<u64>,
}

/// Aggregate health report.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub identities: Vec<IdentityHealth>,
    pub stats: PoolStats,
}

#[derive(Default)]
struct StoreInner {
    records: Vec<IdentityRecord>,
    cursors: [usize; 3],
}

impl StoreInner {
    fn cursor_index(priority: Priority) -> usize {
        match priority {
            Priority::Anonymous => 0,
            Priority::Shared => 1,
            Priority::Personal => 2,
        }
    }

    fn find(&self, refresh_token: &str) -> Option<usize> {
        self.records.iter().position(|r| r.refresh_token == refresh_token)
    }

    /// Selectable records of one class, in insertion order.
    fn selectable_indices(&self, priority: Priority) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.priority == priority && r.selectable())
            .map(|(i, _)| i)
            .collect()
    }

    /// Core selection logic shared by `next` and `next_excluding`. See
    /// module docs: the cursor advances modulo the *full* selectable set of
    /// the class, whether or not `exclude` removes a candidate from
    /// consideration, so that `next()` and `next_excluding()` share one
    /// coherent cursor space per class.
    fn select(&mut self, exclude: Option<&str>, now: Instant) -> Option<usize> {
        for &priority in Priority::ORDER.iter() {
            let full = self.selectable_indices(priority);
            if full.is_empty() {
                continue;
            }

            let filtered: Vec<usize> = match exclude {
                Some(token) => full
                    .iter()
                    .copied()
                    .filter(|&i| self.records[i].refresh_token != token)
                    .collect(),
                None => full.clone(),
            };

            if filtered.is_empty() {
                // Sole member of this class was excluded; fall through
                // without consuming a cursor tick.
                continue;
            }

            let cursor_slot = Self::cursor_index(priority);
            let idx_in_filtered = self.cursors[cursor_slot] % filtered.len();
            let chosen = filtered[idx_in_filtered];
            self.cursors[cursor_slot] = (self.cursors[cursor_slot] + 1) % full.len();

            self.records[chosen].last_used_at = Some(now);
            return Some(chosen);
        }
        None
    }
}

/// The Identity Store. Cheap to clone via `Arc` at the call site; the store
/// itself owns its lock.
pub struct IdentityStore {
    inner: Mutex<StoreInner>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Idempotent on `refresh_token`: a second `add` with the same token is
    /// a no-op, leaving the store in the state produced by the first call.
    #[instrument(skip(self, refresh_token), fields(priority = ?priority))]
    pub fn add(&self, refresh_token: String, priority: Priority, display_name: String) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.find(&refresh_token).is_some() {
            debug!("identity already present, add is a no-op");
            return;
        }
        inner.records.push(IdentityRecord::new(refresh_token, priority, display_name));
    }

    /// Returns the next selectable identity, honoring priority order and
    /// per-class round robin. `None` iff every class is empty.
    pub fn next(&self) -> Option<SelectedIdentity> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let now = Instant::now();
        let idx = inner.select(None, now)?;
        Some(SelectedIdentity::from(&inner.records[idx]))
    }

    /// Same as [`Self::next`], but skips the record whose `refresh_token`
    /// matches `token`. If a class's only selectable record is the excluded
    /// one, that class is treated as empty for this call.
    pub fn next_excluding(&self, token: &str) -> Option<SelectedIdentity> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let now = Instant::now();
        let idx = inner.select(Some(token), now)?;
        Some(SelectedIdentity::from(&inner.records[idx]))
    }

    /// Increments `failure_count`; deactivates the record once it reaches
    /// [`crate::record::FAILURE_THRESHOLD`]. Returns whether it is now
    /// deactivated. A no-op (returns `false`) if the token is unknown.
    #[instrument(skip(self, refresh_token))]
    pub fn mark_failure(&self, refresh_token: &str) -> bool {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let Some(idx) = inner.find(refresh_token) else {
            warn!("mark_failure on unknown identity");
            return false;
        };
        let record = &mut inner.records[idx];
        record.failure_count += 1;
        if record.failure_count >= crate::record::FAILURE_THRESHOLD {
            record.active = false;
            true
        } else {
            false
        }
    }

    /// Zeroes the failure count and caches the new credential.
    #[instrument(skip(self, refresh_token, credential))]
    pub fn mark_success(&self, refresh_token: &str, credential: String, expiry: Instant) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let Some(idx) = inner.find(refresh_token) else {
            warn!("mark_success on unknown identity");
            return;
        };
        let record = &mut inner.records[idx];
        record.failure_count = 0;
        record.cached_access_credential = Some(credential);
        record.cached_access_expiry = Some(expiry);
    }

    /// Reactivates every deactivated identity. Returns the count resurrected.
    pub fn recover(&self) -> usize {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let mut recovered = 0;
        for record in inner.records.iter_mut() {
            if !record.active {
                record.active = true;
                record.failure_count = 0;
                recovered += 1;
            }
        }
        recovered
    }

    /// Direct lookup by refresh token, bypassing round-robin selection.
    /// Used right after provisioning a brand-new identity, where the
    /// caller wants that exact record rather than whatever the cursor
    /// would hand back next.
    pub fn get(&self, refresh_token: &str) -> Option<SelectedIdentity> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.find(refresh_token).map(|idx| SelectedIdentity::from(&inner.records[idx]))
    }

    /// The record with the greatest `last_used_at`, if any identity has
    /// ever been selected.
    pub fn last_used(&self) -> Option<SelectedIdentity> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .records
            .iter()
            .filter(|r| r.last_used_at.is_some())
            .max_by_key(|r| r.last_used_at)
            .map(SelectedIdentity::from)
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut stats = PoolStats {
            total: inner.records.len(),
            ..Default::default()
        };
        for record in &inner.records {
            if record.selectable() {
                stats.active += 1;
            } else {
                stats.failed += 1;
            }
            match record.priority {
                Priority::Anonymous => stats.anonymous += 1,
                Priority::Shared => stats.shared += 1,
                Priority::Personal => stats.personal += 1,
            }
        }
        stats
    }

    pub fn health_report(&self) -> HealthReport {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let now = Instant::now();
        let identities = inner
            .records
            .iter()
            .map(|r| IdentityHealth {
                display_name: r.display_name.clone(),
                priority: r.priority,
                active: r.active,
                healthy: r.selectable(),
                failure_count: r.failure_count,
                last_used_at: r.last_used_at,
                has_cached_credential: r.has_usable_credential(now),
                credential_expires_in_seconds: r.credential_expires_in(now).map(|d| d.as_secs()),
            })
            .collect();
        drop(inner);
        HealthReport {
            identities,
            stats: self.stats(),
        }
    }
}

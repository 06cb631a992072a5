//! Advisory per-position locks with TTL expiry.
//!
//! Cooperative reservations on shared world positions (chests, furnaces)
//! so that independent agents do not race each other. Nothing is enforced
//! by the world — callers that skip the lock simply risk the race. Holding
//! is scoped: the guard releases on drop, on every exit path, and a crashed
//! holder's entry expires on its own once the TTL lapses.

use crate::geometry::BlockPos;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct LockEntry {
    owner: String,
    acquired_at: DateTime<Utc>,
    ttl: Duration,
}

impl LockEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.acquired_at).num_milliseconds() >= self.ttl.as_millis() as i64
    }
}

type Table = Arc<Mutex<HashMap<BlockPos, LockEntry>>>;

/// The shared advisory lock table.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryLocks {
    table: Table,
}

impl AdvisoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to reserve `pos` for `owner`. Fails if a live reservation by a
    /// different owner exists; an expired one is evicted and taken over.
    pub fn try_acquire(
        &self,
        pos: BlockPos,
        owner: impl Into<String>,
        ttl: Duration,
    ) -> Option<PositionLock> {
        let owner = owner.into();
        let now = Utc::now();
        let mut table = self.table.lock().expect("lock table poisoned");

        match table.get(&pos) {
            Some(entry) if !entry.expired(now) && entry.owner != owner => return None,
            _ => {}
        }

        table.insert(
            pos,
            LockEntry {
                owner: owner.clone(),
                acquired_at: now,
                ttl,
            },
        );
        tracing::debug!(%pos, %owner, ttl_secs = ttl.as_secs(), "advisory lock acquired");

        Some(PositionLock {
            table: Arc::clone(&self.table),
            pos,
            owner,
        })
    }

    /// Current live holder of `pos`, if any.
    pub fn holder(&self, pos: BlockPos) -> Option<String> {
        let table = self.table.lock().expect("lock table poisoned");
        table
            .get(&pos)
            .filter(|e| !e.expired(Utc::now()))
            .map(|e| e.owner.clone())
    }

    /// Drop every expired reservation.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        let mut table = self.table.lock().expect("lock table poisoned");
        table.retain(|_, e| !e.expired(now));
    }

    /// Number of live reservations.
    pub fn live_count(&self) -> usize {
        let now = Utc::now();
        let table = self.table.lock().expect("lock table poisoned");
        table.values().filter(|e| !e.expired(now)).count()
    }
}

/// Scoped hold on one position. Releases on drop.
#[derive(Debug)]
pub struct PositionLock {
    table: Table,
    pos: BlockPos,
    owner: String,
}

impl PositionLock {
    pub fn position(&self) -> BlockPos {
        self.pos
    }
}

impl Drop for PositionLock {
    fn drop(&mut self) {
        if let Ok(mut table) = self.table.lock() {
            // Only release our own entry — it may have expired and been
            // taken over while we held the guard.
            if table.get(&self.pos).is_some_and(|e| e.owner == self.owner) {
                table.remove(&self.pos);
                tracing::debug!(pos = %self.pos, owner = %self.owner, "advisory lock released");
            }
        }
    }
}

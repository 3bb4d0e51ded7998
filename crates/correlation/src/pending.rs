//! Pending-correlation table.
//!
//! The only shared mutable state in the core. Presence of an entry IS the
//! awaiting-camera state; removal IS the terminal transition. Whichever
//! caller removes an entry owns its consolidation, so `take` is the single
//! atomic operation both the response path and the deadline path race on.

use chrono::{DateTime, Utc};
use contracts::{CorrelationId, FusionError, RadarDetection};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// One open correlation awaiting its camera response.
#[derive(Debug)]
pub struct PendingCorrelation {
    /// The radar trigger that opened this correlation
    pub radar: RadarDetection,

    /// When the correlation was opened (wall clock, for eviction ordering)
    pub created_at: DateTime<Utc>,

    /// Monotonic deadline the timer is armed against
    pub deadline: Instant,

    /// Deadline timer handle, set once the timer task is spawned
    pub timer: Option<AbortHandle>,
}

impl PendingCorrelation {
    /// Cancel the deadline timer, if armed.
    ///
    /// The deadline path must NOT call this on the entry it just took: a
    /// task aborting its own handle would cancel its pending handoff. The
    /// timer firing against a removed entry is a no-op regardless,
    /// aborting just saves the wakeup.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Concurrent pending-correlation table keyed by correlation id.
///
/// Sharded locking via DashMap: insert, lookup-and-remove and removal on
/// unrelated ids never contend on a global lock.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<CorrelationId, PendingCorrelation>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open correlations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Open a correlation.
    ///
    /// # Errors
    /// Rejects a correlation id that is already live; the existing entry is
    /// left untouched. A repeat id within the retention window is an
    /// id-generation fault, not a normal condition.
    pub fn insert(
        &self,
        id: CorrelationId,
        pending: PendingCorrelation,
    ) -> Result<(), FusionError> {
        match self.entries.entry(id) {
            Entry::Occupied(occupied) => Err(FusionError::DuplicateCorrelation {
                correlation_id: occupied.key().to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(pending);
                Ok(())
            }
        }
    }

    /// Atomically resolve a correlation: remove and return the entry.
    ///
    /// Exactly one caller gets `Some` per id; everyone else gets `None`.
    pub fn take(&self, id: &CorrelationId) -> Option<PendingCorrelation> {
        self.entries.remove(id).map(|(_, pending)| pending)
    }

    /// Install the deadline timer handle on a live entry.
    ///
    /// Returns false if the entry resolved before the timer was armed; the
    /// caller should abort the orphaned timer.
    pub fn arm_timer(&self, id: &CorrelationId, timer: AbortHandle) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.timer = Some(timer);
                true
            }
            None => false,
        }
    }

    /// Remove and return the oldest open correlation by creation time.
    ///
    /// Scan-then-remove: if the scanned candidate resolves concurrently,
    /// the removal simply misses and the caller retries on the next
    /// overflow. Ties break toward the smaller correlation id so repeated
    /// scans pick a stable victim.
    pub fn evict_oldest(&self) -> Option<(CorrelationId, PendingCorrelation)> {
        let victim = self
            .entries
            .iter()
            .min_by(|a, b| {
                a.value()
                    .created_at
                    .cmp(&b.value().created_at)
                    .then_with(|| a.key().as_str().cmp(b.key().as_str()))
            })
            .map(|entry| entry.key().clone())?;

        self.entries
            .remove(&victim)
            .map(|(id, pending)| (id, pending))
    }
}

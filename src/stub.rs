//! # Stub
//!
//! The zone-local adapter that owns a strong reference to a native
//! object and exposes its interfaces by ordinal (§3, §4.3). A stub
//! tracks, per caller zone, a *shared* count (keeps the object alive)
//! and an *optimistic* count (observes without extending lifetime).
//! When both counts are zero for every caller, the stub is destroyed.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identity::{CallerZone, InterfaceOrdinal, Method, ObjectId};
use crate::interface::MethodTable;

/// The two independent ref-count axes a stub tracks per caller zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefCounts {
    pub shared: u64,
    pub optimistic: u64,
}

impl RefCounts {
    fn is_zero(self) -> bool {
        self.shared == 0 && self.optimistic == 0
    }
}

/// Zone-local adapter receiving RPC calls for one local object.
pub struct Stub {
    object: ObjectId,
    table: MethodTable,
    counts: Mutex<HashMap<CallerZone, RefCounts>>,
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub").field("object", &self.object).finish_non_exhaustive()
    }
}

impl Stub {
    /// Create a stub for `object` exposing the facets in `table`.
    pub fn new(object: ObjectId, table: MethodTable) -> Self {
        Self { object, table, counts: Mutex::new(HashMap::new()) }
    }

    /// The object id this stub answers for.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// `try_cast`: cheap, does not change ref counts (§4.5).
    pub fn try_cast(&self, ordinal: InterfaceOrdinal) -> Option<InterfaceOrdinal> {
        self.table.try_cast(ordinal)
    }

    /// Invoke a method on this stub's dispatch table.
    pub fn invoke(&self, ordinal: InterfaceOrdinal, method: Method, input: &[u8]) -> Result<Vec<u8>> {
        self.table.dispatch(self.object, ordinal, method, input)
    }

    /// Bump the shared count attributed to `caller`, returning the new
    /// total shared count across all callers.
    pub fn add_shared(&self, caller: CallerZone) -> u64 {
        let mut counts = self.counts.lock();
        let entry = counts.entry(caller).or_default();
        entry.shared += 1;
        debug!(object = %self.object, %caller, shared = entry.shared, "stub add_shared");
        Self::total_shared_locked(&counts)
    }

    /// Bump the optimistic count attributed to `caller`, returning the
    /// new total optimistic count across all callers.
    pub fn add_optimistic(&self, caller: CallerZone) -> u64 {
        let mut counts = self.counts.lock();
        let entry = counts.entry(caller).or_default();
        entry.optimistic += 1;
        debug!(object = %self.object, %caller, optimistic = entry.optimistic, "stub add_optimistic");
        Self::total_optimistic_locked(&counts)
    }

    /// Release one shared reference attributed to `caller`. Returns the
    /// new shared count for that caller. An underflow (release without
    /// a matching add) is clamped at zero and logged rather than
    /// surfaced, per §7's "locally recovered" policy.
    pub fn release_shared(&self, caller: CallerZone) -> u64 {
        let mut counts = self.counts.lock();
        let new_count = {
            let entry = counts.entry(caller).or_default();
            if entry.shared == 0 {
                warn!(object = %self.object, %caller, "optimistic/shared count underflow clamped at zero");
            } else {
                entry.shared -= 1;
            }
            entry.shared
        };
        Self::prune_locked(&mut counts, caller);
        new_count
    }

    /// Release one optimistic reference attributed to `caller`.
    pub fn release_optimistic(&self, caller: CallerZone) -> u64 {
        let mut counts = self.counts.lock();
        let new_count = {
            let entry = counts.entry(caller).or_default();
            if entry.optimistic == 0 {
                warn!(object = %self.object, %caller, "optimistic count underflow clamped at zero");
            } else {
                entry.optimistic -= 1;
            }
            entry.optimistic
        };
        Self::prune_locked(&mut counts, caller);
        new_count
    }

    /// `true` once every caller's counts have reached zero — the
    /// free-at-zero rule that triggers stub destruction (§3).
    pub fn is_destroyed(&self) -> bool {
        self.counts.lock().is_empty()
    }

    /// Total shared count across every caller zone (invariant 2, §8).
    pub fn total_shared(&self) -> u64 {
        Self::total_shared_locked(&self.counts.lock())
    }

    /// Shared count attributable to a specific caller zone.
    pub fn shared_count_for(&self, caller: CallerZone) -> u64 {
        self.counts.lock().get(&caller).map(|c| c.shared).unwrap_or(0)
    }

    fn total_shared_locked(counts: &HashMap<CallerZone, RefCounts>) -> u64 {
        counts.values().map(|c| c.shared).sum()
    }

    fn total_optimistic_locked(counts: &HashMap<CallerZone, RefCounts>) -> u64 {
        counts.values().map(|c| c.optimistic).sum()
    }

    fn prune_locked(counts: &mut HashMap<CallerZone, RefCounts>, caller: CallerZone) {
        if counts.get(&caller).copied().unwrap_or_default().is_zero() {
            counts.remove(&caller);
        }
    }
}

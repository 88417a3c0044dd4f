//! # Pass-through
//!
//! A short-circuit routing entity that lives inside an intermediary
//! zone B and forwards calls between two non-adjacent zones A and D
//! (§3, §4.6). A pass-through is created the first time B sees a relay
//! add-ref (`options = 3`) for the unordered pair `{A, D}`; it holds
//! independent shared/optimistic counts tracking how many live
//! relayed references currently use the route it built, and tears the
//! route down once both reach zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::identity::{CallerZone, DestinationZone, ObjectId, TransactionId};
use crate::options::{AddRefOptions, RouteOptions};
use crate::service_proxy::ServiceProxy;

/// Sentinel object id used for the route-provisioning add-ref/release
/// pair a pass-through emits on construction/teardown (§4.6): these
/// calls plumb routing knowledge, not an object-level ref count, so
/// they carry no real object id.
pub const ROUTE_MARKER: ObjectId = ObjectId::new(0);

/// Router inside an intermediary zone forwarding calls between two
/// non-adjacent peers, with its own independent reference counts.
pub struct PassThrough {
    forward: Arc<ServiceProxy>,
    reverse: Arc<ServiceProxy>,
    forward_zone: DestinationZone,
    reverse_zone: CallerZone,
    shared: AtomicU64,
    optimistic: AtomicU64,
}

impl PassThrough {
    /// Construct a pass-through for `{reverse_zone, forward_zone}` and
    /// emit the two route-provisioning messages described in §4.6.
    /// Returns the pass-through with `shared = 1, optimistic = 0` (the
    /// triggering relay add-ref that caused its creation).
    pub async fn create(
        forward: Arc<ServiceProxy>,
        reverse: Arc<ServiceProxy>,
        forward_zone: DestinationZone,
        reverse_zone: CallerZone,
        optimistic: bool,
    ) -> Result<Arc<Self>> {
        let pass_through = Arc::new(Self {
            forward,
            reverse,
            forward_zone,
            reverse_zone,
            shared: AtomicU64::new(if optimistic { 0 } else { 1 }),
            optimistic: AtomicU64::new(if optimistic { 1 } else { 0 }),
        });

        let forward_txn = pass_through.forward.next_transaction();
        pass_through
            .forward
            .add_ref(forward_txn, ROUTE_MARKER, AddRefOptions { route: RouteOptions::DestinationRoute, optimistic: false })
            .await?;
        let reverse_txn = pass_through.reverse.next_transaction();
        pass_through
            .reverse
            .add_ref(reverse_txn, ROUTE_MARKER, AddRefOptions { route: RouteOptions::CallerRoute, optimistic: false })
            .await?;

        debug!(
            reverse_zone = %reverse_zone,
            forward_zone = %forward_zone,
            "pass-through created"
        );
        Ok(pass_through)
    }

    /// The zone this pass-through forwards toward ("D").
    pub fn forward_zone(&self) -> DestinationZone {
        self.forward_zone
    }

    /// The zone this pass-through forwards back toward ("A").
    pub fn reverse_zone(&self) -> CallerZone {
        self.reverse_zone
    }

    /// Forward a relay add-ref for a real object through this route,
    /// bumping the pass-through's own count. The object-level add-ref
    /// itself is re-emitted toward `forward_zone` carrying the
    /// original caller/object unchanged, as a plain (non-route-
    /// building) bump — the route itself was already provisioned at
    /// construction.
    pub async fn relay_add_ref(&self, transaction: TransactionId, object: ObjectId, optimistic: bool) -> Result<u64> {
        let new_count = self
            .forward
            .add_ref(transaction, object, AddRefOptions { route: RouteOptions::Plain, optimistic })
            .await?;
        if optimistic {
            self.optimistic.fetch_add(1, Ordering::AcqRel);
        } else {
            self.shared.fetch_add(1, Ordering::AcqRel);
        }
        Ok(new_count)
    }

    /// Forward a relay release for a real object. Returns `true` if
    /// this was the pass-through's last reference on either axis
    /// (i.e. it is now fully empty and should be torn down).
    pub async fn relay_release(&self, transaction: TransactionId, object: ObjectId, optimistic: bool) -> Result<bool> {
        self.forward
            .release(transaction, object, AddRefOptions { route: RouteOptions::Plain, optimistic })
            .await?;
        let remaining = if optimistic {
            self.optimistic.fetch_sub(1, Ordering::AcqRel) - 1
        } else {
            self.shared.fetch_sub(1, Ordering::AcqRel) - 1
        };
        Ok(remaining == 0 && self.is_empty())
    }

    /// `true` once both axes have reached zero.
    pub fn is_empty(&self) -> bool {
        self.shared.load(Ordering::Acquire) == 0 && self.optimistic.load(Ordering::Acquire) == 0
    }

    /// Current shared count (test/diagnostic use).
    pub fn shared(&self) -> u64 {
        self.shared.load(Ordering::Acquire)
    }

    /// Current optimistic count (test/diagnostic use).
    pub fn optimistic(&self) -> u64 {
        self.optimistic.load(Ordering::Acquire)
    }

    /// Tear down the route this pass-through built, emitting the
    /// teardown releases described in §4.6. Called once
    /// [`Self::is_empty`] holds.
    pub async fn teardown(&self) -> Result<()> {
        let forward_txn = self.forward.next_transaction();
        self.forward
            .release(forward_txn, ROUTE_MARKER, AddRefOptions { route: RouteOptions::DestinationRoute, optimistic: false })
            .await?;
        let reverse_txn = self.reverse.next_transaction();
        self.reverse
            .release(reverse_txn, ROUTE_MARKER, AddRefOptions { route: RouteOptions::CallerRoute, optimistic: false })
            .await?;
        debug!(reverse_zone = %self.reverse_zone, forward_zone = %self.forward_zone, "pass-through torn down");
        Ok(())
    }
}

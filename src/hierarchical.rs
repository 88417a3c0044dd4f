//! # Hierarchical transport pattern
//!
//! The in-address-space parent/child pairing described in §4.7: the
//! parent's service holds a reference to the child's transport and
//! vice versa, a deliberately circular pair kept alive only by the
//! pattern's own discipline, not by ordinary ownership. [`MemberRef`]
//! is the snapshot-under-reader-lock / reset-under-writer-lock
//! primitive that makes breaking the cycle safe; [`HierarchicalLink`]
//! applies it to a concrete parent/child pair built over the local
//! transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::identity::Zone;
use crate::service::Service;
use crate::transport::Transport;
use crate::transports::local::LocalTransport;

/// A member slot that can be snapshotted (strong reference, reader
/// lock) or reset (writer lock) independently of any in-flight call
/// already holding a snapshot (§4.7 rule 1).
pub struct MemberRef<T: ?Sized> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> MemberRef<T> {
    /// A slot initially holding `value`.
    pub fn new(value: Arc<T>) -> Self {
        Self { slot: RwLock::new(Some(value)) }
    }

    /// An initially empty slot.
    pub fn empty() -> Self {
        Self { slot: RwLock::new(None) }
    }

    /// Take a strong reference under the reader lock. A call already
    /// holding a snapshot runs to completion even if [`Self::reset`]
    /// is called concurrently.
    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    /// Clear the slot under the writer lock (§4.7 rule 2/3): the last
    /// strong reference this drops, if any, is the final-reference
    /// signal that triggers the owner's own teardown.
    pub fn reset(&self) {
        self.slot.write().take();
    }

    /// Replace the slot's contents.
    pub fn set(&self, value: Arc<T>) {
        *self.slot.write() = Some(value);
    }

    /// `true` while the slot holds a live reference.
    pub fn is_connected(&self) -> bool {
        self.slot.read().is_some()
    }
}

/// Connection status of a [`HierarchicalLink`]. `set_status`ing
/// [`LinkStatus::Disconnected`] is the sole sanctioned way to begin
/// teardown (§4.7 rule 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// A parent/child zone pair connected over the local transport, with
/// the circular-reference discipline of §4.7 applied to it.
pub struct HierarchicalLink {
    parent_zone: Zone,
    child_zone: Zone,
    child_transport: MemberRef<LocalTransport>,
    parent_transport: MemberRef<LocalTransport>,
    status: RwLock<LinkStatus>,
}

impl HierarchicalLink {
    /// Establish the link: build the underlying transport pair,
    /// register a service proxy on each side toward the other, and
    /// publish each side into the other's member slot. The root
    /// descriptor handshake itself (§4.7's `init_channel`) is
    /// [`Service::connect_to_zone`]'s job; this wires the two zones
    /// close enough together for that call to then succeed.
    pub fn establish(parent: &Arc<Service>, child: &Arc<Service>) -> Arc<Self> {
        let (to_child, to_parent) = LocalTransport::pair(parent, child);
        parent.attach_remote_zone(child.zone(), Arc::clone(&to_child) as Arc<dyn Transport>, |root| root);
        child.attach_remote_zone(parent.zone(), Arc::clone(&to_parent) as Arc<dyn Transport>, |root| root);
        info!(parent = %parent.zone(), child = %child.zone(), "hierarchical link established");
        Arc::new(Self {
            parent_zone: parent.zone(),
            child_zone: child.zone(),
            child_transport: MemberRef::new(to_child),
            parent_transport: MemberRef::new(to_parent),
            status: RwLock::new(LinkStatus::Connected),
        })
    }

    pub fn parent_zone(&self) -> Zone {
        self.parent_zone
    }

    pub fn child_zone(&self) -> Zone {
        self.child_zone
    }

    /// The parent's outbound view of the child, for the parent's
    /// dispatch code to snapshot before a call crosses the boundary.
    pub fn child_transport(&self) -> Option<Arc<LocalTransport>> {
        self.child_transport.snapshot()
    }

    /// The child's outbound view of the parent.
    pub fn parent_transport(&self) -> Option<Arc<LocalTransport>> {
        self.parent_transport.snapshot()
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.read()
    }

    /// `on_child_disconnected` / `on_parent_disconnected` collapsed
    /// into one call: the status gate clears both member slots under
    /// the writer lock. Any snapshot already in flight keeps the
    /// `Arc` alive until its call completes.
    pub fn disconnect(&self) {
        *self.status.write() = LinkStatus::Disconnected;
        self.child_transport.reset();
        self.parent_transport.reset();
        info!(parent = %self.parent_zone, child = %self.child_zone, "hierarchical link disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_member_ref_does_not_invalidate_existing_snapshot() {
        let member = MemberRef::new(Arc::new(42u32));
        let snapshot = member.snapshot().unwrap();
        member.reset();
        assert!(!member.is_connected());
        assert_eq!(*snapshot, 42);
    }

    #[tokio::test]
    async fn disconnect_clears_both_member_slots() {
        use crate::scheduler::Scheduler;

        let parent = Service::new("parent", Zone::new(1), Arc::new(Scheduler::current()));
        let child = Service::new("child", Zone::new(2), Arc::new(Scheduler::current()));
        let link = HierarchicalLink::establish(&parent, &child);
        assert!(link.child_transport().is_some());
        assert!(link.parent_transport().is_some());

        link.disconnect();
        assert!(matches!(link.status(), LinkStatus::Disconnected));
        assert!(link.child_transport().is_none());
        assert!(link.parent_transport().is_none());
    }
}

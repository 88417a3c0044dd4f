//! # Service proxy
//!
//! The outbound half of one zone-to-zone channel (§3, §4.2): paired
//! 1:1 with a [`crate::transport::Transport`] and a destination zone,
//! owning the object proxies handed out for that destination and the
//! per-object shared/optimistic counts asserted to the remote stub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identity::{
    CallerZone, DestinationZone, IdAllocator, InterfaceOrdinal, KnownDirectionZone, Method, ObjectId, TransactionId,
    Zone,
};
use crate::object_proxy::ObjectProxy;
use crate::options::AddRefOptions;
use crate::transport::Transport;

/// Per-object bookkeeping: the counts this service proxy has asked
/// the remote stub to maintain on its behalf, plus a weak handle to
/// the cached object proxy so repeat lookups reuse it rather than
/// creating a second local representation of the same remote object.
struct ObjectEntry {
    shared: u64,
    optimistic: u64,
    proxy: Weak<ObjectProxy>,
}

impl ObjectEntry {
    fn is_zero(&self) -> bool {
        self.shared == 0 && self.optimistic == 0
    }
}

/// Per-destination outbound connection, paired 1:1 with a transport.
pub struct ServiceProxy {
    zone: Zone,
    destination: DestinationZone,
    transport: Arc<dyn Transport>,
    table: Mutex<HashMap<ObjectId, ObjectEntry>>,
    transactions: IdAllocator,
    marked_down: AtomicBool,
    /// A weak handle to this service proxy's own `Arc`, established at
    /// construction via `Arc::new_cyclic` so object proxies can be
    /// handed a backlink without every method needing an `Arc<Self>`
    /// receiver.
    self_weak: Weak<ServiceProxy>,
    /// The owning zone's scheduler handle, handed to every object
    /// proxy this service proxy creates so its `Drop` impl can spawn
    /// the release task on a runtime guaranteed to be alive, instead
    /// of guessing at an ambient "current" one (§5 suspension points).
    runtime: tokio::runtime::Handle,
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("zone", &self.zone)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl ServiceProxy {
    /// Build a service proxy for `destination`, operating as `zone`,
    /// over `transport`. The transport is expected to already be
    /// connected (or connecting); the service proxy itself never
    /// calls `connect`.
    pub fn new(
        zone: Zone,
        destination: DestinationZone,
        transport: Arc<dyn Transport>,
        runtime: tokio::runtime::Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            zone,
            destination,
            transport,
            table: Mutex::new(HashMap::new()),
            transactions: IdAllocator::new(),
            marked_down: AtomicBool::new(false),
            self_weak: self_weak.clone(),
            runtime,
        })
    }

    /// This service proxy's scheduler handle, for handing to the
    /// object proxies it creates.
    pub(crate) fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.runtime.clone()
    }

    /// The zone this service proxy operates on behalf of.
    pub fn operating_zone(&self) -> Zone {
        self.zone
    }

    /// The zone this service proxy's object proxies point at.
    pub fn destination_zone(&self) -> DestinationZone {
        self.destination
    }

    /// `true` iff the underlying transport is connected and this
    /// service proxy has not been explicitly marked down.
    pub fn is_operational(&self) -> bool {
        !self.marked_down.load(Ordering::Acquire) && self.transport.is_operational()
    }

    /// Allocate the next per-call transaction id.
    pub fn next_transaction(&self) -> TransactionId {
        TransactionId::new(self.transactions.allocate())
    }

    fn caller(&self) -> CallerZone {
        CallerZone::new(self.zone.raw())
    }

    fn require_operational(&self) -> Result<()> {
        if self.is_operational() {
            Ok(())
        } else {
            Err(Error::TransportDown { destination: self.destination })
        }
    }

    /// Request/response call against a remote object.
    pub async fn send(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: Method,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        self.require_operational()?;
        self.transport
            .send(
                crate::envelope::Encoding::YasBinary,
                transaction,
                destination,
                object,
                interface,
                method,
                input,
            )
            .await
    }

    /// Fire-and-forget delivery against a remote object.
    pub async fn post(
        &self,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: Method,
        input: &[u8],
    ) -> Result<()> {
        self.require_operational()?;
        self.transport
            .post(crate::envelope::Encoding::YasBinary, destination, object, interface, method, input)
            .await
    }

    /// Probe an object for an interface; `None` on `UNKNOWN_INTERFACE`.
    pub async fn try_cast(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
    ) -> Result<Option<InterfaceOrdinal>> {
        self.require_operational()?;
        match self.transport.try_cast(transaction, destination, object, interface).await {
            Ok(ordinal) => Ok(Some(ordinal)),
            Err(Error::UnknownInterface { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Return the cached object proxy for `object`, creating one (and
    /// sending the first lazy `add_ref`) if this is the first time
    /// this service proxy has seen it (§4.2).
    pub async fn get_or_create_object_proxy(
        &self,
        object: ObjectId,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<Arc<ObjectProxy>> {
        if let Some(existing) = {
            let table = self.table.lock();
            table.get(&object).and_then(|entry| entry.proxy.upgrade())
        } {
            return Ok(existing);
        }

        self.require_operational()?;
        let transaction = self.next_transaction();
        self.transport
            .add_ref(transaction, self.destination, object, self.caller(), options, known_direction)
            .await?;

        let proxy = Arc::new(ObjectProxy::new(self.destination, object, self.self_weak.clone()));
        let mut table = self.table.lock();
        let entry = table.entry(object).or_insert_with(|| ObjectEntry {
            shared: 0,
            optimistic: 0,
            proxy: Weak::new(),
        });
        if options.optimistic {
            entry.optimistic += 1;
        } else {
            entry.shared += 1;
        }
        entry.proxy = Arc::downgrade(&proxy);
        debug!(%object, destination = %self.destination, "service proxy created object proxy");
        Ok(proxy)
    }

    /// Bump this object's ref count on the remote stub without
    /// creating (or requiring) a local object proxy — used for relay
    /// add-refs forwarded through a pass-through (§4.6) and for
    /// same-zone round-trip references (S3).
    pub async fn add_ref(&self, transaction: TransactionId, object: ObjectId, options: AddRefOptions) -> Result<u64> {
        self.require_operational()?;
        let new_count = self
            .transport
            .add_ref(transaction, self.destination, object, self.caller(), options, None)
            .await?;
        let mut table = self.table.lock();
        let entry = table.entry(object).or_insert_with(|| ObjectEntry {
            shared: 0,
            optimistic: 0,
            proxy: Weak::new(),
        });
        if options.optimistic {
            entry.optimistic += 1;
        } else {
            entry.shared += 1;
        }
        Ok(new_count)
    }

    /// Release one reference on `object`'s corresponding axis,
    /// forwarding the wire `release` 1:1 and erasing the local entry
    /// once both axes are back to zero (§4.2).
    pub async fn release(&self, transaction: TransactionId, object: ObjectId, options: AddRefOptions) -> Result<u64> {
        {
            let mut table = self.table.lock();
            if let Some(entry) = table.get_mut(&object) {
                if options.optimistic {
                    if entry.optimistic == 0 {
                        warn!(%object, "service proxy optimistic count underflow clamped at zero");
                    } else {
                        entry.optimistic -= 1;
                    }
                } else if entry.shared == 0 {
                    warn!(%object, "service proxy shared count underflow clamped at zero");
                } else {
                    entry.shared -= 1;
                }
                if entry.is_zero() {
                    table.remove(&object);
                }
            }
        }
        if !self.is_operational() {
            // The transport is already down; there is nothing left to
            // tell the peer, and the local bookkeeping above already
            // reflects the release.
            return Ok(0);
        }
        self.transport.release(transaction, self.destination, object, self.caller(), options, None).await
    }

    /// Current local shared count for `object` (test/diagnostic use).
    pub fn shared_count(&self, object: ObjectId) -> u64 {
        self.table.lock().get(&object).map(|e| e.shared).unwrap_or(0)
    }

    /// Current local optimistic count for `object`.
    pub fn optimistic_count(&self, object: ObjectId) -> u64 {
        self.table.lock().get(&object).map(|e| e.optimistic).unwrap_or(0)
    }

    /// Create a new service proxy representing `(self.zone,
    /// other_destination)`, piggybacking on the same transport chain —
    /// used when a reference travels forward to a third zone (§4.2).
    pub fn clone_for_zone(&self, other_destination: DestinationZone) -> Result<Arc<Self>> {
        if !self.is_operational() {
            return Err(Error::NotOperational { context: "clone_for_zone on non-operational service proxy" });
        }
        Ok(Self::new(self.zone, other_destination, Arc::clone(&self.transport), self.runtime.clone()))
    }

    /// Mark this service proxy non-operational (§4.2 disconnection):
    /// subsequent calls fail `TRANSPORT_DOWN`, and any object proxy
    /// still alive observes the same on its next call.
    pub fn mark_disconnected(&self) {
        self.marked_down.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Encoding;
    use crate::transport::TransportState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering as AtoOrdering};

    struct StubTransport {
        state: TransportState,
        remote_shared: AtomicU64,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn send(
            &self,
            _encoding: Encoding,
            _transaction: TransactionId,
            _destination: DestinationZone,
            _object: ObjectId,
            _interface: InterfaceOrdinal,
            _method: Method,
            input: &[u8],
        ) -> Result<Vec<u8>> {
            Ok(input.to_vec())
        }

        async fn post(
            &self,
            _encoding: Encoding,
            _destination: DestinationZone,
            _object: ObjectId,
            _interface: InterfaceOrdinal,
            _method: Method,
            _input: &[u8],
        ) -> Result<()> {
            Ok(())
        }

        async fn try_cast(
            &self,
            _transaction: TransactionId,
            _destination: DestinationZone,
            object: ObjectId,
            interface: InterfaceOrdinal,
        ) -> Result<InterfaceOrdinal> {
            Err(Error::UnknownInterface { object, interface })
        }

        async fn add_ref(
            &self,
            _transaction: TransactionId,
            _destination: DestinationZone,
            _object: ObjectId,
            _caller: CallerZone,
            _options: AddRefOptions,
            _known_direction: Option<KnownDirectionZone>,
        ) -> Result<u64> {
            Ok(self.remote_shared.fetch_add(1, AtoOrdering::SeqCst) + 1)
        }

        async fn release(
            &self,
            _transaction: TransactionId,
            _destination: DestinationZone,
            _object: ObjectId,
            _caller: CallerZone,
            _options: AddRefOptions,
            _known_direction: Option<KnownDirectionZone>,
        ) -> Result<u64> {
            Ok(self.remote_shared.fetch_sub(1, AtoOrdering::SeqCst) - 1)
        }

        async fn handshake(&self, local: crate::transport::RootDescriptor) -> Result<crate::transport::RootDescriptor> {
            Ok(local)
        }

        fn state(&self) -> TransportState {
            self.state
        }
    }

    fn proxy() -> Arc<ServiceProxy> {
        let transport: Arc<dyn Transport> =
            Arc::new(StubTransport { state: TransportState::Connected, remote_shared: AtomicU64::new(0) });
        ServiceProxy::new(Zone::new(1), DestinationZone::new(2), transport, tokio::runtime::Handle::current())
    }

    #[tokio::test]
    async fn get_or_create_object_proxy_caches_repeat_lookups() {
        let service_proxy = proxy();
        let object = ObjectId::new(5);
        let first = service_proxy
            .get_or_create_object_proxy(object, AddRefOptions::PLAIN, None)
            .await
            .unwrap();
        let second = service_proxy
            .get_or_create_object_proxy(object, AddRefOptions::PLAIN, None)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service_proxy.shared_count(object), 1);
    }

    #[tokio::test]
    async fn add_ref_then_release_round_trips_to_empty_entry() {
        let service_proxy = proxy();
        let object = ObjectId::new(7);
        let transaction = service_proxy.next_transaction();
        service_proxy.add_ref(transaction, object, AddRefOptions::PLAIN).await.unwrap();
        assert_eq!(service_proxy.shared_count(object), 1);
        service_proxy.release(transaction, object, AddRefOptions::PLAIN).await.unwrap();
        assert_eq!(service_proxy.shared_count(object), 0);
    }

    #[tokio::test]
    async fn disconnected_service_proxy_fails_transport_down() {
        let service_proxy = proxy();
        service_proxy.mark_disconnected();
        assert!(!service_proxy.is_operational());
        let transaction = service_proxy.next_transaction();
        let err = service_proxy
            .send(transaction, DestinationZone::new(2), ObjectId::new(1), InterfaceOrdinal::new(1), Method::new(0), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportDown { .. }));
    }

    #[tokio::test]
    async fn clone_for_zone_fails_once_disconnected() {
        let service_proxy = proxy();
        service_proxy.mark_disconnected();
        let err = service_proxy.clone_for_zone(DestinationZone::new(3)).unwrap_err();
        assert!(matches!(err, Error::NotOperational { .. }));
    }
}

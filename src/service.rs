//! # Zone service
//!
//! The per-zone singleton (§3, §4.1): owns the stub table (objects
//! this zone hosts), the service-proxy table (outbound channels to
//! zones this zone has talked to), and the pass-through table
//! (routes this zone forwards on behalf of others). `dispatch_inbound`
//! implements the five-way routing decision every incoming request is
//! put through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identity::{
    CallerZone, DestinationZone, IdAllocator, InterfaceOrdinal, KnownDirectionZone, Method, ObjectId, TransactionId, Zone,
};
use crate::interface::MethodTable;
use crate::object_proxy::ObjectProxy;
use crate::options::{AddRefOptions, RouteOptions};
use crate::pass_through::PassThrough;
use crate::scheduler::Scheduler;
use crate::service_proxy::ServiceProxy;
use crate::stub::Stub;
use crate::transport::{RootDescriptor, Transport};

/// Called when a peer zone's handshake arrives, to decide what this
/// zone publishes as its own root object in response (§4.1, §4.7's
/// `init_channel` handshake).
pub type BindFn = dyn Fn(RootDescriptor) -> RootDescriptor + Send + Sync;

/// Unordered pair of zones a pass-through forwards between, used as
/// the pass-through table's key (invariant 4, §8): `{A, D}` and
/// `{D, A}` name the same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ZonePair(Zone, Zone);

impl ZonePair {
    fn new(a: Zone, b: Zone) -> Self {
        if a.raw() <= b.raw() {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Broadcast payload sent to every observer when a zone begins
/// shutting down (§4.1 expansion; resolves the open question in §9 as
/// required, not optional).
#[derive(Debug, Clone, Copy)]
pub struct ZoneTerminating {
    pub zone: Zone,
}

/// The zone-local singleton coordinating stubs, service proxies, and
/// pass-throughs.
pub struct Service {
    name: String,
    zone: Zone,
    scheduler: Arc<Scheduler>,
    stubs: RwLock<HashMap<ObjectId, Arc<Stub>>>,
    service_proxies: RwLock<HashMap<Zone, Arc<ServiceProxy>>>,
    pass_throughs: RwLock<HashMap<ZonePair, Arc<PassThrough>>>,
    object_ids: IdAllocator,
    zone_ids: IdAllocator,
    terminating: broadcast::Sender<ZoneTerminating>,
    /// Set the first time a remote zone publishes its own root object
    /// to us (`dispatch_handshake`), consulted to answer the peer's
    /// handshake in turn.
    bind_fn: RwLock<Option<Arc<BindFn>>>,
    /// Set once this zone has hosted at least one stub or attached at
    /// least one service proxy; `maybe_broadcast_terminating` never
    /// fires for a zone that was never actually active.
    ever_active: AtomicBool,
    terminated: AtomicBool,
}

impl Service {
    /// Construct the singleton for `zone`, named `name` (§4.1) and
    /// scheduled by `scheduler` — handed to every service proxy this
    /// zone attaches so the object proxies it creates have a runtime
    /// to spawn their release tasks on (§5).
    pub fn new(name: impl Into<String>, zone: Zone, scheduler: Arc<Scheduler>) -> Arc<Self> {
        let (terminating, _) = broadcast::channel(16);
        Arc::new(Self {
            name: name.into(),
            zone,
            scheduler,
            stubs: RwLock::new(HashMap::new()),
            service_proxies: RwLock::new(HashMap::new()),
            pass_throughs: RwLock::new(HashMap::new()),
            object_ids: IdAllocator::new(),
            zone_ids: IdAllocator::new(),
            terminating,
            bind_fn: RwLock::new(None),
            ever_active: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        })
    }

    /// This zone's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This zone's own id.
    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// `true` once [`Self::begin_terminating`] has fired for this zone.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(AtomicOrdering::Acquire)
    }

    /// Subscribe to zone-termination notifications (§4.1 expansion).
    pub fn subscribe_terminating(&self) -> broadcast::Receiver<ZoneTerminating> {
        self.terminating.subscribe()
    }

    /// Allocate a fresh, never-zero object id for a newly hosted
    /// object (§3: value 0 is reserved for "none").
    pub fn generate_new_object_id(&self) -> ObjectId {
        ObjectId::new(self.object_ids.allocate())
    }

    /// Allocate a fresh, never-zero id for a zone this service is
    /// about to attach (§4.1: a zone id handed out by whichever side
    /// of a new connection originates it).
    pub fn generate_new_zone_id(&self) -> Zone {
        Zone::new(self.zone_ids.allocate())
    }

    /// Register a native object as remotely callable under `object_id`
    /// (normally obtained from [`Self::generate_new_object_id`]),
    /// returning the stub hosting it. Fails `DUPLICATE_OBJECT` if
    /// `object_id` is already registered, and `NOT_OPERATIONAL` once
    /// this zone has begun terminating.
    pub fn register_stub(&self, object_id: ObjectId, table: MethodTable) -> Result<Arc<Stub>> {
        if self.is_terminated() {
            return Err(Error::NotOperational { context: "register_stub on terminating zone" });
        }
        let stub = Arc::new(Stub::new(object_id, table));
        let mut stubs = self.stubs.write();
        if stubs.contains_key(&object_id) {
            return Err(Error::DuplicateObject { object: object_id });
        }
        stubs.insert(object_id, Arc::clone(&stub));
        self.ever_active.store(true, AtomicOrdering::Release);
        debug!(object = %object_id, zone = %self.zone, "stub registered");
        Ok(stub)
    }

    /// Look up a hosted stub by object id.
    pub fn find_stub(&self, object: ObjectId) -> Option<Arc<Stub>> {
        self.stubs.read().get(&object).cloned()
    }

    /// Attach (or replace) the outbound channel to `destination`,
    /// wrapping `transport` in a fresh service proxy. `bind_fn` decides
    /// what this zone answers with when the peer performs the root
    /// handshake (§4.1, §4.7's `init_channel`).
    pub fn attach_remote_zone(
        &self,
        destination: Zone,
        transport: Arc<dyn Transport>,
        bind_fn: impl Fn(RootDescriptor) -> RootDescriptor + Send + Sync + 'static,
    ) -> Arc<ServiceProxy> {
        let service_proxy = ServiceProxy::new(
            self.zone,
            DestinationZone::new(destination.raw()),
            transport,
            self.scheduler.handle(),
        );
        self.service_proxies.write().insert(destination, Arc::clone(&service_proxy));
        *self.bind_fn.write() = Some(Arc::new(bind_fn));
        self.ever_active.store(true, AtomicOrdering::Release);
        info!(zone = %self.zone, remote = %destination, "attached remote zone");
        service_proxy
    }

    /// Connect to `destination` over `transport`, performing the root
    /// handshake (§4.1's `connect_to_zone`): publish `local_root` as
    /// this zone's own root object and learn the peer's in the same
    /// round trip, then resolve both to object proxies.
    ///
    /// The spec's distillation does not further distinguish a
    /// "host ref" from a "root ref" once a connection is established;
    /// this reference implementation resolves both to the same object
    /// proxy for the peer's published root object (recorded as an open
    /// question decision in `DESIGN.md`).
    pub async fn connect_to_zone(
        &self,
        destination: Zone,
        transport: Arc<dyn Transport>,
        local_root: RootDescriptor,
    ) -> Result<(Arc<ObjectProxy>, Arc<ObjectProxy>)> {
        if self.is_terminated() {
            return Err(Error::NotOperational { context: "connect_to_zone on terminating zone" });
        }
        let service_proxy = ServiceProxy::new(
            self.zone,
            DestinationZone::new(destination.raw()),
            Arc::clone(&transport),
            self.scheduler.handle(),
        );
        self.service_proxies.write().insert(destination, Arc::clone(&service_proxy));
        self.ever_active.store(true, AtomicOrdering::Release);

        let peer_root = transport.handshake(local_root).await?;
        let host_ref = service_proxy
            .get_or_create_object_proxy(peer_root.object, AddRefOptions::PLAIN, None)
            .await?;
        let root_ref = Arc::clone(&host_ref);
        info!(zone = %self.zone, remote = %destination, root = %peer_root.object, "connected to zone");
        Ok((host_ref, root_ref))
    }

    /// Answer a peer's root-object handshake (§4.1, §4.7) using the
    /// `bind_fn` registered by [`Self::attach_remote_zone`].
    pub fn dispatch_handshake(&self, peer_root: RootDescriptor) -> Result<RootDescriptor> {
        let bind_fn = self
            .bind_fn
            .read()
            .clone()
            .ok_or(Error::NotOperational { context: "no root object published for handshake" })?;
        Ok(bind_fn(peer_root))
    }

    /// The service proxy toward `destination`, if this zone has one.
    pub fn service_proxy_for(&self, destination: Zone) -> Option<Arc<ServiceProxy>> {
        self.service_proxies.read().get(&destination).cloned()
    }

    /// Route an inbound `add_ref` request, implementing the §4.1
    /// decision: local if this zone owns the object, relayed through
    /// a pass-through otherwise.
    pub async fn dispatch_add_ref(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64> {
        if destination.raw() == self.zone.raw() {
            let stub = self.find_stub(object).ok_or(Error::ObjectNotFound { zone: self.zone, object })?;
            return Ok(if options.optimistic { stub.add_optimistic(caller) } else { stub.add_shared(caller) });
        }

        if !options.route.is_relay() {
            let forward = self.route_forward(destination, known_direction)?;
            return forward.add_ref(transaction, object, options).await;
        }

        let pass_through = self.pass_through_for(Zone::new(caller.raw()), Zone::new(destination.raw()), options.optimistic).await?;
        pass_through.relay_add_ref(transaction, object, options.optimistic).await
    }

    /// Resolve a non-relay forward hop: prefer the direct service
    /// proxy for `destination`, falling back to `known_direction`'s
    /// next-hop hint when no direct route exists (§4.1 step 3 of the
    /// five-way routing decision).
    fn route_forward(&self, destination: DestinationZone, known_direction: Option<KnownDirectionZone>) -> Result<Arc<ServiceProxy>> {
        if let Some(direct) = self.service_proxy_for(Zone::new(destination.raw())) {
            return Ok(direct);
        }
        if let Some(hint) = known_direction {
            if let Some(via_hint) = self.service_proxy_for(Zone::new(hint.raw())) {
                debug!(%destination, hint = %hint, "routed via known-direction hint");
                return Ok(via_hint);
            }
        }
        Err(Error::NoRoute { destination })
    }

    /// Route an inbound `release` request, symmetric with
    /// [`Self::dispatch_add_ref`]. Tears down and removes an emptied
    /// pass-through (§4.6's deletion rule).
    pub async fn dispatch_release(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64> {
        if destination.raw() == self.zone.raw() {
            let stub = self.find_stub(object).ok_or(Error::ObjectNotFound { zone: self.zone, object })?;
            let count = if options.optimistic { stub.release_optimistic(caller) } else { stub.release_shared(caller) };
            if stub.is_destroyed() {
                self.stubs.write().remove(&object);
                debug!(%object, zone = %self.zone, "stub destroyed and unregistered");
                self.maybe_broadcast_terminating();
            }
            return Ok(count);
        }

        if !options.route.is_relay() {
            let forward = self.route_forward(destination, known_direction)?;
            return forward.release(transaction, object, options).await;
        }

        let key = ZonePair::new(Zone::new(caller.raw()), Zone::new(destination.raw()));
        let pass_through = self.pass_throughs.read().get(&key).cloned().ok_or(Error::NoRoute { destination })?;
        let empty = pass_through.relay_release(transaction, object, options.optimistic).await?;
        if empty {
            pass_through.teardown().await?;
            self.pass_throughs.write().remove(&key);
        }
        Ok(0)
    }

    /// Fire [`Self::begin_terminating`] once this zone's stub and
    /// service-proxy tables have both gone empty, but only for a zone
    /// that was actually active at some point — an idle zone that
    /// never hosted anything is not "terminating", it simply never
    /// started (§4.1 expansion, resolving §9's open question).
    fn maybe_broadcast_terminating(&self) {
        if !self.ever_active.load(AtomicOrdering::Acquire) || self.is_terminated() {
            return;
        }
        if self.stubs.read().is_empty() && self.service_proxies.read().is_empty() {
            self.begin_terminating();
        }
    }

    async fn pass_through_for(&self, caller: Zone, destination: Zone, optimistic: bool) -> Result<Arc<PassThrough>> {
        let key = ZonePair::new(caller, destination);
        if let Some(existing) = self.pass_throughs.read().get(&key).cloned() {
            return Ok(existing);
        }

        let forward = self.service_proxy_for(destination).ok_or(Error::NoRoute { destination: DestinationZone::new(destination.raw()) })?;
        let reverse = self.service_proxy_for(caller).ok_or(Error::NoRoute { destination: DestinationZone::new(caller.raw()) })?;
        let pass_through = PassThrough::create(
            forward,
            reverse,
            DestinationZone::new(destination.raw()),
            CallerZone::new(caller.raw()),
            optimistic,
        )
        .await?;

        let mut table = self.pass_throughs.write();
        let entry = table.entry(key).or_insert_with(|| Arc::clone(&pass_through));
        Ok(Arc::clone(entry))
    }

    /// Probe a locally hosted object for an interface.
    pub fn dispatch_try_cast(&self, object: ObjectId, interface: InterfaceOrdinal) -> Result<InterfaceOrdinal> {
        let stub = self.find_stub(object).ok_or(Error::ObjectNotFound { zone: self.zone, object })?;
        stub.try_cast(interface).ok_or(Error::UnknownInterface { object, interface })
    }

    /// Dispatch an inbound method call (`send`) against a locally
    /// hosted object. Calls destined elsewhere are expected to be
    /// routed by the transport layer before reaching the service.
    pub fn dispatch_call(&self, object: ObjectId, interface: InterfaceOrdinal, method: Method, input: &[u8]) -> Result<Vec<u8>> {
        let stub = self.find_stub(object).ok_or(Error::ObjectNotFound { zone: self.zone, object })?;
        stub.invoke(interface, method, input)
    }

    /// Broadcast that this zone is terminating (§4.1 expansion). Every
    /// live observer (service proxies, pass-throughs) is expected to
    /// treat its peer as gone.
    pub fn begin_terminating(&self) {
        if self.terminated.swap(true, AtomicOrdering::AcqRel) {
            return;
        }
        info!(zone = %self.zone, "zone terminating");
        let _ = self.terminating.send(ZoneTerminating { zone: self.zone });
        for service_proxy in self.service_proxies.read().values() {
            service_proxy.mark_disconnected();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Encoding;
    use crate::identity::KnownDirectionZone;
    use crate::interface::Interface;
    use crate::scheduler::Scheduler;
    use crate::transport::TransportState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Noop;
    impl Interface for Noop {
        fn interface_ordinal(&self) -> InterfaceOrdinal {
            InterfaceOrdinal::new(1)
        }
        fn dispatch(&self, _method: Method, input: &[u8]) -> Result<Vec<u8>> {
            Ok(input.to_vec())
        }
    }

    struct CountingTransport {
        shared: AtomicU64,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn send(
            &self,
            _e: Encoding,
            _t: TransactionId,
            _d: DestinationZone,
            _o: ObjectId,
            _i: InterfaceOrdinal,
            _m: Method,
            input: &[u8],
        ) -> Result<Vec<u8>> {
            Ok(input.to_vec())
        }
        async fn post(&self, _e: Encoding, _d: DestinationZone, _o: ObjectId, _i: InterfaceOrdinal, _m: Method, _input: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn try_cast(&self, _t: TransactionId, _d: DestinationZone, object: ObjectId, interface: InterfaceOrdinal) -> Result<InterfaceOrdinal> {
            Err(Error::UnknownInterface { object, interface })
        }
        async fn add_ref(
            &self,
            _t: TransactionId,
            _d: DestinationZone,
            _o: ObjectId,
            _c: CallerZone,
            options: AddRefOptions,
            _k: Option<KnownDirectionZone>,
        ) -> Result<u64> {
            if options.optimistic {
                Ok(0)
            } else {
                Ok(self.shared.fetch_add(1, Ordering::SeqCst) + 1)
            }
        }
        async fn release(
            &self,
            _t: TransactionId,
            _d: DestinationZone,
            _o: ObjectId,
            _c: CallerZone,
            options: AddRefOptions,
            _k: Option<KnownDirectionZone>,
        ) -> Result<u64> {
            if options.optimistic {
                Ok(0)
            } else {
                Ok(self.shared.fetch_sub(1, Ordering::SeqCst) - 1)
            }
        }
        async fn handshake(&self, local: RootDescriptor) -> Result<RootDescriptor> {
            Ok(local)
        }
        fn state(&self) -> TransportState {
            TransportState::Connected
        }
    }

    fn transport() -> Arc<dyn Transport> {
        Arc::new(CountingTransport { shared: AtomicU64::new(0) })
    }

    fn service(zone: u64) -> Arc<Service> {
        Service::new(format!("zone-{zone}"), Zone::new(zone), Arc::new(Scheduler::current()))
    }

    #[tokio::test]
    async fn register_stub_allocates_distinct_nonzero_ids() {
        let service = service(1);
        let mut table_a = MethodTable::new();
        table_a.add(Box::new(Noop));
        let mut table_b = MethodTable::new();
        table_b.add(Box::new(Noop));
        let a = service.register_stub(service.generate_new_object_id(), table_a).unwrap();
        let b = service.register_stub(service.generate_new_object_id(), table_b).unwrap();
        assert_ne!(a.object(), b.object());
        assert!(a.object().is_some());
    }

    #[tokio::test]
    async fn register_stub_rejects_duplicate_object_id() {
        let service = service(1);
        let object = service.generate_new_object_id();
        let mut table_a = MethodTable::new();
        table_a.add(Box::new(Noop));
        let mut table_b = MethodTable::new();
        table_b.add(Box::new(Noop));
        service.register_stub(object, table_a).unwrap();
        let err = service.register_stub(object, table_b).unwrap_err();
        assert!(matches!(err, Error::DuplicateObject { .. }));
    }

    #[tokio::test]
    async fn dispatch_add_ref_local_object_bumps_stub() {
        let service = service(1);
        let mut table = MethodTable::new();
        table.add(Box::new(Noop));
        let stub = service.register_stub(service.generate_new_object_id(), table).unwrap();
        let caller = CallerZone::new(9);
        let count = service
            .dispatch_add_ref(TransactionId::new(1), DestinationZone::new(1), stub.object(), caller, AddRefOptions::PLAIN, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(stub.shared_count_for(caller), 1);
    }

    #[tokio::test]
    async fn dispatch_add_ref_unknown_destination_has_no_route() {
        let service = service(1);
        let err = service
            .dispatch_add_ref(
                TransactionId::new(1),
                DestinationZone::new(5),
                ObjectId::new(1),
                CallerZone::new(2),
                AddRefOptions::PLAIN,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoRoute { .. }));
    }

    #[tokio::test]
    async fn dispatch_add_ref_falls_back_to_known_direction_hint() {
        // Zone 1 has no direct service proxy toward zone 5, but holds
        // one toward zone 3 which it has been told is the next hop
        // toward zone 5 (§4.1 step 3 of the routing decision).
        let service = service(1);
        service.attach_remote_zone(Zone::new(3), transport(), |root| root);

        let count = service
            .dispatch_add_ref(
                TransactionId::new(1),
                DestinationZone::new(5),
                ObjectId::new(1),
                CallerZone::new(2),
                AddRefOptions::PLAIN,
                Some(KnownDirectionZone::new(3)),
            )
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn relay_add_ref_creates_single_pass_through_for_zone_pair() {
        let service = service(2);
        service.attach_remote_zone(Zone::new(3), transport(), |root| root);
        service.attach_remote_zone(Zone::new(1), transport(), |root| root);

        let caller = CallerZone::new(1);
        let destination = DestinationZone::new(3);
        let relay = AddRefOptions { route: RouteOptions::Relay, optimistic: false };

        service
            .dispatch_add_ref(TransactionId::new(1), destination, ObjectId::new(10), caller, relay, None)
            .await
            .unwrap();
        service
            .dispatch_add_ref(TransactionId::new(2), destination, ObjectId::new(11), caller, relay, None)
            .await
            .unwrap();

        assert_eq!(service.pass_throughs.read().len(), 1);
        let pass_through = service.pass_throughs.read().values().next().unwrap().clone();
        assert_eq!(pass_through.shared(), 2);
    }

    #[tokio::test]
    async fn relay_round_trip_leaves_pass_through_table_empty() {
        // Property 4 of §8: a pass-through created for a relayed
        // add_ref must be torn down and removed once the matching
        // relay release brings it back to zero.
        let service = service(2);
        service.attach_remote_zone(Zone::new(3), transport(), |root| root);
        service.attach_remote_zone(Zone::new(1), transport(), |root| root);

        let caller = CallerZone::new(1);
        let destination = DestinationZone::new(3);
        let relay = AddRefOptions { route: RouteOptions::Relay, optimistic: false };
        let object = ObjectId::new(10);

        service
            .dispatch_add_ref(TransactionId::new(1), destination, object, caller, relay, None)
            .await
            .unwrap();
        assert_eq!(service.pass_throughs.read().len(), 1);

        service
            .dispatch_release(TransactionId::new(2), destination, object, caller, relay, None)
            .await
            .unwrap();

        assert!(service.pass_throughs.read().is_empty());
    }

    #[tokio::test]
    async fn relay_back_to_owning_zone_skips_pass_through() {
        // Y-topology: zone 2 is parent of zones 1 and 3. A relay
        // add_ref that names zone 2 itself as the destination is a
        // no-op relay back to the object's owner, not a forward hop —
        // §8 invariant: no pass-through should be created for it.
        let service = service(2);
        let mut table = MethodTable::new();
        table.add(Box::new(Noop));
        let stub = service.register_stub(service.generate_new_object_id(), table).unwrap();

        let caller = CallerZone::new(1);
        let destination = DestinationZone::new(2);
        let relay = AddRefOptions { route: RouteOptions::Relay, optimistic: false };

        let count = service
            .dispatch_add_ref(TransactionId::new(1), destination, stub.object(), caller, relay, None)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(stub.shared_count_for(caller), 1);
        assert!(service.pass_throughs.read().is_empty());
    }

    #[tokio::test]
    async fn begin_terminating_marks_service_proxies_down() {
        let service = service(1);
        let service_proxy = service.attach_remote_zone(Zone::new(2), transport(), |root| root);
        assert!(service_proxy.is_operational());
        service.begin_terminating();
        assert!(!service_proxy.is_operational());
    }

    #[tokio::test]
    async fn begin_terminating_is_idempotent() {
        let service = service(1);
        service.begin_terminating();
        assert!(service.is_terminated());
        service.begin_terminating();
        assert!(service.is_terminated());
    }

    #[tokio::test]
    async fn releasing_last_stub_reference_unregisters_it_and_broadcasts_terminating() {
        let service = service(1);
        let mut table = MethodTable::new();
        table.add(Box::new(Noop));
        let stub = service.register_stub(service.generate_new_object_id(), table).unwrap();
        let mut terminating = service.subscribe_terminating();
        let caller = CallerZone::new(9);

        service
            .dispatch_add_ref(TransactionId::new(1), DestinationZone::new(1), stub.object(), caller, AddRefOptions::PLAIN, None)
            .await
            .unwrap();
        service
            .dispatch_release(TransactionId::new(2), DestinationZone::new(1), stub.object(), caller, AddRefOptions::PLAIN, None)
            .await
            .unwrap();

        assert!(service.find_stub(stub.object()).is_none());
        assert!(service.is_terminated());
        terminating.try_recv().expect("zone_terminating broadcast");
    }
}

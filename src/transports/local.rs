//! # Local (in-process) transport
//!
//! A loopback [`Transport`] connecting two [`Service`]s living in the
//! same process over `tokio::mpsc` channels, mirroring the
//! connection-task/message-loop shape of a real transport (one
//! background task per direction, draining a channel, replying through
//! a correlated one-shot) without any actual I/O. Every call still
//! round-trips its payload through [`Envelope::encode`]/[`decode`] so
//! the framing layer is exercised the same way a socket transport
//! would exercise it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ZoneConfig;
use crate::envelope::{Direction, Envelope};
use crate::error::{Error, Result};
use crate::identity::{
    CallerZone, DestinationZone, InterfaceOrdinal, KnownDirectionZone, Method, ObjectId, TransactionId, Zone,
};
use crate::options::AddRefOptions;
use crate::service::Service;
use crate::transport::{RootDescriptor, Transport, TransportObserver, TransportState};

enum Job {
    Send { object: ObjectId, interface: InterfaceOrdinal, method: Method, payload: Vec<u8>, reply: oneshot::Sender<Result<Vec<u8>>> },
    Post { object: ObjectId, interface: InterfaceOrdinal, method: Method, payload: Vec<u8> },
    TryCast { object: ObjectId, interface: InterfaceOrdinal, reply: oneshot::Sender<Result<InterfaceOrdinal>> },
    AddRef {
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
        reply: oneshot::Sender<Result<u64>>,
    },
    Release {
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
        reply: oneshot::Sender<Result<u64>>,
    },
    Handshake { local: RootDescriptor, reply: oneshot::Sender<Result<RootDescriptor>> },
}

/// Loopback transport: one half of a pair built by [`LocalTransport::pair`].
pub struct LocalTransport {
    destination: DestinationZone,
    jobs: mpsc::UnboundedSender<Job>,
    state: RwLock<TransportState>,
    sequence: AtomicU64,
    call_timeout: Option<Duration>,
}

impl LocalTransport {
    /// Build a connected pair of transports between `service_a` and
    /// `service_b` using [`ZoneConfig::default`]. Returns `(to_b, to_a)`
    /// — `service_a`'s handle for reaching `service_b` first, then
    /// `service_b`'s handle for reaching `service_a` — so callers read
    /// it as "my transport, the other side's transport". Neither side
    /// ever touches the other's internals directly, matching the
    /// contract a remote transport would enforce.
    pub fn pair(service_a: &Arc<Service>, service_b: &Arc<Service>) -> (Arc<LocalTransport>, Arc<LocalTransport>) {
        Self::pair_with_config(service_a, service_b, &ZoneConfig::default())
    }

    /// As [`Self::pair`], but honouring `config`'s per-call timeout
    /// (§5 expansion: `call_timeout` governs every `send` on the
    /// resulting pair via `tokio::time::timeout`).
    pub fn pair_with_config(
        service_a: &Arc<Service>,
        service_b: &Arc<Service>,
        config: &ZoneConfig,
    ) -> (Arc<LocalTransport>, Arc<LocalTransport>) {
        let (tx_to_b, rx_to_b) = mpsc::unbounded_channel();
        let (tx_to_a, rx_to_a) = mpsc::unbounded_channel();

        spawn_worker(Arc::downgrade(service_b), rx_to_b);
        spawn_worker(Arc::downgrade(service_a), rx_to_a);

        let to_b = Arc::new(LocalTransport {
            destination: DestinationZone::new(service_b.zone().raw()),
            jobs: tx_to_b,
            state: RwLock::new(TransportState::Connected),
            sequence: AtomicU64::new(0),
            call_timeout: config.call_timeout,
        });
        let to_a = Arc::new(LocalTransport {
            destination: DestinationZone::new(service_a.zone().raw()),
            jobs: tx_to_a,
            state: RwLock::new(TransportState::Connected),
            sequence: AtomicU64::new(0),
            call_timeout: config.call_timeout,
        });

        spawn_termination_watcher(service_b, Arc::clone(&to_b));
        spawn_termination_watcher(service_a, Arc::clone(&to_a));

        // `to_b` is the handle that reaches `service_b`; callers treat
        // `pair(a, b)`'s first return value as "my way to reach the
        // other side", so the side dispatching into `b` comes first.
        (to_b, to_a)
    }

    fn frame(&self, direction: Direction, payload: &[u8]) -> Vec<u8> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        Envelope::new(1, direction, sequence, payload.to_vec()).encode()
    }

    fn down(&self) -> Error {
        *self.state.write() = TransportState::Disconnected;
        Error::TransportDown { destination: self.destination }
    }
}

/// Watch `service`'s termination broadcast (§4.1 expansion) and fold a
/// `zone_terminating` event into `transport`'s own `TransportObserver`
/// upcall — the mechanism by which a peer's shutdown becomes visible
/// on this side of an in-process pair without either side reaching
/// into the other's internals.
fn spawn_termination_watcher(service: &Arc<Service>, transport: Arc<LocalTransport>) {
    let mut terminating = service.subscribe_terminating();
    tokio::spawn(async move {
        if let Ok(event) = terminating.recv().await {
            transport.on_zone_terminating(event.zone);
        }
    });
}

fn spawn_worker(service: Weak<Service>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let Some(service) = service.upgrade() else {
                warn!("local transport worker has no live peer service, dropping job");
                continue;
            };
            match job {
                Job::Send { object, interface, method, payload, reply } => {
                    let result = service.dispatch_call(object, interface, method, &payload);
                    let _ = reply.send(result);
                }
                Job::Post { object, interface, method, payload } => {
                    if let Err(error) = service.dispatch_call(object, interface, method, &payload) {
                        debug!(%object, %error, "local transport dropped one-way delivery");
                    }
                }
                Job::TryCast { object, interface, reply } => {
                    let _ = reply.send(service.dispatch_try_cast(object, interface));
                }
                Job::AddRef { object, caller, options, known_direction, reply } => {
                    let result = service
                        .dispatch_add_ref(
                            TransactionId::new(0),
                            DestinationZone::new(service.zone().raw()),
                            object,
                            caller,
                            options,
                            known_direction,
                        )
                        .await;
                    let _ = reply.send(result);
                }
                Job::Release { object, caller, options, known_direction, reply } => {
                    let result = service
                        .dispatch_release(
                            TransactionId::new(0),
                            DestinationZone::new(service.zone().raw()),
                            object,
                            caller,
                            options,
                            known_direction,
                        )
                        .await;
                    let _ = reply.send(result);
                }
                Job::Handshake { local, reply } => {
                    let _ = reply.send(service.dispatch_handshake(local));
                }
            }
        }
    });
}

#[async_trait]
impl Transport for LocalTransport {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn send(
        &self,
        _encoding: crate::envelope::Encoding,
        _transaction: TransactionId,
        _destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: Method,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        let framed = self.frame(Direction::SendRequest, input);
        let envelope = Envelope::decode(&framed).map_err(|_| Error::ProxyDeserialisationError { object })?;
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Send { object, interface, method, payload: envelope.payload, reply })
            .map_err(|_| self.down())?;
        match self.call_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received.map_err(|_| self.down())?,
                Err(_) => Err(Error::Timeout { destination: self.destination }),
            },
            None => rx.await.map_err(|_| self.down())?,
        }
    }

    async fn post(
        &self,
        _encoding: crate::envelope::Encoding,
        _destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: Method,
        input: &[u8],
    ) -> Result<()> {
        let framed = self.frame(Direction::Post, input);
        let envelope = Envelope::decode(&framed).map_err(|_| Error::ProxyDeserialisationError { object })?;
        self.jobs
            .send(Job::Post { object, interface, method, payload: envelope.payload })
            .map_err(|_| self.down())
    }

    async fn try_cast(
        &self,
        _transaction: TransactionId,
        _destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
    ) -> Result<InterfaceOrdinal> {
        let (reply, rx) = oneshot::channel();
        self.jobs.send(Job::TryCast { object, interface, reply }).map_err(|_| self.down())?;
        rx.await.map_err(|_| self.down())?
    }

    async fn add_ref(
        &self,
        _transaction: TransactionId,
        _destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.jobs.send(Job::AddRef { object, caller, options, known_direction, reply }).map_err(|_| self.down())?;
        rx.await.map_err(|_| self.down())?
    }

    async fn release(
        &self,
        _transaction: TransactionId,
        _destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.jobs.send(Job::Release { object, caller, options, known_direction, reply }).map_err(|_| self.down())?;
        rx.await.map_err(|_| self.down())?
    }

    async fn handshake(&self, local: RootDescriptor) -> Result<RootDescriptor> {
        let (reply, rx) = oneshot::channel();
        self.jobs.send(Job::Handshake { local, reply }).map_err(|_| self.down())?;
        rx.await.map_err(|_| self.down())?
    }

    fn state(&self) -> TransportState {
        *self.state.read()
    }
}

impl TransportObserver for LocalTransport {
    fn on_transport_down(&self) {
        *self.state.write() = TransportState::Disconnected;
    }

    fn on_zone_terminating(&self, peer_zone: Zone) {
        debug!(peer = %peer_zone, destination = %self.destination, "peer zone terminating, marking transport disconnected");
        *self.state.write() = TransportState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{Interface, MethodTable};
    use crate::scheduler::Scheduler;

    struct Echo;
    impl Interface for Echo {
        fn interface_ordinal(&self) -> InterfaceOrdinal {
            InterfaceOrdinal::new(1)
        }
        fn dispatch(&self, _method: Method, input: &[u8]) -> Result<Vec<u8>> {
            Ok(input.to_vec())
        }
    }

    fn service(name: &str, zone: u64) -> Arc<Service> {
        Service::new(name, Zone::new(zone), Arc::new(Scheduler::current()))
    }

    #[tokio::test]
    async fn send_round_trips_through_worker_task() {
        let service_a = service("a", 1);
        let service_b = service("b", 2);
        let mut table = MethodTable::new();
        table.add(Box::new(Echo));
        let stub = service_b.register_stub(service_b.generate_new_object_id(), table).unwrap();

        let (to_b, _to_a) = LocalTransport::pair(&service_a, &service_b);
        let response = to_b
            .send(
                crate::envelope::Encoding::YasBinary,
                TransactionId::new(1),
                DestinationZone::new(2),
                stub.object(),
                InterfaceOrdinal::new(1),
                Method::new(0),
                b"hello",
            )
            .await
            .unwrap();
        assert_eq!(response, b"hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn send_past_call_timeout_surfaces_timeout_error() {
        struct Slow;
        impl Interface for Slow {
            fn interface_ordinal(&self) -> InterfaceOrdinal {
                InterfaceOrdinal::new(1)
            }
            fn dispatch(&self, _method: Method, input: &[u8]) -> Result<Vec<u8>> {
                std::thread::sleep(Duration::from_millis(50));
                Ok(input.to_vec())
            }
        }

        let service_a = service("a", 1);
        let service_b = service("b", 2);
        let mut table = MethodTable::new();
        table.add(Box::new(Slow));
        let stub = service_b.register_stub(service_b.generate_new_object_id(), table).unwrap();

        let config = ZoneConfig { call_timeout: Some(Duration::from_millis(5)), ..ZoneConfig::default() };
        let (to_b, _to_a) = LocalTransport::pair_with_config(&service_a, &service_b, &config);
        let err = to_b
            .send(
                crate::envelope::Encoding::YasBinary,
                TransactionId::new(1),
                DestinationZone::new(2),
                stub.object(),
                InterfaceOrdinal::new(1),
                Method::new(0),
                b"hi",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn add_ref_across_pair_bumps_remote_stub() {
        let service_a = service("a", 1);
        let service_b = service("b", 2);
        let mut table = MethodTable::new();
        table.add(Box::new(Echo));
        let stub = service_b.register_stub(service_b.generate_new_object_id(), table).unwrap();

        let (to_b, _to_a) = LocalTransport::pair(&service_a, &service_b);
        let count = to_b
            .add_ref(TransactionId::new(1), DestinationZone::new(2), stub.object(), CallerZone::new(1), AddRefOptions::PLAIN, None)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(stub.shared_count_for(CallerZone::new(1)), 1);
    }

    #[tokio::test]
    async fn dropping_peer_service_surfaces_transport_down() {
        let service_a = service("a", 1);
        let service_b = service("b", 2);
        let (to_b, _to_a) = {
            let (to_b, to_a) = LocalTransport::pair(&service_a, &service_b);
            (to_b, to_a)
        };
        drop(service_b);
        let err = to_b
            .try_cast(TransactionId::new(1), DestinationZone::new(2), ObjectId::new(1), InterfaceOrdinal::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportDown { .. }));
    }

    #[tokio::test]
    async fn peer_zone_terminating_marks_transport_disconnected() {
        let service_a = service("a", 1);
        let service_b = service("b", 2);
        let (to_b, _to_a) = LocalTransport::pair(&service_a, &service_b);
        assert_eq!(to_b.state(), TransportState::Connected);

        service_b.begin_terminating();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(to_b.state(), TransportState::Disconnected);
    }
}

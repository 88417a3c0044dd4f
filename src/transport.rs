//! # Transport contract
//!
//! The abstract capability a [`crate::service_proxy::ServiceProxy`]
//! depends on (§4.8). The core never inspects wire bytes; it drives a
//! transport through this trait and lets the transport decide how
//! `send`/`post`/`try_cast`/`add_ref`/`release` actually move bytes
//! (in-process channel, shared-memory ring, TCP, enclave entry/exit,
//! ...). Exactly one concrete implementation, [`crate::transports::local`],
//! ships in this crate as a reference/test transport.

use async_trait::async_trait;

use crate::envelope::Encoding;
use crate::error::Result;
use crate::identity::{CallerZone, DestinationZone, InterfaceOrdinal, KnownDirectionZone, ObjectId, TransactionId};
use crate::options::AddRefOptions;

/// Connection status machine (§4.8): `Connecting -> Connected ->
/// {Disconnected, Reconnecting -> Connected | Disconnected}`.
/// `Disconnected` is terminal for a given transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl TransportState {
    /// `Disconnected` is terminal; every other state may still reach
    /// `Connected`.
    pub fn is_operational(self) -> bool {
        matches!(self, TransportState::Connected)
    }
}

/// Upcalls a transport reacts to for its own connection lifecycle and
/// for the peer zone's lifecycle (§4.8, §7's required `zone_terminating`
/// broadcast). Implemented by the transport itself — e.g.
/// [`crate::transports::local::LocalTransport`] — rather than by
/// [`crate::service::Service`], so a concrete transport can fold a
/// peer's termination into its own `TransportState` without the
/// service reaching back into transport internals.
pub trait TransportObserver: Send + Sync {
    /// An object's last reference through this transport was released.
    fn on_object_released(&self, object: ObjectId) {
        let _ = object;
    }

    /// The transport has entered a terminal `Disconnected` state.
    fn on_transport_down(&self);

    /// The peer zone is terminating (§7, the required
    /// `zone_terminating` broadcast).
    fn on_zone_terminating(&self, peer_zone: crate::identity::Zone) {
        let _ = peer_zone;
    }
}

/// What one side of a zone connection publishes as its root object:
/// the object id and the interface ordinal it answers for. Exchanged
/// by [`Transport::handshake`] when a zone connects to another (§4.1,
/// the `init_channel` handshake of §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootDescriptor {
    pub object: ObjectId,
    pub interface: InterfaceOrdinal,
}

/// The per-destination transport capability every service proxy and
/// pass-through is built on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection; becomes `Connected` or fails.
    async fn connect(&self) -> Result<()>;

    /// Request/response: suspends until the peer replies or the
    /// transport fails.
    async fn send(
        &self,
        encoding: Encoding,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: crate::identity::Method,
        input: &[u8],
    ) -> Result<Vec<u8>>;

    /// Fire-and-forget: completes once the bytes are handed to the
    /// underlying I/O primitive, with no further delivery guarantee.
    async fn post(
        &self,
        encoding: Encoding,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
        method: crate::identity::Method,
        input: &[u8],
    ) -> Result<()>;

    /// Cheap interface probe; does not change ref counts (§4.5).
    async fn try_cast(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        interface: InterfaceOrdinal,
    ) -> Result<InterfaceOrdinal>;

    /// Bump the peer stub's ref count for `object` (§4.5).
    async fn add_ref(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64>;

    /// Decrement the peer stub's ref count for `object` (§4.5).
    async fn release(
        &self,
        transaction: TransactionId,
        destination: DestinationZone,
        object: ObjectId,
        caller: CallerZone,
        options: AddRefOptions,
        known_direction: Option<KnownDirectionZone>,
    ) -> Result<u64>;

    /// Exchange root-object descriptors while establishing a
    /// connection (§4.1's `connect_to_zone`/`attach_remote_zone`
    /// handshake): hand the peer `local`, and learn what it publishes
    /// back.
    async fn handshake(&self, local: RootDescriptor) -> Result<RootDescriptor>;

    /// Current status of this transport instance.
    fn state(&self) -> TransportState;

    /// `true` iff [`Self::state`] is `Connected`.
    fn is_operational(&self) -> bool {
        self.state().is_operational()
    }
}

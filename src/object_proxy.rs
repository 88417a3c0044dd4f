//! # Object proxy
//!
//! In a remote zone, the local representation of one remote object
//! (§3, §4.3). An object proxy's own lifetime is governed by ordinary
//! Rust reference counting (`Arc<ObjectProxy>`): the last strong
//! reference being dropped is the "last local release" the spec
//! describes, and triggers a wire `release` against the home zone.

use std::sync::Weak;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::{DestinationZone, InterfaceOrdinal, Method, ObjectId, TransactionId};
use crate::options::AddRefOptions;
use crate::service_proxy::ServiceProxy;

/// The remote zone's local handle for an object that lives elsewhere.
pub struct ObjectProxy {
    destination: DestinationZone,
    object: ObjectId,
    service_proxy: Weak<ServiceProxy>,
    cache: Mutex<Vec<InterfaceOrdinal>>,
}

impl ObjectProxy {
    pub(crate) fn new(destination: DestinationZone, object: ObjectId, service_proxy: Weak<ServiceProxy>) -> Self {
        Self { destination, object, service_proxy, cache: Mutex::new(Vec::new()) }
    }

    /// The zone this proxy's object lives in.
    pub fn destination_zone(&self) -> DestinationZone {
        self.destination
    }

    /// The remote object id this proxy represents.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    fn service_proxy(&self) -> Result<std::sync::Arc<ServiceProxy>> {
        self.service_proxy.upgrade().ok_or(Error::NotOperational { context: "service proxy dropped" })
    }

    /// Probe for an interface, first against the local cache, then
    /// (on miss) by dispatching `try_cast` over the wire. A positive
    /// response is cached but does **not** bump the object proxy's
    /// ref count — the facet shares the proxy's own lifetime (§4.3).
    pub async fn query_interface(&self, interface: InterfaceOrdinal) -> Result<Option<InterfaceOrdinal>> {
        if self.cache.lock().contains(&interface) {
            return Ok(Some(interface));
        }
        let service_proxy = self.service_proxy()?;
        let transaction = service_proxy.next_transaction();
        match service_proxy.try_cast(transaction, self.destination, self.object, interface).await? {
            Some(supported) => {
                self.cache.lock().push(supported);
                Ok(Some(supported))
            }
            None => Ok(None),
        }
    }

    /// Invoke a method against the remote object. Synchronous from the
    /// caller's perspective (the runtime drives the suspension),
    /// carrying a per-call transaction id allocated by the service
    /// proxy (§4.3).
    pub async fn invoke(&self, interface: InterfaceOrdinal, method: Method, input: &[u8]) -> Result<Vec<u8>> {
        let service_proxy = self.service_proxy()?;
        let transaction = service_proxy.next_transaction();
        service_proxy.send(transaction, self.destination, self.object, interface, method, input).await
    }

    fn next_transaction_for_release(&self) -> TransactionId {
        TransactionId::new(0)
    }
}

impl Drop for ObjectProxy {
    fn drop(&mut self) {
        let Some(service_proxy) = self.service_proxy.upgrade() else { return };
        let object = self.object;
        let transaction = self.next_transaction_for_release();
        debug!(%object, "object proxy dropped, scheduling wire release");
        let handle = service_proxy.runtime_handle();
        handle.spawn(async move {
            let _ = service_proxy.release(transaction, object, AddRefOptions::PLAIN).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_interface_without_live_service_proxy_fails_not_operational() {
        let proxy = ObjectProxy::new(DestinationZone::new(2), ObjectId::new(1), Weak::new());
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let err = rt.block_on(proxy.query_interface(InterfaceOrdinal::new(1))).unwrap_err();
        assert!(matches!(err, Error::NotOperational { .. }));
    }
}

//! # Dispatch-table abstraction
//!
//! Stand-in for generated IDL glue (§4.3 expansion, §9's "dynamic
//! dispatch" design note): a native object that wants to be remotely
//! callable implements one [`Interface`] per facet it exposes. Stubs
//! and object proxies walk a `Vec<Box<dyn Interface>>` by ordinal
//! rather than through inheritance. The IDL compiler that would
//! generate this glue from a schema is out of scope (§1).

use crate::error::{Error, Result};
use crate::identity::{InterfaceOrdinal, Method, ObjectId};

/// One callable facet of an object.
pub trait Interface: Send + Sync {
    /// The ordinal this facet answers to.
    fn interface_ordinal(&self) -> InterfaceOrdinal;

    /// Invoke `method` with the given request bytes, returning the
    /// response bytes. Implementations own their own (de)serialization;
    /// the core never inspects either side of this boundary.
    fn dispatch(&self, method: Method, input: &[u8]) -> Result<Vec<u8>>;
}

/// The set of interfaces one stub exposes, queried by ordinal.
#[derive(Default)]
pub struct MethodTable {
    facets: Vec<Box<dyn Interface>>,
}

impl MethodTable {
    /// An empty table.
    pub fn new() -> Self {
        Self { facets: Vec::new() }
    }

    /// Register a facet. An object may expose multiple interfaces
    /// (§3), each added once.
    pub fn add(&mut self, facet: Box<dyn Interface>) {
        self.facets.push(facet);
    }

    /// Look up a facet by ordinal.
    pub fn find(&self, ordinal: InterfaceOrdinal) -> Option<&dyn Interface> {
        self.facets
            .iter()
            .find(|facet| facet.interface_ordinal() == ordinal)
            .map(|facet| facet.as_ref())
    }

    /// `try_cast`: does the table support this ordinal? Returns the
    /// ordinal itself on success, mirroring the wire contract's
    /// "returns the interface ordinal the peer actually supports".
    pub fn try_cast(&self, ordinal: InterfaceOrdinal) -> Option<InterfaceOrdinal> {
        self.find(ordinal).map(|facet| facet.interface_ordinal())
    }

    /// Dispatch a call, translating a missing facet into
    /// [`Error::UnknownInterface`].
    pub fn dispatch(
        &self,
        object: ObjectId,
        ordinal: InterfaceOrdinal,
        method: Method,
        input: &[u8],
    ) -> Result<Vec<u8>> {
        self.find(ordinal)
            .ok_or(Error::UnknownInterface { object, interface: ordinal })?
            .dispatch(method, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(InterfaceOrdinal);

    impl Interface for Echo {
        fn interface_ordinal(&self) -> InterfaceOrdinal {
            self.0
        }

        fn dispatch(&self, _method: Method, input: &[u8]) -> Result<Vec<u8>> {
            Ok(input.to_vec())
        }
    }

    #[test]
    fn finds_registered_facet_by_ordinal() {
        let mut table = MethodTable::new();
        table.add(Box::new(Echo(InterfaceOrdinal::new(7))));
        assert!(table.find(InterfaceOrdinal::new(7)).is_some());
        assert!(table.find(InterfaceOrdinal::new(8)).is_none());
    }

    #[test]
    fn dispatch_reports_unknown_interface() {
        let table = MethodTable::new();
        let err = table
            .dispatch(ObjectId::new(1), InterfaceOrdinal::new(1), Method::new(0), &[])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInterface { .. }));
    }

    #[test]
    fn try_cast_returns_supported_ordinal() {
        let mut table = MethodTable::new();
        table.add(Box::new(Echo(InterfaceOrdinal::new(3))));
        assert_eq!(table.try_cast(InterfaceOrdinal::new(3)), Some(InterfaceOrdinal::new(3)));
        assert_eq!(table.try_cast(InterfaceOrdinal::new(4)), None);
    }
}

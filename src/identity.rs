//! # Identity values
//!
//! Strongly-typed wrappers over the 64-bit ids that flow through the
//! runtime. Every identity is opaque outside its own namespace; the
//! distinct newtypes exist so that, for example, a `Zone` can never be
//! silently passed where an `ObjectId` is expected, even though both
//! are backed by a plain `u64`.
//!
//! Value `0` is reserved for "none" on every one of these types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! id_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u64);

        impl $name {
            /// The reserved "no value" sentinel.
            pub const NONE: Self = Self(0);

            /// Wrap a raw 64-bit id.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw 64-bit value.
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// `true` unless this is the reserved [`Self::NONE`] sentinel.
            pub const fn is_some(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(Zone, "The zone a service actually lives in.");
id_newtype!(DestinationZone, "The final recipient zone of a message.");
id_newtype!(CallerZone, "The zone that originated a message.");
id_newtype!(
    KnownDirectionZone,
    "A routing hint naming the next hop toward a destination in a multi-hop topology."
);
id_newtype!(ObjectId, "A stub-addressable target, unique within its home zone.");
id_newtype!(
    InterfaceOrdinal,
    "Identifies one callable facet of an object, derived from an IDL fingerprint plus protocol version."
);
id_newtype!(Method, "A method index within an interface's dispatch table.");
id_newtype!(TransactionId, "Per-call correlation id allocated by a service proxy.");

/// Monotonically increasing id allocator.
///
/// Used for object ids, zone ids and transaction ids alike: all three
/// share the invariant that a value is handed out once, never zero,
/// and never reused for the lifetime of the allocator.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator whose first `allocate()` call returns `1`.
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Hand out the next id in the sequence. Never returns `0`.
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_sentinel_is_zero() {
        assert_eq!(Zone::NONE.raw(), 0);
        assert!(!Zone::NONE.is_some());
        assert!(Zone::new(1).is_some());
    }

    #[test]
    fn allocator_is_monotonic_and_never_zero() {
        let alloc = IdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_ne!(a, 0);
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn distinct_newtypes_do_not_compare() {
        let object = ObjectId::new(5);
        let zone = Zone::new(5);
        // Compile-time property: `object == zone` would not type-check.
        assert_eq!(object.raw(), zone.raw());
    }
}

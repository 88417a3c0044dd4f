//! # Add-ref / release options
//!
//! The on-wire options byte is a bitfield (`build_destination_route =
//! 0x01`, `build_caller_route = 0x02`); the combination `0x03` is the
//! relay encoding described in §4.6 of the spec. Rather than pass a
//! raw `u8` around, the core represents it as a named variant plus an
//! independent optimistic bit, while still round-tripping to the exact
//! on-wire byte.

/// The four base route-building combinations an add-ref/release can
/// carry, named per the design note in §9 ("best expressed as a named
/// variant rather than a raw bitfield, while preserving the on-wire
/// encoding").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOptions {
    /// `0` — a plain refcount bump with no route effect.
    Plain,
    /// `1` — create/refresh the peer's knowledge that the caller can
    /// reach the destination via this link.
    DestinationRoute,
    /// `2` — create/refresh the peer's knowledge that the destination
    /// can reply to the caller via this link.
    CallerRoute,
    /// `3` — relay: both route-build bits set. Constructs or refreshes
    /// a pass-through in an intermediary zone (§4.6).
    Relay,
}

impl RouteOptions {
    const DESTINATION_BIT: u8 = 0x01;
    const CALLER_BIT: u8 = 0x02;

    fn from_bits(bits: u8) -> Self {
        match bits & (Self::DESTINATION_BIT | Self::CALLER_BIT) {
            0 => RouteOptions::Plain,
            Self::DESTINATION_BIT => RouteOptions::DestinationRoute,
            Self::CALLER_BIT => RouteOptions::CallerRoute,
            _ => RouteOptions::Relay,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            RouteOptions::Plain => 0,
            RouteOptions::DestinationRoute => Self::DESTINATION_BIT,
            RouteOptions::CallerRoute => Self::CALLER_BIT,
            RouteOptions::Relay => Self::DESTINATION_BIT | Self::CALLER_BIT,
        }
    }

    /// `true` for [`RouteOptions::Relay`], i.e. both route-build bits
    /// set — the encoding that creates or refreshes a pass-through.
    pub fn is_relay(self) -> bool {
        matches!(self, RouteOptions::Relay)
    }
}

/// Full decoded options value: the route-building variant plus the
/// independent optimistic bit (`0x04`, an expansion beyond the
/// distilled spec's bitfield — see §4.5 and §9's open-question
/// resolution) that asks the peer to bump/release the optimistic
/// count instead of the shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRefOptions {
    pub route: RouteOptions,
    pub optimistic: bool,
}

impl AddRefOptions {
    const OPTIMISTIC_BIT: u8 = 0x04;

    /// Plain shared-count bump, the default for a first lazy
    /// object-proxy creation in the non-relay direction.
    pub const PLAIN: Self = Self { route: RouteOptions::Plain, optimistic: false };

    /// Decode the on-wire options byte. Reserved bits above `0x07`
    /// are ignored rather than rejected, matching §6's "reserved bits
    /// must be zero, except for the expansion's optimistic bit".
    pub fn from_wire(byte: u8) -> Self {
        Self {
            route: RouteOptions::from_bits(byte),
            optimistic: byte & Self::OPTIMISTIC_BIT != 0,
        }
    }

    /// Encode back to the on-wire options byte.
    pub fn to_wire(self) -> u8 {
        let mut bits = self.route.to_bits();
        if self.optimistic {
            bits |= Self::OPTIMISTIC_BIT;
        }
        bits
    }

    /// Construct a relay options value, optionally optimistic.
    pub fn relay(optimistic: bool) -> Self {
        Self { route: RouteOptions::Relay, optimistic }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_round_trips_to_zero() {
        assert_eq!(AddRefOptions::PLAIN.to_wire(), 0);
        assert_eq!(AddRefOptions::from_wire(0), AddRefOptions::PLAIN);
    }

    #[test]
    fn relay_is_value_three() {
        let relay = AddRefOptions::relay(false);
        assert_eq!(relay.to_wire(), 3);
        assert!(relay.route.is_relay());
    }

    #[test]
    fn optimistic_bit_composes_with_relay() {
        let value = AddRefOptions::relay(true);
        assert_eq!(value.to_wire(), 0x07);
        let decoded = AddRefOptions::from_wire(0x07);
        assert_eq!(decoded, value);
        assert!(decoded.optimistic);
        assert!(decoded.route.is_relay());
    }

    #[test]
    fn each_route_bit_decodes_independently() {
        assert_eq!(RouteOptions::from_bits(1), RouteOptions::DestinationRoute);
        assert_eq!(RouteOptions::from_bits(2), RouteOptions::CallerRoute);
        assert_eq!(RouteOptions::from_bits(3), RouteOptions::Relay);
        assert_eq!(RouteOptions::from_bits(0), RouteOptions::Plain);
    }
}

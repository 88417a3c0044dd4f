//! Error types for the zone RPC core.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants (and
//! new entries in the vendor range starting at `0x8000`) without
//! breaking callers who match exhaustively today.

use crate::identity::{DestinationZone, InterfaceOrdinal, ObjectId, Zone};

/// Result type alias using the core's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of error codes the core can return, on the wire and
/// locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Success sentinel; not normally constructed as an [`Error`].
    Ok,
    /// No stub registered for the requested object in its home zone.
    ObjectNotFound,
    /// The object does not expose the requested interface ordinal.
    UnknownInterface,
    /// `register_stub` was called with an object id already in use.
    DuplicateObject,
    /// No service proxy, routing hint or pass-through could reach the
    /// destination zone.
    NoRoute,
    /// The transport paired with the relevant service proxy is not
    /// `CONNECTED`.
    TransportDown,
    /// A call's per-call or transport-level timeout expired.
    Timeout,
    /// A pending call was cancelled by its caller.
    Cancelled,
    /// The caller-side proxy could not deserialize a response payload.
    ProxyDeserialisationError,
    /// The home-side stub could not deserialize a request payload.
    StubDeserialisationError,
    /// Caller and callee negotiated encodings that are not compatible.
    IncompatibleSerialisation,
    /// The operation requires an operational service/service-proxy
    /// pairing that no longer exists.
    NotOperational,
    /// Reserved for vendor/application-defined extensions; numeric
    /// codes in this range start at `0x8000`.
    Vendor(u32),
}

impl ErrorCode {
    /// The numeric wire code for this variant.
    pub const fn as_u32(self) -> u32 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::ObjectNotFound => 1,
            ErrorCode::UnknownInterface => 2,
            ErrorCode::DuplicateObject => 3,
            ErrorCode::NoRoute => 4,
            ErrorCode::TransportDown => 5,
            ErrorCode::Timeout => 6,
            ErrorCode::Cancelled => 7,
            ErrorCode::ProxyDeserialisationError => 8,
            ErrorCode::StubDeserialisationError => 9,
            ErrorCode::IncompatibleSerialisation => 10,
            ErrorCode::NotOperational => 11,
            ErrorCode::Vendor(code) => 0x8000 + code,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Ok => write!(f, "ok"),
            ErrorCode::ObjectNotFound => write!(f, "object not found"),
            ErrorCode::UnknownInterface => write!(f, "unknown interface"),
            ErrorCode::DuplicateObject => write!(f, "duplicate object"),
            ErrorCode::NoRoute => write!(f, "no route"),
            ErrorCode::TransportDown => write!(f, "transport down"),
            ErrorCode::Timeout => write!(f, "timeout"),
            ErrorCode::Cancelled => write!(f, "cancelled"),
            ErrorCode::ProxyDeserialisationError => write!(f, "proxy deserialisation error"),
            ErrorCode::StubDeserialisationError => write!(f, "stub deserialisation error"),
            ErrorCode::IncompatibleSerialisation => write!(f, "incompatible serialisation"),
            ErrorCode::NotOperational => write!(f, "not operational"),
            ErrorCode::Vendor(code) => write!(f, "vendor error 0x{:x}", 0x8000 + code),
        }
    }
}

impl std::error::Error for ErrorCode {}

/// An error surfaced by the core, carrying whatever identifiers are
/// relevant to diagnosing it alongside the closed [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No stub for `object` in `zone`.
    #[error("object not found: zone={zone} object={object}")]
    ObjectNotFound { zone: Zone, object: ObjectId },

    /// `object` does not support `interface`.
    #[error("unknown interface: object={object} interface={interface}")]
    UnknownInterface { object: ObjectId, interface: InterfaceOrdinal },

    /// `register_stub` collided with an existing registration.
    #[error("duplicate object id: {object}")]
    DuplicateObject { object: ObjectId },

    /// Routing could not resolve `destination`.
    #[error("no route to destination zone {destination}")]
    NoRoute { destination: DestinationZone },

    /// The transport serving `destination` is not connected.
    #[error("transport down: destination={destination}")]
    TransportDown { destination: DestinationZone },

    /// A call against `destination` exceeded its timeout.
    #[error("call to {destination} timed out")]
    Timeout { destination: DestinationZone },

    /// A call against `destination` was cancelled by its caller.
    #[error("call to {destination} was cancelled")]
    Cancelled { destination: DestinationZone },

    /// Response payload for `object` could not be decoded.
    #[error("proxy could not deserialise response from object {object}")]
    ProxyDeserialisationError { object: ObjectId },

    /// Request payload for `object` could not be decoded.
    #[error("stub could not deserialise request for object {object}")]
    StubDeserialisationError { object: ObjectId },

    /// Negotiated encodings are incompatible between caller and callee.
    #[error("incompatible serialisation negotiated with zone {zone}")]
    IncompatibleSerialisation { zone: Zone },

    /// The operation required an operational pairing that does not
    /// exist (disconnected service proxy, terminated zone, ...).
    #[error("not operational: {context}")]
    NotOperational { context: &'static str },

    /// Vendor/application-defined error, numbered from `0x8000`.
    #[error("vendor error (code offset {code}): {message}")]
    Vendor { code: u32, message: String },
}

impl Error {
    /// The closed numeric code this error maps to on the wire.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            Error::UnknownInterface { .. } => ErrorCode::UnknownInterface,
            Error::DuplicateObject { .. } => ErrorCode::DuplicateObject,
            Error::NoRoute { .. } => ErrorCode::NoRoute,
            Error::TransportDown { .. } => ErrorCode::TransportDown,
            Error::Timeout { .. } => ErrorCode::Timeout,
            Error::Cancelled { .. } => ErrorCode::Cancelled,
            Error::ProxyDeserialisationError { .. } => ErrorCode::ProxyDeserialisationError,
            Error::StubDeserialisationError { .. } => ErrorCode::StubDeserialisationError,
            Error::IncompatibleSerialisation { .. } => ErrorCode::IncompatibleSerialisation,
            Error::NotOperational { .. } => ErrorCode::NotOperational,
            Error::Vendor { code, .. } => ErrorCode::Vendor(*code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_numeric_wire_value() {
        assert_eq!(ErrorCode::Ok.as_u32(), 0);
        assert_eq!(ErrorCode::NotOperational.as_u32(), 11);
        assert_eq!(ErrorCode::Vendor(1).as_u32(), 0x8001);
    }

    #[test]
    fn error_maps_to_expected_code() {
        let err = Error::NoRoute { destination: DestinationZone::new(3) };
        assert_eq!(err.code(), ErrorCode::NoRoute);
    }
}

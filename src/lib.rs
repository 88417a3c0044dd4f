//! # Zone RPC core
//!
//! A transport-agnostic runtime for calling objects across isolated
//! execution zones. The core never touches wire bytes or a concrete
//! transport itself — it drives the [`transport::Transport`] contract
//! and leaves codecs, IDL glue and real network/shared-memory
//! transports to external collaborators. Exactly one reference
//! transport, [`transports::local`], ships here for testing and for
//! the demo binary.

pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod hierarchical;
pub mod identity;
pub mod interface;
pub mod logging;
pub mod object_proxy;
pub mod options;
pub mod pass_through;
pub mod scheduler;
pub mod service;
pub mod service_proxy;
pub mod stub;
pub mod transport;
pub mod transports;

pub use cli::Args;
pub use config::ZoneConfig;
pub use error::{Error, ErrorCode, Result};
pub use hierarchical::{HierarchicalLink, LinkStatus, MemberRef};
pub use identity::{CallerZone, DestinationZone, InterfaceOrdinal, KnownDirectionZone, Method, ObjectId, TransactionId, Zone};
pub use interface::{Interface, MethodTable};
pub use object_proxy::ObjectProxy;
pub use options::{AddRefOptions, RouteOptions};
pub use pass_through::PassThrough;
pub use scheduler::Scheduler;
pub use service::Service;
pub use service_proxy::ServiceProxy;
pub use stub::Stub;
pub use transport::{RootDescriptor, Transport, TransportObserver, TransportState};
pub use transports::local::LocalTransport;

/// The current version of the crate, exposed for diagnostics the way
/// the teacher exposes its own `VERSION` constant.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Concrete [`crate::transport::Transport`] implementations shipped
//! with the core. Only [`local`] ships by default: a loopback transport
//! wiring two in-process [`crate::service::Service`]s together,
//! serving as both the reference implementation of the contract and
//! the harness the integration tests run the runtime scenarios over.

pub mod local;

//! # tether-core
//!
//! Connection session and message-delivery core for multiplexed WebSocket
//! endpoints.
//!
//! - **Session registry**: which live connection belongs to which endpoint
//! - **Envelopes**: `{protocol, message}` units multiplexed over one connection
//! - **Pending queues**: per-endpoint store-and-forward buffers, flushed on reconnect
//! - **Transmitters**: direct or queued unicast, best-effort broadcast
//! - **Dispatcher**: decode, validate and route inbound envelopes to receivers
//! - **Connection endpoint**: the open/message/close callbacks a transport drives
//!
//! Everything here is synchronous and in-process; sends are handed to the
//! transport and never awaited.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod endpoint;
pub mod envelope;
pub mod errors;
pub mod hub;
pub mod ids;
pub mod pending;
pub mod receiver;
pub mod registry;
pub mod session;
pub mod transmitter;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::TransmissionDispatcher;
pub use endpoint::ConnectionEndpoint;
pub use envelope::{Transmission, TransmissionValidator};
pub use errors::{SendError, TetherError, ValidationError};
pub use hub::Hub;
pub use ids::EndpointId;
pub use pending::PendingQueue;
pub use receiver::{MessageReceiver, ReceiverRegistry};
pub use registry::SessionRegistry;
pub use session::{Session, SessionRef};
pub use transmitter::{Delivery, MessageTransmitter, TransmissionTransmitter};

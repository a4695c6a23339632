//! # tether-server
//!
//! Axum WebSocket transport for `tether-core`.
//!
//! - [`server::TetherServer`]: router, listener and graceful shutdown
//! - [`socket::run_socket`]: per-connection read loop and writer task
//! - [`connection::ClientSession`]: the core `Session` backed by an mpsc channel
//! - [`config::TetherConfig`]: layered configuration via `figment`
//! - [`logging`] and [`metrics`]: process-wide observability setup

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod socket;

pub use config::{ConfigError, TetherConfig};
pub use server::TetherServer;

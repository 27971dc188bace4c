//! # Broker Module
//!
//! The networked half of hobbyq.
//!
//! - `server`: the TCP acceptor, one task per client.
//! - `connection`: handshake followed by the request/response loop.
//! - `commands`: the command table (`XMAKE`, `QMAKE`, `DUMP`).
//! - `client`: the client library used by the CLI and the tests.

pub mod client;
pub mod commands;
pub mod connection;
pub mod server;

pub use self::client::Client;
pub use self::server::{serve, Server};

//! hobbyq – a small message broker's control plane.
//!
//! This crate exports
//!  * `core`    – wire protocol, frame codec, handshake, exchange/queue registry
//!  * `broker`  – TCP server, per-connection dispatch loop, client library
//!  * `config`  – TOML-driven runtime configuration
//!  * `logging` – tracing subscriber setup
//!
//! Applications can embed the server (`start_broker`) or talk to one with
//! [`Client`].

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod broker;
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use broker::serve as start_broker;
pub use broker::{Client, Server};
pub use config::{load_config, Config};

//! Protocol and state shared by the server and the client library.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod registry;

pub use error::{Error, Result};
pub use protocol::{Request, Response, Status, PROTOCOL_VERSION};
pub use registry::{Registry, SharedRegistry};

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::frame::FrameError;
use crate::core::handshake::HandshakeError;

/// Errors that end a connection, on either side of it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("server rejected handshake with status {0}")]
    HandshakeRejected(u32),

    #[error("frame not completed within {0:?}")]
    FrameTimeout(Duration),

    #[error("connection closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

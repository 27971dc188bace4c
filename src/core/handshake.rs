//! Version negotiation performed once per connection.
//!
//! The client opens with exactly eight bytes: `HQ ` + four hex digits holding
//! its big-endian `u16` protocol version + `\n`. The server answers with a
//! framed [`Response`]: 200 when it speaks that version, 451 when it doesn't.
//! Anything malformed gets no answer at all; the connection is simply closed.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::debug;

use crate::core::frame::{write_message, FrameError};
use crate::core::protocol::{Response, Status, PROTOCOL_VERSION};

pub const GREETING_LEN: usize = 8;
const GREETING_PREFIX: &[u8; 3] = b"HQ ";
const GREETING_TERMINATOR: u8 = b'\n';

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("incomplete handshake: {0:?}")]
    Incomplete(Vec<u8>),

    #[error("invalid handshake: {0:?}")]
    Invalid(Vec<u8>),

    #[error("invalid client version: {0:?}")]
    InvalidVersion(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("no greeting within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<io::Error> for HandshakeError {
    fn from(e: io::Error) -> Self {
        HandshakeError::Frame(FrameError::Io(e))
    }
}

/// Builds the greeting a client sends for `version`.
pub fn greeting(version: u16) -> [u8; GREETING_LEN] {
    let mut out = [0u8; GREETING_LEN];
    out[..3].copy_from_slice(GREETING_PREFIX);
    // Writing 2 bytes as 4 hex digits into a 4-byte slice cannot fail.
    let _ = hex::encode_to_slice(version.to_be_bytes(), &mut out[3..7]);
    out[7] = GREETING_TERMINATOR;
    out
}

/// Validates a greeting and extracts the client's version.
///
/// Checks run in a fixed order: length, then prefix and terminator, then the
/// hex digits.
pub fn parse_greeting(buf: &[u8]) -> Result<u16, HandshakeError> {
    if buf.len() != GREETING_LEN {
        return Err(HandshakeError::Incomplete(buf.to_vec()));
    }
    if &buf[..3] != GREETING_PREFIX || buf[7] != GREETING_TERMINATOR {
        return Err(HandshakeError::Invalid(buf.to_vec()));
    }

    let mut raw = [0u8; 2];
    hex::decode_to_slice(&buf[3..7], &mut raw).map_err(|e| {
        HandshakeError::InvalidVersion(format!("{} ({e})", String::from_utf8_lossy(&buf[3..7])))
    })?;
    Ok(u16::from_be_bytes(raw))
}

/// Reads up to [`GREETING_LEN`] bytes, stopping early only at end-of-stream.
async fn read_greeting<R>(reader: &mut R) -> Result<Vec<u8>, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; GREETING_LEN];
    let mut filled = 0;
    while filled < GREETING_LEN {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Runs the server side of the handshake on a fresh connection.
///
/// On success the 200 response has already been written. On a version
/// mismatch the 451 response has been written and the caller is expected to
/// close the connection.
pub async fn accept<S>(stream: &mut S, deadline: Duration) -> Result<u16, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let buf = tokio::time::timeout(deadline, read_greeting(stream))
        .await
        .map_err(|_| HandshakeError::Timeout(deadline))??;

    let version = parse_greeting(&buf)?;
    if version != PROTOCOL_VERSION {
        write_message(stream, &Response::status(Status::UnsupportedVersion)).await?;
        return Err(HandshakeError::UnsupportedVersion(version));
    }

    debug!("client speaks protocol version {}", version);
    write_message(stream, &Response::status(Status::Ok)).await?;
    Ok(version)
}

//! Length-prefixed framing.
//!
//! ```text
//! +----------------+------------------------+
//! | len: u16 (BE)  | body: `len` bytes      |
//! +----------------+------------------------+
//! ```
//!
//! The codec does not care what the body is; [`read_message`] and
//! [`write_message`] layer protobuf encoding on top for the two message types
//! in [`crate::core::protocol`].

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const LENGTH_FIELD_LEN: usize = 2;
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("message too large: {0} bytes (max {MAX_FRAME_LEN})")]
    TooLarge(usize),

    #[error("malformed message body: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl FrameError {
    /// True when the peer went away in the middle of a frame.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// Appends a complete frame (header + body) to `dst`.
///
/// Nothing is appended when the body is too large.
#[inline]
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }

    dst.reserve(LENGTH_FIELD_LEN + body.len());
    dst.put_u16(body.len() as u16);
    dst.put_slice(body);
    Ok(())
}

/// Writes one frame. The size check happens before any byte reaches `writer`,
/// so an oversized body never produces a partial frame on the wire.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    encode_frame(body, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame body.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary. A
/// stream that ends anywhere else yields an `UnexpectedEof` I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_FIELD_LEN];
    let mut filled = 0;
    while filled < LENGTH_FIELD_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside frame header",
            )
            .into());
        }
        filled += n;
    }

    let len = u16::from_be_bytes(header) as usize;
    let mut body = BytesMut::zeroed(len);
    reader.read_exact(&mut body).await?;
    Ok(Some(body.freeze()))
}

/// Encodes `msg` with protobuf and writes it as one frame.
pub async fn write_message<W, M>(writer: &mut W, msg: &M) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    M: Message,
{
    let body = msg.encode_to_vec();
    write_frame(writer, &body).await
}

/// Reads one frame and decodes it as `M`. `Ok(None)` on clean end-of-stream.
pub async fn read_message<R, M>(reader: &mut R) -> Result<Option<M>, FrameError>
where
    R: AsyncRead + Unpin,
    M: Message + Default,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(M::decode(body)?)),
        None => Ok(None),
    }
}

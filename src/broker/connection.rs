use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufStream};
use tracing::{debug, error, info, trace, warn};

use crate::broker::commands::CommandTable;
use crate::core::error::Error;
use crate::core::frame::{read_message, write_message, FrameError};
use crate::core::handshake::{self, HandshakeError};
use crate::core::protocol::{Request, Response, Status};
use crate::core::registry::SharedRegistry;

/// Deadlines applied to a single connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub handshake_timeout: Duration,
    /// Bound on reading the rest of a frame once its first byte has arrived.
    /// Waiting for that first byte is never bounded. `None` disables it.
    pub frame_timeout: Option<Duration>,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            frame_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// One client, end to end: handshake, then requests until the client leaves.
///
/// The connection owns its stream; dropping it (on any exit path) closes the
/// socket.
pub struct Connection<S> {
    id: u64,
    stream: BufStream<S>,
    registry: SharedRegistry,
    commands: Arc<CommandTable>,
    limits: ConnectionLimits,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        id: u64,
        stream: S,
        registry: SharedRegistry,
        commands: Arc<CommandTable>,
        limits: ConnectionLimits,
    ) -> Self {
        Self {
            id,
            stream: BufStream::new(stream),
            registry,
            commands,
            limits,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn run(mut self) {
        match self.run_inner().await {
            Ok(()) => info!("client disconnected"),
            Err(Error::Handshake(err @ HandshakeError::UnsupportedVersion(_))) => {
                warn!("closing connection {}: {}", self.id, err)
            }
            Err(err) => error!("connection {} error: {}", self.id, err),
        }
        trace!("connection {} closed", self.id);
    }

    async fn run_inner(&mut self) -> Result<(), Error> {
        let deadline = self.limits.handshake_timeout;
        handshake::accept(&mut self.stream, deadline).await?;

        // Any read or decode failure ends the loop without a response.
        while let Some(request) = self.next_request().await? {
            self.process_request(request).await?;
        }
        Ok(())
    }

    /// Waits as long as it takes for a frame to start, then reads the rest of
    /// it under `frame_timeout`.
    async fn next_request(&mut self) -> Result<Option<Request>, Error> {
        if self.stream.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let read = read_message::<_, Request>(&mut self.stream);
        let result = match self.limits.frame_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| Error::FrameTimeout(limit))?,
            None => read.await,
        };
        Ok(result?)
    }

    async fn process_request(&mut self, request: Request) -> Result<(), Error> {
        debug!("request {} {:?}", request.command, request.args);

        let reply = {
            let mut registry = self.registry.lock().await;
            self.commands.dispatch(&mut registry, &request)
        };

        if let Some(err) = &reply.error {
            warn!(
                "command {}: error: {} (sending status {})",
                request.command, err, reply.response.status
            );
        }
        debug!("sending status {}", reply.response.status);
        self.send(&reply.response).await
    }

    /// Writes a response. A response too large to frame is replaced by a bare
    /// 500; nothing of the oversized one reaches the socket.
    async fn send(&mut self, response: &Response) -> Result<(), Error> {
        match write_message(&mut self.stream, response).await {
            Ok(()) => Ok(()),
            Err(FrameError::TooLarge(len)) => {
                warn!("response of {} bytes does not fit in a frame", len);
                let fallback = Response::status(Status::InternalError);
                write_message(&mut self.stream, &fallback).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

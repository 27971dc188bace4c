//! Client side of the protocol.
//!
//! ```no_run
//! # async fn demo() -> hobbyq::core::Result<()> {
//! let mut client = hobbyq::Client::connect("127.0.0.1:7253").await?;
//! let resp = client.send_request("XMAKE", ["orders"]).await?;
//! assert!(resp.is_success());
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::core::error::{Error, Result};
use crate::core::frame::{read_message, write_message};
use crate::core::handshake::{greeting, HandshakeError};
use crate::core::protocol::{Request, Response, Status, PROTOCOL_VERSION};

/// A handshaken connection to a server. One request in flight at a time; no
/// retries.
#[derive(Debug)]
pub struct Client {
    stream: BufStream<TcpStream>,
    peer: SocketAddr,
}

impl Client {
    /// Connects and negotiates [`PROTOCOL_VERSION`].
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with_version(addr, PROTOCOL_VERSION).await
    }

    /// Connects and announces `version`, whatever the server supports.
    pub async fn connect_with_version<A: ToSocketAddrs>(addr: A, version: u16) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        info!("connected to {}", peer);

        let mut client = Self {
            stream: BufStream::new(stream),
            peer,
        };
        client.handshake(version).await?;
        Ok(client)
    }

    async fn handshake(&mut self, version: u16) -> Result<()> {
        self.stream.write_all(&greeting(version)).await?;
        self.stream.flush().await?;

        let resp = self.read_response().await?;
        match resp.status_kind() {
            Some(Status::Ok) => {
                debug!("handshake with {} complete", self.peer);
                Ok(())
            }
            Some(Status::UnsupportedVersion) => {
                Err(HandshakeError::UnsupportedVersion(version).into())
            }
            _ => Err(Error::HandshakeRejected(resp.status)),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one request and waits for its response.
    pub async fn send_request<I, S>(&mut self, command: &str, args: I) -> Result<Response>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = Request::new(command, args.into_iter().map(Into::into).collect());
        self.send(&request).await
    }

    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        write_message(&mut self.stream, request).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response> {
        read_message(&mut self.stream)
            .await?
            .ok_or(Error::ConnectionClosed)
    }
}

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn, Instrument};

use crate::broker::commands::CommandTable;
use crate::broker::connection::{Connection, ConnectionLimits};
use crate::config::ServerConfig;
use crate::core::error::Error;
use crate::core::registry::{Registry, SharedRegistry};

/// Accepts TCP clients and gives each its own task.
///
/// At most `max_connections` clients are served at once. The accept loop ends
/// on the shutdown signal; connections already running are left to finish on
/// their own. Accept failures that are not about one client (running out of
/// file descriptors, say) pause the loop briefly instead of ending it.
pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry,
    commands: Arc<CommandTable>,
    limits: ConnectionLimits,
    slots: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
    next_conn_id: u64,
}

impl Server {
    pub async fn bind(
        config: &ServerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, Error> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let max_connections = config.max_connections.clamp(1, Semaphore::MAX_PERMITS);

        Ok(Self {
            listener,
            registry: Registry::shared(),
            commands: Arc::new(CommandTable::default()),
            limits: config.connection_limits(),
            slots: Arc::new(Semaphore::new(max_connections)),
            shutdown,
            next_conn_id: 1,
        })
    }

    /// Serves an existing registry instead of a fresh one.
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(mut self) -> Result<(), Error> {
        info!("hobbyq listening on {}", self.local_addr()?);
        let mut shutdown_rx = self.shutdown.clone();

        loop {
            let accepted = tokio::select! {
                result = shutdown_rx.changed() => {
                    match result {
                        Ok(_) => info!("shutdown signal received; stopping accept loop"),
                        Err(_) => info!("shutdown sender dropped; stopping accept loop"),
                    }
                    break;
                }
                accepted = self.accept() => accepted,
            };

            let (stream, addr, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => match accept_backoff(&err) {
                    None => {
                        warn!("accept error: {}", err);
                        continue;
                    }
                    Some(pause) => {
                        error!("accept failed: {}; retrying in {:?}", err, pause);
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            _ = tokio::time::sleep(pause) => continue,
                        }
                    }
                },
            };
            self.spawn_connection(stream, addr, permit);
        }

        Ok(())
    }

    /// Waits for a free slot, then for a client.
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| io::Error::other("connection slots closed"))?;
        let (stream, addr) = self.listener.accept().await?;
        Ok((stream, addr, permit))
    }

    fn spawn_connection(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        permit: OwnedSemaphorePermit,
    ) {
        let conn_id = self.next_conn_id;
        self.next_conn_id = self.next_conn_id.wrapping_add(1);

        if let Err(err) = stream.set_nodelay(true) {
            warn!("set_nodelay failed for {}: {}", addr, err);
        }

        let connection = Connection::new(
            conn_id,
            stream,
            Arc::clone(&self.registry),
            Arc::clone(&self.commands),
            self.limits,
        );
        debug!("accepted connection {} from {}", connection.id(), addr);

        let span = tracing::info_span!("connection", conn_id, peer = %addr);
        tokio::spawn(
            async move {
                connection.run().await;
                drop(permit);
            }
            .instrument(span),
        );
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long to pause after a failed accept. `None` for errors that concern
/// one would-be client; those are skipped straight away.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

/// Binds per `config` and serves until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = Server::bind(config, shutdown_rx).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    server.run().await?;
    Ok(())
}

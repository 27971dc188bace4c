#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;

use hobbyq::config::ServerConfig;
use hobbyq::core::SharedRegistry;
use hobbyq::Server;
use tokio::sync::watch;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = hobbyq::logging::init_logging("debug");
    });
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: SharedRegistry,
    pub shutdown: watch::Sender<bool>,
}

pub async fn start_test_server() -> TestServer {
    start_test_server_with(ServerConfig::default()).await
}

/// Starts a server on an ephemeral port; `bind_addr` from `config` is ignored.
pub async fn start_test_server_with(config: ServerConfig) -> TestServer {
    init_logging();

    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..config
    };
    let (shutdown, shutdown_rx) = watch::channel(false);
    let server = Server::bind(&config, shutdown_rx)
        .await
        .expect("bind ephemeral failed");
    let addr = server.local_addr().expect("local addr");
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    TestServer {
        addr,
        registry,
        shutdown,
    }
}

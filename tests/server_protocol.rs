#[path = "common.rs"]
mod common;

use std::time::Duration;

use hobbyq::config::ServerConfig;
use hobbyq::core::frame::read_message;
use hobbyq::core::handshake::HandshakeError;
use hobbyq::core::{Error, Response, Status};
use hobbyq::Client;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

const NO_ARGS: [&str; 0] = [];

/// Asserts the server closed the stream without sending anything.
async fn assert_closed_silently(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let n = time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server kept the connection open")
        .unwrap_or(0);
    assert_eq!(n, 0, "unexpected bytes: {:?}", &buf[..n]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn supported_version_is_accepted() {
    let server = common::start_test_server().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"HQ 0001\n").await.unwrap();
    let resp: Response = read_message(&mut stream).await.unwrap().unwrap();
    assert_eq!(resp.status_kind(), Some(Status::Ok));
    assert!(resp.args.is_empty());

    let client = Client::connect(server.addr).await.unwrap();
    assert_eq!(client.peer_addr(), server.addr);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn other_versions_get_451_then_close() {
    let server = common::start_test_server().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"HQ 0002\n").await.unwrap();
    let resp: Response = read_message(&mut stream).await.unwrap().unwrap();
    assert_eq!(resp.status_kind(), Some(Status::UnsupportedVersion));
    assert_closed_silently(&mut stream).await;

    let err = Client::connect_with_version(server.addr, 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::UnsupportedVersion(0))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_greetings_get_no_response() {
    let server = common::start_test_server().await;

    for greeting in [&b"HQ zzzz\n"[..], &b"GET / HT"[..], &b"HQ 0001 "[..]] {
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream.write_all(greeting).await.unwrap();
        assert_closed_silently(&mut stream).await;
    }

    // Too short, then the client hangs up its write side.
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"HQ 1\n").await.unwrap();
    stream.shutdown().await.unwrap();
    assert_closed_silently(&mut stream).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_is_idempotent() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    assert_eq!(client.send_request("XMAKE", ["ex"]).await.unwrap().status, 201);
    for _ in 0..3 {
        assert_eq!(client.send_request("XMAKE", ["ex"]).await.unwrap().status, 200);
    }
    assert_eq!(client.send_request("QMAKE", ["ex"]).await.unwrap().status, 201);
    assert_eq!(client.send_request("QMAKE", ["ex"]).await.unwrap().status, 200);

    let registry = server.registry.lock().await;
    assert_eq!(registry.exchange_count(), 1);
    assert_eq!(registry.queue_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_command_and_bad_args_keep_connection_open() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let resp = client.send_request("PUBLISH", ["ex", "hello"]).await.unwrap();
    assert_eq!(resp.status_kind(), Some(Status::UnknownCommand));

    let resp = client.send_request("XMAKE", NO_ARGS).await.unwrap();
    assert_eq!(resp.status_kind(), Some(Status::BadArgs));

    let resp = client.send_request("DUMP", ["yaml"]).await.unwrap();
    assert_eq!(resp.status_kind(), Some(Status::BadArgs));

    let resp = client.send_request("XMAKE", ["after"]).await.unwrap();
    assert_eq!(resp.status_kind(), Some(Status::Created));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dump_empty_registry() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let resp = client.send_request("DUMP", ["json"]).await.unwrap();
    assert_eq!(resp.status, 200);
    let doc: Value = serde_json::from_str(&resp.args[0]).unwrap();
    assert_eq!(doc, json!({"exchanges": [], "queues": []}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dump_after_creates() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    client.send_request("XMAKE", ["a"]).await.unwrap();
    client.send_request("QMAKE", ["b"]).await.unwrap();

    let resp = client.send_request("DUMP", ["json"]).await.unwrap();
    assert_eq!(resp.status, 200);
    let doc: Value = serde_json::from_str(&resp.args[0]).unwrap();
    assert_eq!(
        doc,
        json!({
            "exchanges": [{"name": "a", "bindings": []}],
            "queues": [{"name": "b"}]
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn oversized_dump_is_500_and_connection_survives() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let long = "q".repeat(1000);
    for i in 0..80 {
        let resp = client.send_request("QMAKE", [format!("{long}{i}")]).await.unwrap();
        assert_eq!(resp.status, 201);
    }

    let resp = client.send_request("DUMP", ["json"]).await.unwrap();
    assert_eq!(resp.status_kind(), Some(Status::InternalError));
    assert!(resp.args.is_empty());

    let resp = client.send_request("XMAKE", ["still-here"]).await.unwrap();
    assert_eq!(resp.status, 201);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creates_yield_one_201() {
    const CLIENTS: usize = 32;
    let server = common::start_test_server().await;

    let tasks = (0..CLIENTS).map(|_| {
        let addr = server.addr;
        tokio::spawn(async move {
            let mut client = Client::connect(addr).await.unwrap();
            client.send_request("XMAKE", ["same-name"]).await.unwrap().status
        })
    });
    let statuses: Vec<u32> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(statuses.iter().filter(|&&s| s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|&&s| s == 200).count(), CLIENTS - 1);

    let registry = server.registry.lock().await;
    assert_eq!(registry.exchange_count(), 1);
    assert!(registry.exchange("same-name").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connection_cap_holds_extra_clients_back() {
    let server = common::start_test_server_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;

    let first = Client::connect(server.addr).await.unwrap();

    let mut waiting = TcpStream::connect(server.addr).await.unwrap();
    waiting.write_all(b"HQ 0001\n").await.unwrap();
    let early = time::timeout(
        Duration::from_millis(200),
        read_message::<_, Response>(&mut waiting),
    )
    .await;
    assert!(early.is_err(), "second client served while the first held the slot");

    drop(first);
    let resp: Response = time::timeout(Duration::from_secs(2), read_message(&mut waiting))
        .await
        .expect("second client never served")
        .unwrap()
        .unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_stops_accepting_but_not_serving() {
    let server = common::start_test_server().await;
    let mut client = Client::connect(server.addr).await.unwrap();

    server.shutdown.send(true).unwrap();
    time::sleep(Duration::from_millis(100)).await;

    assert!(TcpStream::connect(server.addr).await.is_err());

    let resp = client.send_request("XMAKE", ["late"]).await.unwrap();
    assert_eq!(resp.status, 201);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quiet_clients_stay_connected() {
    let server = common::start_test_server_with(ServerConfig {
        frame_timeout_ms: 50,
        ..ServerConfig::default()
    })
    .await;
    let mut client = Client::connect(server.addr).await.unwrap();

    time::sleep(Duration::from_millis(300)).await;
    let resp = client.send_request("XMAKE", ["patient"]).await.unwrap();
    assert_eq!(resp.status, 201);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn half_sent_frame_is_dropped() {
    let server = common::start_test_server_with(ServerConfig {
        frame_timeout_ms: 50,
        ..ServerConfig::default()
    })
    .await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"HQ 0001\n").await.unwrap();
    let _: Response = read_message(&mut stream).await.unwrap().unwrap();

    // Header promises 16 bytes; only one arrives.
    stream.write_all(&[0x00, 0x10, 0x0a]).await.unwrap();
    assert_closed_silently(&mut stream).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undecodable_request_closes_connection() {
    let server = common::start_test_server().await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"HQ 0001\n").await.unwrap();
    let _: Response = read_message(&mut stream).await.unwrap().unwrap();

    stream.write_all(&[0x00, 0x03, 0xff, 0xff, 0xff]).await.unwrap();
    assert_closed_silently(&mut stream).await;
}

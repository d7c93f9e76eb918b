//! Control channel over a real Unix socket

use fwall::control::{ControlClient, ControlServer, MAX_COMMAND_LEN};
use fwall::dataplane::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn socket_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fwall-{}-{}.sock", name, std::process::id()))
}

#[tokio::test]
async fn test_add_list_delete_over_socket() {
    let path = socket_path("roundtrip");
    let engine = Arc::new(Engine::default());
    let server = ControlServer::bind(&path, engine.clone(), MAX_COMMAND_LEN).unwrap();
    let serving = tokio::spawn(async move {
        let _ = server.run().await;
    });

    let client = ControlClient::new(&path);
    let (added, listing, deleted, rejected, empty) = tokio::task::spawn_blocking(move || {
        let added = client
            .add("tcp out block anyip anyip 0 anyip anyip 22")
            .unwrap();
        let listing = client.list().unwrap();
        let deleted = client.delete(1).unwrap();
        let rejected = client.delete(1).unwrap();
        let empty = client.list().unwrap();
        (added, listing, deleted, rejected, empty)
    })
    .await
    .unwrap();

    assert_eq!(added, "ok");
    assert_eq!(
        listing,
        "1. dir OUT, protocol TCP, src ip 0.0.0.0, src port 0, dst ip 0.0.0.0, dst port 22, action block\n"
    );
    assert_eq!(deleted, "ok");
    assert!(rejected.starts_with("error: rule 1 not found"));
    assert_eq!(empty, "");
    assert!(engine.is_empty());

    serving.abort();
}

#[tokio::test]
async fn test_rebind_replaces_stale_socket() {
    let path = socket_path("stale");
    std::fs::write(&path, b"").unwrap();

    let engine = Arc::new(Engine::default());
    let server = ControlServer::bind(&path, engine, MAX_COMMAND_LEN).unwrap();
    assert_eq!(server.path(), path.as_path());

    drop(server);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_command_answered_while_peer_keeps_writing() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    let path = socket_path("open-writer");
    let engine = Arc::new(Engine::default());
    let server = ControlServer::bind(&path, engine.clone(), MAX_COMMAND_LEN).unwrap();
    let serving = tokio::spawn(async move {
        let _ = server.run().await;
    });

    let stream = UnixStream::connect(&path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut replies = BufReader::new(read_half).lines();

    write_half
        .write_all(b"add tcp out block anyip anyip 0 anyip anyip 22\n")
        .await
        .unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(3), replies.next_line())
        .await
        .expect("no reply while the session is still open")
        .unwrap();

    assert_eq!(reply.as_deref(), Some("ok"));
    assert_eq!(engine.len(), 1);

    write_half.write_all(b"del 1\n").await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(3), replies.next_line())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.as_deref(), Some("ok"));
    assert!(engine.is_empty());

    serving.abort();
}

#[tokio::test]
async fn test_idle_session_closed_by_server() {
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixStream;

    let path = socket_path("idle");
    let engine = Arc::new(Engine::default());
    let server = ControlServer::bind(&path, engine, MAX_COMMAND_LEN)
        .unwrap()
        .with_idle_timeout(Duration::from_millis(100));
    let serving = tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Never writes and never shuts down
    let mut stream = UnixStream::connect(&path).await.unwrap();
    let mut reply = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut reply)).await;

    assert!(closed.is_ok());
    assert!(reply.is_empty());

    serving.abort();
}

//! Session logger service over TCP

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use voice_hub::SessionStore;
use voice_hub::protocol::write_frame;
use voice_hub::session;

use common::loopback;

fn session_files(dir: &Path) -> Vec<serde_json::Value> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    paths.sort();
    paths
        .iter()
        // A file may be caught mid-write; skip it until the next poll
        .filter_map(|p| serde_json::from_slice(&std::fs::read(p).ok()?).ok())
        .collect()
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}

fn entry_count(dir: &Path) -> usize {
    session_files(dir)
        .iter()
        .map(|s| s.as_array().map_or(0, Vec::len))
        .sum()
}

#[tokio::test]
async fn records_interactions_and_drops_malformed_json() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(temp.path(), Duration::from_secs(600)).unwrap());
    let cancel = CancellationToken::new();

    let (listener, addr) = loopback().await;
    tokio::spawn(session::serve(listener, Arc::clone(&store), None, cancel.clone()));

    let mut orchestrator = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut orchestrator, r#"{"question":"q1","answer":"a1"}"#).await.unwrap();
    write_frame(&mut orchestrator, "not json").await.unwrap();
    write_frame(&mut orchestrator, r#"{"question":"q2","answer":"a2"}"#).await.unwrap();

    wait_for(|| entry_count(temp.path()) == 2).await;

    let sessions = session_files(temp.path());
    assert_eq!(sessions.len(), 1);
    let entries = sessions[0].as_array().unwrap();
    assert_eq!(entries[0]["interaction"]["question"], "q1");
    assert_eq!(entries[1]["interaction"]["answer"], "a2");
    assert!(entries[0]["timestamp"].is_string());
    assert!(store.current_id().is_some());

    cancel.cancel();
}

#[tokio::test]
async fn idle_session_closes_and_next_entry_starts_new_file() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(temp.path(), Duration::from_millis(50)).unwrap());
    let cancel = CancellationToken::new();

    let (listener, addr) = loopback().await;
    tokio::spawn(session::serve(listener, Arc::clone(&store), None, cancel.clone()));
    tokio::spawn(session::run_timeout_watcher(
        Arc::clone(&store),
        Duration::from_millis(20),
        cancel.clone(),
    ));

    let mut orchestrator = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut orchestrator, r#"{"question":"q1","answer":"a1"}"#).await.unwrap();
    wait_for(|| entry_count(temp.path()) == 1).await;

    let watched = Arc::clone(&store);
    wait_for(move || watched.current_id().is_none()).await;

    write_frame(&mut orchestrator, r#"{"question":"q2","answer":"a2"}"#).await.unwrap();
    wait_for(|| entry_count(temp.path()) == 2).await;

    let sessions = session_files(temp.path());
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.as_array().unwrap().len() == 1));

    cancel.cancel();
}

#[tokio::test]
async fn orchestrator_reconnect_keeps_session() {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(temp.path(), Duration::from_secs(600)).unwrap());
    let cancel = CancellationToken::new();

    let (listener, addr) = loopback().await;
    tokio::spawn(session::serve(listener, Arc::clone(&store), None, cancel.clone()));

    {
        let mut first = TcpStream::connect(&addr).await.unwrap();
        write_frame(&mut first, r#"{"question":"q1","answer":"a1"}"#).await.unwrap();
        first.shutdown().await.unwrap();
    }
    wait_for(|| entry_count(temp.path()) == 1).await;

    let mut second = TcpStream::connect(&addr).await.unwrap();
    write_frame(&mut second, r#"{"question":"q2","answer":"a2"}"#).await.unwrap();
    wait_for(|| entry_count(temp.path()) == 2).await;

    assert_eq!(session_files(temp.path()).len(), 1);
    cancel.cancel();
}

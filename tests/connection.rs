//! Downstream connection behavior against real sockets

mod common;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use voice_hub::net::{ResilientConnection, RetryPolicy};
use voice_hub::protocol::read_frame;

use common::{collect_frames, loopback, next_frame};

fn fast_retry() -> RetryPolicy {
    RetryPolicy::forever(Duration::from_millis(20))
}

#[tokio::test]
async fn concurrent_senders_never_interleave_bytes() {
    let (listener, addr) = loopback().await;
    let mut rx = collect_frames(listener);
    let cancel = CancellationToken::new();
    let handle = ResilientConnection::establish("UI", addr, fast_retry(), cancel.clone())
        .await
        .unwrap();

    let mut senders = Vec::new();
    for task in 0..4 {
        let handle = handle.clone();
        senders.push(tokio::spawn(async move {
            for i in 0..25 {
                let text = format!("{task}-{i}-{}", "x".repeat(512));
                handle.send(&text).await.unwrap();
            }
        }));
    }
    for sender in senders {
        sender.await.unwrap();
    }

    let mut per_task = [0usize; 4];
    for _ in 0..100 {
        let frame = next_frame(&mut rx).await;
        let mut parts = frame.splitn(3, '-');
        let task: usize = parts.next().unwrap().parse().unwrap();
        let i: usize = parts.next().unwrap().parse().unwrap();
        assert_eq!(parts.next().unwrap().len(), 512);
        // Each sender's frames keep their relative order
        assert_eq!(i, per_task[task]);
        per_task[task] += 1;
    }
    cancel.cancel();
}

#[tokio::test]
async fn reconnects_after_downstream_restart() {
    let (listener, addr) = loopback().await;
    let cancel = CancellationToken::new();
    let handle = ResilientConnection::establish("Speaker", addr.clone(), fast_retry(), cancel.clone())
        .await
        .unwrap();

    let (mut peer, _) = listener.accept().await.unwrap();
    handle.send("before").await.unwrap();
    assert_eq!(read_frame(&mut peer, None).await.unwrap().as_deref(), Some("before"));

    // Downstream goes away and comes back on the same port
    drop(peer);
    drop(listener);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut rx = collect_frames(TcpListener::bind(&addr).await.unwrap());

    // Writes into the dead socket may be lost until the failure surfaces
    let mut first = None;
    for i in 0..100 {
        handle.send(&format!("after-{i}")).await.unwrap();
        if let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(20), rx.recv()).await {
            first = Some(frame);
            break;
        }
    }
    let first = first.expect("delivery never resumed");
    let resumed_at: usize = first.trim_start_matches("after-").parse().unwrap();

    handle.send("final").await.unwrap();
    let mut expected = resumed_at + 1;
    loop {
        let frame = next_frame(&mut rx).await;
        if frame == "final" {
            break;
        }
        assert_eq!(frame, format!("after-{expected}"));
        expected += 1;
    }
    cancel.cancel();
}

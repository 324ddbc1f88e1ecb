//! Shared test utilities
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::post};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use voice_hub::protocol::read_frame;

/// How long tests wait for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind a loopback listener on an ephemeral port
pub async fn loopback() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind loopback listener");
    let addr = listener.local_addr().expect("no local addr").to_string();
    (listener, addr)
}

/// Accept connections on `listener` and forward every frame received
pub fn collect_frames(listener: TcpListener) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Ok(Some(frame)) = read_frame(&mut stream, None).await {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
            });
        }
    });
    rx
}

/// A downstream service stand-in: its address and the frames it receives
pub async fn frame_collector() -> (String, mpsc::UnboundedReceiver<String>) {
    let (listener, addr) = loopback().await;
    (addr, collect_frames(listener))
}

/// Wait for the next frame or fail the test
pub async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("collector closed")
}

/// Receive `n` frames in order
pub async fn next_frames(rx: &mut mpsc::UnboundedReceiver<String>, n: usize) -> Vec<String> {
    let mut frames = Vec::with_capacity(n);
    for _ in 0..n {
        frames.push(next_frame(rx).await);
    }
    frames
}

/// Assert nothing more arrives within a short grace period
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<String>) {
    if let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected frame: {frame}");
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock endpoint");
    let addr: SocketAddr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock endpoint failed");
    });
    format!("http://{addr}/api/generate")
}

/// Completion endpoint answering `You said: <prompt>`
pub async fn echo_llm() -> String {
    serve(Router::new().route(
        "/api/generate",
        post(|Json(body): Json<serde_json::Value>| async move {
            let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
            assert_eq!(body["stream"], false);
            Json(serde_json::json!({ "model": body["model"], "response": format!("  You said: {prompt}  "), "done": true }))
        }),
    ))
    .await
}

/// Completion endpoint that replies without a `response` field
pub async fn empty_llm() -> String {
    serve(Router::new().route(
        "/api/generate",
        post(|| async { Json(serde_json::json!({ "done": true })) }),
    ))
    .await
}

/// Completion endpoint that answers after `delay`
pub async fn slow_llm(delay: Duration) -> String {
    serve(Router::new().route(
        "/api/generate",
        post(move || async move {
            tokio::time::sleep(delay).await;
            Json(serde_json::json!({ "response": "too late" }))
        }),
    ))
    .await
}

/// Completion endpoint that always fails with a server error
pub async fn failing_llm() -> String {
    serve(Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
    ))
    .await
}

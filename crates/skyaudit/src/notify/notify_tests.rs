// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Mutex;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};

use super::*;

struct Recorded {
    reply: serde_json::Value,
    auth: Mutex<Vec<String>>,
    bodies: Mutex<Vec<serde_json::Value>>,
}

async fn mock_slack(reply: serde_json::Value) -> anyhow::Result<(String, Arc<Recorded>)> {
    let recorded = Arc::new(Recorded {
        reply,
        auth: Mutex::new(Vec::new()),
        bodies: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route(
            "/chat.postMessage",
            post(
                |State(rec): State<Arc<Recorded>>, headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();
                    rec.auth.lock().unwrap().push(auth);
                    rec.bodies.lock().unwrap().push(body);
                    Json(rec.reply.clone())
                },
            ),
        )
        .with_state(Arc::clone(&recorded));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((base, recorded))
}

#[tokio::test]
async fn slack_posts_channel_and_text() -> anyhow::Result<()> {
    let (base, recorded) = mock_slack(serde_json::json!({ "ok": true })).await?;
    let sink = SlackNotifier::new(crate::http_client()?, &format!("{base}/"), "xoxb-test");

    sink.post("#ops", "hello").await?;

    assert_eq!(recorded.auth.lock().unwrap().as_slice(), ["Bearer xoxb-test"]);
    let body = recorded.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["channel"], "#ops");
    assert_eq!(body["text"], "hello");
    Ok(())
}

#[tokio::test]
async fn slack_api_error_is_reported() -> anyhow::Result<()> {
    let (base, _) = mock_slack(serde_json::json!({ "ok": false, "error": "channel_not_found" })).await?;
    let sink = SlackNotifier::new(crate::http_client()?, &base, "xoxb-test");

    let err = sink.post("#nope", "hello").await.unwrap_err();
    assert!(err.to_string().contains("channel_not_found"), "{err}");
    Ok(())
}

#[tokio::test]
async fn http_error_is_reported() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        axum::serve(listener, Router::new()).await.ok();
    });
    let sink = SlackNotifier::new(crate::http_client()?, &base, "xoxb-test");

    let err = sink.post("#ops", "hello").await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
    Ok(())
}

#[tokio::test]
async fn log_sink_accepts_everything() -> anyhow::Result<()> {
    LogNotifier.post("#ops", "report").await
}

//! End-to-end protocol tests against the router via `tower::ServiceExt::oneshot`
//! — the local stand-in for the network-namespace harness the daemon itself
//! doesn't need (no peer-to-peer transport here, just one process and one
//! HTTP surface).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use wavecap_api::{router, ApiState};
use wavecap_core::config::WavecapConfig;
use wavecap_services::{Assembler, ChunkStore, CompletionCoordinator, SessionRegistry};

fn test_state() -> (TempDir, ApiState) {
    let tmp = TempDir::new().unwrap();
    let mut config = WavecapConfig::default();
    config.storage.storage_root = tmp.path().to_path_buf();
    config.completion.completion_retry_initial_secs = 1;
    config.completion.completion_retry_max_secs = 1;

    let store = ChunkStore::new(
        config.storage.storage_root.clone(),
        config.storage.session_identifier_alphabet.clone(),
    );
    let registry = SessionRegistry::new();
    let assembler = Arc::new(Assembler::new(
        store.clone(),
        registry.clone(),
        config.completion.assembly_buffer_bytes,
    ));
    let completion = Arc::new(CompletionCoordinator::new(
        registry.clone(),
        assembler.clone(),
        1,
        1,
        config.sweeper.session_ttl_active_secs,
    ));

    let state = ApiState {
        registry,
        store,
        assembler,
        completion,
        config: Arc::new(config),
    };
    (tmp, state)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn full_upload_lifecycle_assembles_artifact() {
    let (_tmp, state) = test_state();
    let max = state.config.storage.max_chunk_bytes;
    let app = router(state, max);

    let create_req = Request::builder()
        .method("POST")
        .uri("/sessions/s1/chunks/0")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "total_chunks": 2,
                "recording_name": "demo.webm",
                "format": "webm"
            })
            .to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    for (index, payload) in [(0u32, "hello "), (1u32, "world")] {
        let append_req = Request::builder()
            .method("POST")
            .uri(format!("/sessions/s1/chunks/{index}/append"))
            .header("upload-offset", "0")
            .header("upload-chunk-complete", "true")
            .header("content-type", "application/offset+octet-stream")
            .body(Body::from(payload))
            .unwrap();
        let resp = app.clone().oneshot(append_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let complete_req = Request::builder()
        .method("POST")
        .uri("/sessions/s1/complete")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app.clone().oneshot(complete_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Assembly is spawned fire-and-forget; give the background task a beat.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let status_req = Request::builder()
        .uri("/sessions/s1")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(status_req).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["assembly_state"], "done");
    assert_eq!(body["persisted_count"], 2);
}

#[tokio::test]
async fn append_with_stale_offset_reports_actual_offset() {
    let (_tmp, state) = test_state();
    let max = state.config.storage.max_chunk_bytes;
    let app = router(state, max);

    let create_req = Request::builder()
        .method("POST")
        .uri("/sessions/s1/chunks/0")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"total_chunks": 1, "recording_name": "a.webm", "format": "webm"}).to_string(),
        ))
        .unwrap();
    app.clone().oneshot(create_req).await.unwrap();

    let first_append = Request::builder()
        .method("POST")
        .uri("/sessions/s1/chunks/0/append")
        .header("upload-offset", "0")
        .body(Body::from("abc"))
        .unwrap();
    app.clone().oneshot(first_append).await.unwrap();

    let stale_append = Request::builder()
        .method("POST")
        .uri("/sessions/s1/chunks/0/append")
        .header("upload-offset", "0")
        .body(Body::from("xyz"))
        .unwrap();
    let resp = app.clone().oneshot(stale_append).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(body["actual_offset"], 3);
}

#[tokio::test]
async fn probe_on_unknown_session_returns_not_found() {
    let (_tmp, state) = test_state();
    let max = state.config.storage.max_chunk_bytes;
    let app = router(state, max);

    let req = Request::builder()
        .uri("/sessions/missing/chunks/0")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_refuses_while_assembly_in_progress() {
    let (_tmp, state) = test_state();
    state.registry.insert(wavecap_core::session::SessionRecord::new(
        "s1".into(),
        1,
        None,
        "a.webm".into(),
        "webm".into(),
        Default::default(),
    ));
    state
        .registry
        .update("s1", |rec| rec.assembly_state = wavecap_core::session::AssemblyState::InProgress);
    let max = state.config.storage.max_chunk_bytes;
    let app = router(state, max);

    let req = Request::builder()
        .method("DELETE")
        .uri("/sessions/s1")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn health_reports_ok() {
    let (_tmp, state) = test_state();
    let max = state.config.storage.max_chunk_bytes;
    let app = router(state, max);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

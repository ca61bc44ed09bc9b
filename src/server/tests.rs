use super::build_router;
use crate::app::TrainerHandle;
use crate::capture::{ArtifactIdGenerator, ContainerFormat, NoMedia, RollingCapture, VideoArtifact};
use crate::config::TrainerConfig;
use crate::detection::HitKind;
use crate::events::EventBus;
use crate::session::{SessionController, TaskScheduler, TrainerSession};
use crate::storage::{ArtifactStore, MemoryArtifactStore};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApi {
    router: Router,
    store: Arc<MemoryArtifactStore>,
}

fn create_test_api() -> TestApi {
    let config = TrainerConfig::default();
    let bus = Arc::new(EventBus::new(64));
    let store = Arc::new(MemoryArtifactStore::new());

    let session = TrainerSession::new(&config, Arc::clone(&bus));
    let controller = SessionController::new(session, &config.session, TaskScheduler::new());
    let capture = Arc::new(RollingCapture::new(
        config.capture.clone(),
        Arc::clone(&bus),
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        Box::new(NoMedia),
        ArtifactIdGenerator::new(),
    ));

    let handle = TrainerHandle::new(
        controller,
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        capture,
        bus,
    );

    TestApi {
        router: build_router(handle),
        store,
    }
}

async fn add_video(store: &MemoryArtifactStore, id: u64) {
    let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(id as i64);
    store
        .append(VideoArtifact::from_clip(
            id,
            created_at,
            ContainerFormat::WebM,
            &chrono_tz::UTC,
            Some(HitKind::ArmsOnly),
            vec![7u8; 32],
        ))
        .await
        .unwrap();
}

async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(router, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_and_status() {
    let api = create_test_api();

    let (status, health) = send_json(&api.router, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["mode"], "normal");

    let (status, report) = send_json(&api.router, Method::GET, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["mode"], "normal");
    assert_eq!(report["phase"], "idle");
    assert_eq!(report["status"]["status"], "ready");
    assert_eq!(report["capture"]["state"], "stopped");
}

#[tokio::test]
async fn test_mode_change_and_session_start() {
    let api = create_test_api();

    let (status, body) = send_json(&api.router, Method::POST, "/session/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["started"], false);

    let (status, report) = send_json(&api.router, Method::PUT, "/mode/recording").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["mode"], "recording");

    let (status, body) = send_json(&api.router, Method::POST, "/session/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started"], true);

    let (_, report) = send_json(&api.router, Method::GET, "/status").await;
    assert_eq!(report["phase"], "waiting");
    assert_eq!(report["remaining_seconds"], 5);

    // A second start while counting down is refused
    let (status, _) = send_json(&api.router, Method::POST, "/session/start").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = send_json(&api.router, Method::POST, "/session/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["phase"], "idle");

    // Reset stops the countdown but the session stays open until ended
    let (status, body) = send_json(&api.router, Method::POST, "/session/end").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], true);

    let (status, body) = send_json(&api.router, Method::POST, "/session/end").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], false);
}

#[tokio::test]
async fn test_unknown_mode_is_rejected() {
    let api = create_test_api();

    let (status, body) = send_json(&api.router, Method::PUT, "/mode/sprint").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sprint"));
}

#[tokio::test]
async fn test_video_listing_and_download() {
    let api = create_test_api();
    add_video(&api.store, 1).await;
    add_video(&api.store, 2).await;

    let (status, list) = send_json(&api.router, Method::GET, "/videos").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(list[0]["hit_kind"], "arms_only");

    let response = api
        .router
        .clone()
        .oneshot(Request::builder().uri("/videos/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains(".webm"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 32);

    let (status, _) = send(&api.router, Method::GET, "/videos/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_video_delete_and_clear() {
    let api = create_test_api();
    for id in 1..=3 {
        add_video(&api.store, id).await;
    }

    let (status, removed) = send_json(&api.router, Method::DELETE, "/videos/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["id"], 2);

    let (status, _) = send(&api.router, Method::DELETE, "/videos/2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&api.router, Method::DELETE, "/videos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert!(api.store.is_empty().await);
}

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use tunemark::config::EngineConfig;
use tunemark::server::router;
use tunemark::{MemoryIndex, Recognizer, RetryPolicy};

use common::{tone_sweep, wav_bytes};

const BOUNDARY: &str = "tunemark-test-boundary";

fn app() -> Router {
    let recognizer = Recognizer::new(Arc::new(MemoryIndex::new()), EngineConfig::default())
        .with_retry(RetryPolicy::none());
    router(recognizer)
}

fn multipart(file: Option<(&str, &[u8])>, name: Option<&str>) -> Body {
    let mut body = Vec::new();
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(name) = name {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_ok() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn add_then_match_wav() {
    let app = app();
    let wav = wav_bytes(&tone_sweep(6.0, 300.0, 3000.0));

    let (status, added) = send(&app, upload("/add", multipart(Some(("sweep.wav", wav.as_slice())), Some("Sweep")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["success"], true);
    assert!(added["stats"]["num_fingerprints"].as_u64().unwrap() > 0);
    let id = added["recording_id"].as_i64().unwrap();

    let (status, matched) = send(&app, upload("/match", multipart(Some(("clip.wav", wav.as_slice())), None))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matched["matched"], true);
    assert_eq!(matched["recording"], "Sweep");
    assert_eq!(matched["recording_id"].as_i64(), Some(id));
    assert_eq!(matched["confidence"].as_f64(), Some(100.0));

    let (status, songs) = send(&app, get("/songs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(songs.as_array().unwrap().len(), 1);

    let (status, song) = send(&app, get(&format!("/songs/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(song["name"], "Sweep");
}

#[tokio::test]
async fn rejects_bad_uploads() {
    let app = app();
    let wav = wav_bytes(&tone_sweep(1.0, 300.0, 3000.0));

    let (status, body) = send(&app, upload("/add", multipart(Some(("notes.txt", wav.as_slice())), Some("x")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file type");

    let (status, _) = send(&app, upload("/add", multipart(Some(("sweep.wav", wav.as_slice())), None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, upload("/match", multipart(None, None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, upload("/match", multipart(Some(("broken.wav", &b"not audio"[..])), None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_song_is_not_found() {
    let app = app();
    let (status, _) = send(&app, get("/songs/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/songs/99")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_empties_catalogue() {
    let app = app();
    let wav = wav_bytes(&tone_sweep(2.0, 300.0, 3000.0));
    send(&app, upload("/add", multipart(Some(("a.wav", wav.as_slice())), Some("a")))).await;

    let (status, _) = send(&app, upload("/clear_db", Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    let (_, songs) = send(&app, get("/songs")).await;
    assert!(songs.as_array().unwrap().is_empty());
}

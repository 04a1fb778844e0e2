use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use provenance_core::{ProvenanceConfig, TrainingConfig};
use serde_json::{json, Value};
use std::f32::consts::PI;
use std::io::{Cursor, Write};
use tower::ServiceExt;

const ADMIN: &str = "test-admin-secret";
const BOUNDARY: &str = "provenance-test-boundary";

struct TestApp {
    dir: tempfile::TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProvenanceConfig::default();
        config.storage.key_file = dir.path().join("api_keys.json");
        config.storage.model_dir = dir.path().join("models");
        config.storage.scratch_dir = dir.path().join("scratch");
        config.training = TrainingConfig {
            epochs: 2,
            batch_size: 4,
            ..TrainingConfig::default()
        };
        let state = AppState::from_config(&config, ADMIN.to_string()).unwrap();
        Self { dir, state }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        response_json(build_router(self.state.clone()).oneshot(request).await.unwrap()).await
    }

    fn scratch_entries(&self) -> Vec<String> {
        std::fs::read_dir(self.dir.path().join("scratch"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    async fn issue_key(&self) -> String {
        let (status, body) = self.send(request(Method::POST, "/keys", Some(ADMIN))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["key"].as_str().unwrap().to_string()
    }

    async fn upload(&self, key: &str, archive: Vec<u8>) -> String {
        let (status, body) = self
            .send(multipart_request("/upload", key, "songs.zip", &archive))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["directory"].as_str().unwrap().to_string()
    }
}

async fn response_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn request(method: Method, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, key: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", key)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn raw_request(method: Method, uri: &str, key: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", key);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn multipart_request(uri: &str, key: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    write!(
        body,
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .unwrap();
    body.extend_from_slice(contents);
    write!(body, "\r\n--{BOUNDARY}--\r\n").unwrap();

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("X-API-Key", key)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn tone_wav(freq: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..8000 {
            let s = (2.0 * PI * freq * i as f32 / 16000.0).sin();
            writer.write_sample((s * 12000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn zip_archive(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Five decodable tones plus one corrupt `.wav`
fn mixed_archive() -> Vec<u8> {
    let mut entries: Vec<(String, Vec<u8>)> = [220.0, 330.0, 440.0, 550.0, 660.0]
        .iter()
        .enumerate()
        .map(|(i, f)| (format!("songs/track{}.wav", i), tone_wav(*f)))
        .collect();
    entries.push(("songs/corrupt.wav".to_string(), b"this is not audio".to_vec()));
    zip_archive(&entries)
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_admin_routes_require_admin_secret() {
    let app = TestApp::new();

    let (status, body) = app.send(request(Method::GET, "/keys", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing API key");

    let (status, _) = app.send(request(Method::GET, "/keys", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let key = app.issue_key().await;
    let (status, _) = app.send(request(Method::POST, "/keys", Some(&key))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_issued_key_works_until_revoked() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    let (status, body) = app.send(request(Method::GET, "/keys", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"], json!([key.clone()]));

    // passes the guard, then fails validation
    let (status, body) = app
        .send(request(Method::POST, "/classify", Some(&key)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = app
        .send(json_request(Method::DELETE, "/keys", ADMIN, json!({ "key": key })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], key.as_str());

    let (status, _) = app
        .send(request(Method::POST, "/classify", Some(&key)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(json_request(Method::DELETE, "/keys", ADMIN, json!({ "key": key })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_then_train_skips_corrupt_file_and_releases_directory() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    let directory = app.upload(&key, mixed_archive()).await;
    assert!(directory.starts_with("songs-"));
    assert_eq!(app.scratch_entries(), vec![directory.clone()]);

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/train",
            &key,
            json!({ "directory": directory, "label_type": "human" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["samples"], 5);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["variant"], "human");

    let model_path = std::path::PathBuf::from(body["model_path"].as_str().unwrap());
    assert!(model_path.is_file());
    assert!(model_path.ends_with("ai_music_classifier.mpk"));
    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_failed_training_still_releases_directory() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    let archive = zip_archive(&[("bad.wav".to_string(), b"garbage".to_vec())]);
    let directory = app.upload(&key, archive).await;

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/train",
            &key,
            json!({ "directory": directory, "label_type": "ai" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.scratch_entries().is_empty());
    assert!(!app.dir.path().join("models/ai_music_classifier_ai.mpk").exists());
}

#[tokio::test]
async fn test_train_rejects_unknown_or_unsafe_directories() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    for directory in ["../models", "does-not-exist", ""] {
        let (status, _) = app
            .send(json_request(
                Method::POST,
                "/train",
                &key,
                json!({ "directory": directory, "label_type": "human" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", directory);
    }
}

#[tokio::test]
async fn test_upload_rejects_bad_archives() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    let (status, _) = app
        .send(multipart_request("/upload", &key, "x.zip", b"not a zip"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(multipart_request("/upload", &key, "", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");

    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_classify_lifecycle() {
    let app = TestApp::new();
    let key = app.issue_key().await;
    let clip = tone_wav(440.0);

    let (status, body) = app
        .send(request(Method::POST, "/classify", Some(&key)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");

    let (status, _) = app
        .send(multipart_request("/classify", &key, "clip.wav", &clip))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.scratch_entries().is_empty());

    let directory = app.upload(&key, mixed_archive()).await;
    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/train",
            &key,
            json!({ "directory": directory, "label_type": "human" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(multipart_request("/classify", &key, "clip.wav", &clip))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let result = body["result"].as_str().unwrap();
    assert!(result == "human" || result == "synthetic");
    let expected_label = if result == "human" { "Human-composed" } else { "AI-generated" };
    assert_eq!(body["label"], expected_label);

    let (status, _) = app
        .send(multipart_request("/classify", &key, "clip.mp3", b"corrupt"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.scratch_entries().is_empty());
}

#[tokio::test]
async fn test_admin_secret_passes_key_routes() {
    let app = TestApp::new();
    let (status, body) = app
        .send(request(Method::POST, "/classify", Some(ADMIN)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_malformed_json_bodies_are_validation_errors() {
    let app = TestApp::new();
    let key = app.issue_key().await;

    let cases = [
        (Method::POST, "/train", key.as_str()),
        (Method::DELETE, "/keys", ADMIN),
    ];
    for (method, uri, credential) in cases {
        // missing required field
        let (status, body) = app
            .send(raw_request(method.clone(), uri, credential, Some("application/json"), "{}"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert!(body["error"].is_string(), "{} {}: {}", method, uri, body);

        // no body and no content type
        let (status, body) = app
            .send(raw_request(method.clone(), uri, credential, None, ""))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert!(body["error"].is_string(), "{} {}: {}", method, uri, body);

        // unparseable JSON
        let (status, body) = app
            .send(raw_request(method.clone(), uri, credential, Some("application/json"), "{not json"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert!(body["error"].is_string(), "{} {}: {}", method, uri, body);
    }

    // the key survived the malformed revoke attempts
    let (_, body) = app.send(request(Method::GET, "/keys", Some(ADMIN))).await;
    assert_eq!(body["keys"], json!([key]));
}

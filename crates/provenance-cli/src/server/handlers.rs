use super::error::ApiError;
use super::state::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Json;
use provenance_core::{EpochMetrics, Variant};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IssuedKey {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct KeyList {
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct Revoked {
    pub revoked: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub directory: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub directory: String,
    /// `"ai"` trains the ai variant on synthetic examples; anything else the human one
    #[serde(default)]
    pub label_type: String,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub model_path: PathBuf,
    pub variant: Variant,
    pub samples: usize,
    pub skipped: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub final_epoch: Option<EpochMetrics>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub result: &'static str,
    pub label: &'static str,
}

/// Uploaded file pulled out of a multipart body
struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Find the `file` part; other parts are ignored
async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedFile, ApiError> {
    // a request without a multipart body carries no file at all
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::validation("No file provided"));
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(ApiError::validation("No file selected"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {}", e)))?;
        return Ok(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::validation("No file provided"))
}

/// Unwrap a JSON body, reporting any rejection as a validation error
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e.body_text())))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn issue_key(State(state): State<AppState>) -> Result<(StatusCode, Json<IssuedKey>), ApiError> {
    let key = state.keys.issue()?;
    Ok((StatusCode::CREATED, Json(IssuedKey { key })))
}

pub async fn list_keys(State(state): State<AppState>) -> Result<Json<KeyList>, ApiError> {
    Ok(Json(KeyList {
        keys: state.keys.list()?,
    }))
}

pub async fn revoke_key(
    State(state): State<AppState>,
    body: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<Json<Revoked>, ApiError> {
    let request = json_body(body)?;
    if request.key.trim().is_empty() {
        return Err(ApiError::validation("No key provided"));
    }
    state.keys.revoke(&request.key)?;
    Ok(Json(Revoked {
        revoked: request.key,
    }))
}

pub async fn upload_archive(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_file_field(multipart).await?;
    if upload.bytes.is_empty() {
        return Err(ApiError::validation("Uploaded file is empty"));
    }

    let scratch = state.scratch.clone();
    let directory = tokio::task::spawn_blocking(move || {
        scratch
            .stage(&upload.bytes, &upload.name)
            .map(|staged| staged.keep())
    })
    .await??;

    Ok(Json(UploadResponse { directory }))
}

pub async fn train(
    State(state): State<AppState>,
    body: Result<Json<TrainRequest>, JsonRejection>,
) -> Result<Json<TrainResponse>, ApiError> {
    let request = json_body(body)?;
    if request.directory.trim().is_empty() {
        return Err(ApiError::validation("No directory provided"));
    }
    let variant = Variant::from_label_type(&request.label_type);

    // the whole run, release included, happens off the async runtime so a
    // disconnecting client cannot cut cleanup short
    tokio::task::spawn_blocking(move || -> Result<TrainResponse, ApiError> {
        let directory = state.scratch.open(&request.directory)?;

        let outcome = state
            .builder
            .build(directory.path(), variant.label())
            .and_then(|scan| {
                let report = state.trainer.train(&scan.dataset, variant)?;
                Ok((scan, report))
            });
        let released = directory.release();

        let (scan, report) = outcome?;
        released?;

        Ok(TrainResponse {
            model_path: report.model_path.clone(),
            variant,
            samples: scan.dataset.len(),
            skipped: scan.skipped.len(),
            train_samples: report.train_samples,
            test_samples: report.test_samples,
            final_epoch: report.final_metrics().cloned(),
        })
    })
    .await?
    .map(Json)
}

pub async fn classify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let upload = read_file_field(multipart).await?;

    tokio::task::spawn_blocking(move || -> Result<ClassifyResponse, ApiError> {
        let input = state.scratch.temp_file(&upload.bytes, &upload.name)?;
        let outcome = state.inference.classify_file(input.path(), Variant::Human);
        let released = input.release();

        let classification = outcome?;
        released?;

        Ok(ClassifyResponse {
            result: classification.verdict.as_str(),
            label: classification.verdict.display_label(),
        })
    })
    .await?
    .map(Json)
}

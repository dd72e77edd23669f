//! HTTP API for detection jobs.
//!
//! Routes:
//! - `GET  /`                                   → `{"docs": "/docs"}`
//! - `GET  /health`                             → `{"status": "ok"}`
//! - `POST /detection/image`                    multipart `file`
//! - `POST /detection/video`                    multipart `file`
//! - `GET  /detection/processed_file/:filename` → `DETECTED_{filename}`
//! - `GET  /detection/files`                    → artifact listing
//! - `GET  /detection/ws`                       WebSocket echo
//!
//! Detection work runs on the blocking pool, one job per request.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::detect::Detection;
use crate::error::{classify, RecognizerError};
use crate::media::{artifact_name, MediaController, DETECTED_PREFIX};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
const UPLOAD_FIELD: &str = "file";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Running server. `stop` shuts it down gracefully.
#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<std::io::Result<()>>>,
}

impl ApiHandle {
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await
                .map_err(|_| anyhow!("api server task panicked"))?
                .context("api server stopped with an error")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    controller: Arc<MediaController>,
}

pub struct ApiServer {
    config: ApiConfig,
    controller: Arc<MediaController>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, controller: Arc<MediaController>) -> Self {
        Self { config, controller }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.controller))
    }

    /// Bind and serve in a background task.
    pub async fn spawn(self) -> Result<ApiHandle> {
        let listener = tokio::net::TcpListener::bind(&self.config.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.addr))?;
        let addr = listener.local_addr().context("read bound address")?;
        let app = self.router();
        let (tx, rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });
        Ok(ApiHandle {
            addr,
            shutdown: Some(tx),
            join: Some(join),
        })
    }
}

pub fn router(controller: Arc<MediaController>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/detection/image", post(detect_image))
        .route("/detection/video", post(detect_video))
        .route("/detection/processed_file/:filename", get(processed_file))
        .route("/detection/files", get(list_files))
        .route("/detection/ws", get(websocket))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(AppState { controller })
}

#[derive(Serialize)]
struct ImageResponse {
    file_name: String,
    detections: Vec<Detection>,
}

#[derive(Serialize)]
struct VideoResponse {
    file_name: String,
    saved: bool,
    detections: Vec<Detection>,
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "docs": "/docs" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn detect_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let controller = Arc::clone(&state.controller);
    let name = upload.file_name.clone();
    let report = tokio::task::spawn_blocking(move || {
        controller.detect_image_bytes(&upload.bytes, Some(&upload.file_name))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("image job panicked: {e}")))??;
    Ok(Json(ImageResponse {
        file_name: name,
        detections: report.detections,
    }))
}

async fn detect_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<VideoResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let upload_path = state.controller.upload_path(&upload.file_name)?;
    tokio::fs::create_dir_all(state.controller.artifacts_dir())
        .await
        .context("create artifacts directory")?;
    tokio::fs::write(&upload_path, &upload.bytes)
        .await
        .with_context(|| format!("save upload {}", upload_path.display()))?;
    log::info!(
        "video upload {} saved ({} bytes)",
        upload_path.display(),
        upload.bytes.len()
    );

    let controller = Arc::clone(&state.controller);
    let name = upload.file_name.clone();
    let detections = tokio::task::spawn_blocking(move || {
        controller.detect_video_file(&upload_path, Some(&name))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("video job panicked: {e}")))??;
    Ok(Json(VideoResponse {
        file_name: upload.file_name,
        saved: true,
        detections,
    }))
}

async fn processed_file(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ApiError> {
    let name = artifact_name(&filename).map_err(|_| ApiError::NotFound(filename.clone()))?;
    if name != filename {
        return Err(ApiError::NotFound(filename));
    }
    let path = state.controller.output_path(&name)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("{DETECTED_PREFIX}{name}")))
        }
        Err(err) => {
            return Err(ApiError::Internal(
                anyhow::Error::new(err).context(format!("read {}", path.display())),
            ))
        }
    };
    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}

async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, ApiError> {
    let dir = state.controller.artifacts_dir().to_path_buf();
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(FilesResponse { files }))
        }
        Err(err) => {
            return Err(ApiError::Internal(
                anyhow::Error::new(err).context(format!("list {}", dir.display())),
            ))
        }
    };
    while let Some(entry) = entries.next_entry().await.context("read artifacts entry")? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(Json(FilesResponse { files }))
}

async fn websocket(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(echo_socket)
}

async fn echo_socket(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = Message::Text(format!("Message text was: {text}"));
                if sender.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    log::debug!("websocket client disconnected");
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let raw_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("upload has no file name".to_string()))?;
        let file_name =
            artifact_name(&raw_name).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest(format!(
        "multipart field '{UPLOAD_FIELD}' is required"
    )))
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("bmp") => "image/bmp",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match classify(&err) {
            Some(RecognizerError::Decode(_)) => Self::BadRequest(format!("{err:#}")),
            _ => Self::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::NotFound(name) => (StatusCode::NOT_FOUND, format!("{name} not found")),
            Self::Internal(err) => {
                log::error!("detection request failed: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type(Path::new("DETECTED_a.JPG")), "image/jpeg");
        assert_eq!(content_type(Path::new("DETECTED_a.mp4")), "video/mp4");
        assert_eq!(content_type(Path::new("DETECTED_a")), "application/octet-stream");
    }

    #[test]
    fn decode_errors_become_bad_requests() {
        let err = RecognizerError::decode("cannot decode image");
        assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));
        let err = RecognizerError::configuration("weights missing");
        assert!(matches!(ApiError::from(err), ApiError::Internal(_)));
    }
}

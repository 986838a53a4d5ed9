//! HTTP control surface
//!
//! Routes:
//! - `GET /start_camera`, `GET /stop_camera`: session control
//! - `GET /get_similarity`: displayed score
//! - `GET /get_similarity_data`: recent `{timestamp, similarity}` samples
//! - `GET /video_feed`: `multipart/x-mixed-replace` stream of annotated frames
//! - `GET /health`: liveness plus a status snapshot
//!
//! Frame work runs on blocking threads; score routes only read shared state.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dancematch_core::{DanceError, DanceResult};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::control::DanceSession;
use crate::frame::FrameEncoder;

/// Multipart boundary between streamed frames
pub const FRAME_BOUNDARY: &str = "frame";

#[derive(Clone)]
struct AppState {
    session: DanceSession,
    encoder: Arc<dyn FrameEncoder>,
}

/// One entry of `/get_similarity_data`
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityPoint {
    pub timestamp: DateTime<Utc>,
    pub similarity: f32,
}

pub fn router(session: DanceSession, encoder: Arc<dyn FrameEncoder>) -> Router {
    Router::new()
        .route("/start_camera", get(start_camera))
        .route("/stop_camera", get(stop_camera))
        .route("/get_similarity", get(get_similarity))
        .route("/get_similarity_data", get(get_similarity_data))
        .route("/video_feed", get(video_feed))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(AppState { session, encoder })
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> DanceResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| DanceError::TransportError(e.to_string()))
}

async fn start_camera(State(app): State<AppState>) -> Response {
    let session = app.session.clone();
    let started = tokio::task::spawn_blocking(move || session.start_session())
        .await
        .map_err(|e| DanceError::TransportError(e.to_string()))
        .and_then(|result| result);

    match started {
        Ok(()) => Json(json!({ "status": "success" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": e.to_string() })),
        )
            .into_response(),
    }
}

async fn stop_camera(State(app): State<AppState>) -> Json<serde_json::Value> {
    let summary = app.session.stop_session();
    Json(json!({ "status": "success", "summary": summary }))
}

async fn get_similarity(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "similarity": app.session.current_score() }))
}

async fn get_similarity_data(State(app): State<AppState>) -> Json<Vec<SimilarityPoint>> {
    let points = app
        .session
        .recent_score_samples()
        .into_iter()
        .map(|sample| SimilarityPoint {
            timestamp: sample.timestamp,
            similarity: sample.score,
        })
        .collect();
    Json(points)
}

async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "session": app.session.status(),
    }))
}

fn multipart_part(content_type: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{FRAME_BOUNDARY}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let mut part = Vec::with_capacity(head.len() + body.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(body);
    part.extend_from_slice(b"\r\n");
    part
}

async fn video_feed(State(app): State<AppState>) -> Response {
    let frames = futures::stream::unfold(app, |app| async move {
        loop {
            let session = app.session.clone();
            let next = tokio::task::spawn_blocking(move || session.next_frame()).await;

            let annotated = match next {
                Ok(Some(annotated)) => annotated,
                // Idle or camera not ready; keep the stream open
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "frame task failed, closing stream");
                    return None;
                }
            };

            match app.encoder.encode(&annotated.frame) {
                Ok(bytes) => {
                    let part = multipart_part(app.encoder.content_type(), &bytes);
                    return Some((Ok::<_, Infallible>(part), app));
                }
                Err(e) => tracing::warn!(error = %e, "frame encoding failed, skipping frame"),
            }
        }
    });

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={FRAME_BOUNDARY}"),
        )],
        Body::from_stream(frames),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_part_layout() {
        let part = multipart_part("image/x-portable-pixmap", b"abc");
        let text = String::from_utf8(part).unwrap();
        assert!(text.starts_with("--frame\r\nContent-Type: image/x-portable-pixmap\r\n"));
        assert!(text.contains("Content-Length: 3\r\n\r\nabc"));
        assert!(text.ends_with("abc\r\n"));
    }

    #[test]
    fn test_similarity_point_json_shape() {
        let point = SimilarityPoint {
            timestamp: Utc::now(),
            similarity: 42.0,
        };
        let value = serde_json::to_value(point).unwrap();
        assert!(value.get("timestamp").is_some());
        assert_eq!(value["similarity"], 42.0);
    }
}

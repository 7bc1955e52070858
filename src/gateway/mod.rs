//! HTTP gateway.
//!
//! ```text
//! GET  /                  single-page client
//! GET  /health            liveness
//! POST /upload-image      multipart `image` → pipeline → JSON
//! GET  /download/:id      finished PDF as an attachment
//! GET  /uploads/*         stored originals
//! GET  /processed/*       generated outlines and PDFs
//! ```
//!
//! Handlers hold no state of their own; everything hangs off the shared
//! [`ColoringPipeline`].

pub mod download;
pub mod error;
pub mod upload;

use crate::process::ColoringPipeline;
use crate::store::{PROCESSED_PREFIX, UPLOADS_PREFIX};
use axum::extract::DefaultBodyLimit;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use error::ApiError;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Headroom above the file limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

const INDEX_HTML: &str = include_str!("index.html");

pub struct AppState {
    pub pipeline: Arc<ColoringPipeline>,
}

/// Build the full application router.
pub fn router(pipeline: Arc<ColoringPipeline>) -> Router {
    let body_limit = pipeline.config().max_upload_bytes + MULTIPART_OVERHEAD;
    let uploads = ServeDir::new(pipeline.store().uploads_dir());
    let processed = ServeDir::new(pipeline.store().processed_dir());
    let state = Arc::new(AppState { pipeline });

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload-image", post(upload::upload_image))
        .route("/download/:id", get(download::download_pdf))
        .nest_service(UPLOADS_PREFIX, uploads)
        .nest_service(PROCESSED_PREFIX, processed)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "AI Coloring Page Generator is running!"
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);
    ApiError::Internal("An unexpected error occurred".into()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::error::AiError;
    use crate::job::JobId;
    use crate::pipeline::ai::ColoringAi;
    use crate::store::FileStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Backend for requests that must be rejected before any AI call.
    struct UnreachableAi;

    #[async_trait]
    impl ColoringAi for UnreachableAi {
        async fn describe(&self, _image: &[u8], _mime: &str) -> Result<String, AiError> {
            panic!("describe must not be called");
        }

        async fn generate(&self, _prompt: &str) -> Result<Vec<String>, AiError> {
            panic!("generate must not be called");
        }
    }

    async fn test_app() -> (Router, Arc<ColoringPipeline>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig::builder()
            .upload_dir(tmp.path().join("uploads"))
            .processed_dir(tmp.path().join("processed"))
            .build()
            .unwrap();
        let store = FileStore::open(&config.upload_dir, &config.processed_dir)
            .await
            .unwrap();
        let pipeline =
            Arc::new(ColoringPipeline::new(Arc::new(UnreachableAi), store, config).unwrap());
        (router(pipeline.clone()), pipeline, tmp)
    }

    fn multipart(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload-image")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _p, _tmp) = test_app().await;
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn index_serves_html() {
        let (app, _p, _tmp) = test_app().await;
        let req = Request::get("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/upload-image"));
    }

    #[tokio::test]
    async fn gif_upload_is_rejected() {
        let (app, _p, _tmp) = test_app().await;
        let response = app
            .oneshot(multipart("image", "cat.gif", "image/gif", b"GIF89a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Only PNG and JPEG files are allowed!");
    }

    #[tokio::test]
    async fn png_mime_with_wrong_extension_is_rejected() {
        let (app, _p, _tmp) = test_app().await;
        let response = app
            .oneshot(multipart("image", "cat.txt", "image/png", b"\x89PNG"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_field_name_means_no_image() {
        let (app, _p, _tmp) = test_app().await;
        let response = app
            .oneshot(multipart("photo", "cat.png", "image/png", b"\x89PNG"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "No image file provided");
    }

    #[tokio::test]
    async fn download_of_malformed_id_is_404() {
        let (app, _p, _tmp) = test_app().await;
        let req = Request::get("/download/..%2F..%2Fetc%2Fpasswd")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"], "PDF not found");
    }

    #[tokio::test]
    async fn download_of_non_utf8_id_is_404() {
        let (app, _p, _tmp) = test_app().await;
        let req = Request::get("/download/%FF").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"], "PDF not found");
    }

    #[tokio::test]
    async fn download_streams_existing_pdf() {
        let (app, pipeline, _tmp) = test_app().await;
        let id = JobId::new();
        std::fs::write(pipeline.store().pdf_path(&id), b"%PDF-1.5 test").unwrap();

        let req = Request::get(format!("/download/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        assert_eq!(
            response.headers()["content-disposition"],
            format!("attachment; filename=\"coloring-page-{id}.pdf\"").as_str()
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF-1.5 test");
    }

    #[tokio::test]
    async fn processed_files_are_served_statically() {
        let (app, pipeline, _tmp) = test_app().await;
        let id = JobId::new();
        pipeline.store().save_processed(&id, b"png-bytes").await.unwrap();

        let req = Request::get(format!("/processed/{id}-processed.png"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (app, _p, _tmp) = test_app().await;
        let req = Request::get("/nope").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

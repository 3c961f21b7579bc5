#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use file_convert_backend::config::AppConfig;
use file_convert_backend::services::converter::ConversionDispatcher;
use file_convert_backend::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub app: Router,
}

pub fn setup() -> TestApp {
    setup_with(|_| {})
}

/// App over a fresh staging directory, with zero conversion delays
pub fn setup_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::for_staging_dir(dir.path().join("upload"));
    customize(&mut config);

    let state = AppState::new(config);
    let app = create_app(state.clone());
    TestApp { dir, state, app }
}

/// App whose conversions go through `dispatcher` instead of the stubs
pub fn with_dispatcher(dispatcher: ConversionDispatcher) -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::for_staging_dir(dir.path().join("upload"));

    let state = AppState::with_dispatcher(config, dispatcher);
    let app = create_app(state.clone());
    TestApp { dir, state, app }
}

pub fn with_retention(retention: Duration) -> TestApp {
    setup_with(|config| config.staging.retention = retention)
}

/// Hand-built multipart body: text fields first, then an optional file part
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub fn staging_dir(&self) -> &Path {
        self.state.staging.dir()
    }

    pub async fn post_multipart(&self, uri: &str, body: Vec<u8>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(
                        "Content-Type",
                        format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn convert(&self, filename: &str, content_type: &str, bytes: &[u8], target: &str) -> Response<Body> {
        let body = multipart_body(
            &[("targetFormat", target)],
            Some((filename, content_type, bytes)),
        );
        self.post_multipart("/api/convert", body).await
    }

    /// Names of the files currently in the staging directory
    pub fn staged_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.staging_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| panic!("not JSON: {}", String::from_utf8_lossy(&bytes)))
}

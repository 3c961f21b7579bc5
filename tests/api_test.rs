mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, multipart_body, setup, setup_with};
use tower::ServiceExt;

#[tokio::test]
async fn test_health() {
    let t = setup();
    t.state.staging.ensure_dir().await.unwrap();

    let response = t.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["staging"], "writable");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_without_staging_dir() {
    let t = setup();

    let json = body_json(t.get("/health").await).await;
    assert_eq!(json["staging"], "unavailable");
}

#[tokio::test]
async fn test_list_formats() {
    let t = setup();

    let response = t.get("/api/formats").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let formats = json.as_array().unwrap();
    assert!(formats.len() > 30);
    assert_eq!(formats[0]["mimeType"], "application/pdf");

    let txt = formats
        .iter()
        .find(|f| f["mimeType"] == "text/plain")
        .unwrap();
    assert_eq!(txt["label"], "TXT");
    assert!(
        txt["conversions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "PDF")
    );
    assert_eq!(txt["icon"]["glyph"], "file");
}

#[tokio::test]
async fn test_classify_known_and_unknown() {
    let t = setup();

    let json = body_json(t.get("/api/formats/classify?mime=Image%2FPNG").await).await;
    assert_eq!(json["mimeType"], "image/png");
    assert_eq!(json["label"], "PNG");
    assert!(!json["conversions"].as_array().unwrap().is_empty());

    let json = body_json(t.get("/api/formats/classify?mime=application%2Fx-made-up").await).await;
    assert_eq!(json["label"], "Unknown");
    assert!(json["conversions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_classify_requires_mime() {
    let t = setup();

    let response = t.get("/api/formats/classify").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let long = "a".repeat(300);
    let response = t.get(&format!("/api/formats/classify?mime={}", long)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_test_upload_keeps_file() {
    let t = setup();
    let body = multipart_body(&[], Some(("sample.csv", "text/csv", b"a,b\n1,2\n")));

    let response = t.post_multipart("/api/test-upload", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["fileInfo"]["name"], "sample.csv");
    assert_eq!(json["fileInfo"]["type"], "text/csv");
    assert_eq!(json["fileInfo"]["size"], 8);

    let path = json["fileInfo"]["path"].as_str().unwrap();
    assert!(std::path::Path::new(path).exists());
    assert_eq!(t.staged_files().len(), 1);
}

#[tokio::test]
async fn test_test_upload_without_file() {
    let t = setup();
    let body = multipart_body(&[("note", "nothing here")], None);

    let response = t.post_multipart("/api/test-upload", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
}

#[tokio::test]
async fn test_test_upload_can_be_disabled() {
    let t = setup_with(|config| config.enable_test_upload = false);
    let body = multipart_body(&[], Some(("sample.csv", "text/csv", b"x")));

    let response = t.post_multipart("/api/test-upload", body).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(t.staged_files().is_empty());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let t = setup();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let response = t.get("/health").await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_openapi_document() {
    let t = setup();

    let response = t.get("/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/convert"].is_object());
    assert!(json["paths"]["/api/download/{filename}"].is_object());
}

use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::upload::receive_upload;
use crate::services::staging::UploadError;
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct FileInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub path: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestUploadResponse {
    pub success: bool,
    pub file_info: FileInfo,
}

/// Stages an upload and reports what was received. The staged file is left
/// in place; the staging sweeper removes it once it is old enough.
#[utoipa::path(
    post,
    path = "/api/test-upload",
    request_body(content = String, description = "Multipart body with a `file` part", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Upload received", body = TestUploadResponse),
        (status = 400, description = "No file uploaded")
    ),
    tag = "diagnostics"
)]
pub async fn test_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TestUploadResponse>, AppError> {
    let form = receive_upload(&mut multipart, &state.staging, &state.lifecycle).await?;
    let staged = form.file.ok_or(UploadError::NoFilePart)?;

    tracing::info!(
        "Test upload received: {} ({} bytes) at {}",
        staged.original_name,
        staged.size_bytes,
        staged.storage_path.display()
    );

    Ok(Json(TestUploadResponse {
        success: true,
        file_info: FileInfo {
            name: staged.original_name,
            mime_type: staged.declared_mime_type,
            size: staged.size_bytes,
            path: staged.storage_path.display().to_string(),
        },
    }))
}

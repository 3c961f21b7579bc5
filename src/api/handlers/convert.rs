use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::upload::receive_upload;
use crate::services::staging::UploadError;
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub download_id: String,
    /// Stored name of the converted file, used with `/api/download/{filename}`
    pub filename: String,
    pub original_name: String,
    pub converted_format: String,
}

/// Multipart body of `POST /api/convert`
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct ConvertForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    #[schema(example = "PDF")]
    pub target_format: String,
}

#[utoipa::path(
    post,
    path = "/api/convert",
    request_body(content = ConvertForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File converted", body = ConvertResponse),
        (status = 400, description = "Missing file, invalid target format or unsupported type"),
        (status = 413, description = "File too large"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "conversion"
)]
pub async fn convert_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, AppError> {
    let form = receive_upload(&mut multipart, &state.staging, &state.lifecycle).await?;
    let target_format = form.field("targetFormat").map(str::to_string);
    let staged = form.file.ok_or(UploadError::NoFilePart)?;

    tracing::info!(
        "Converting {} ({}, {} bytes)",
        staged.original_name,
        staged.declared_mime_type,
        staged.size_bytes
    );

    let converted = state
        .conversion
        .convert(staged, target_format.as_deref())
        .await?;

    Ok(Json(ConvertResponse {
        success: true,
        download_id: converted.download_id,
        filename: converted.filename,
        original_name: converted.original_name,
        converted_format: converted.converted_format,
    }))
}

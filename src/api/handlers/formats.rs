use crate::api::error::AppError;
use crate::services::classifier::{self, FileTypeDescriptor};
use axum::{Json, extract::Query};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub struct IconResponse {
    pub glyph: String,
    pub tone: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatResponse {
    pub mime_type: String,
    pub label: String,
    pub icon: IconResponse,
    /// Target formats offered for this type
    pub conversions: Vec<String>,
}

impl FormatResponse {
    fn new(mime_type: &str, descriptor: FileTypeDescriptor) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            label: descriptor.label.to_string(),
            icon: IconResponse {
                glyph: descriptor.icon.glyph.to_string(),
                tone: descriptor.icon.tone.to_string(),
            },
            conversions: descriptor
                .allowed_targets
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

#[derive(Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ClassifyQuery {
    /// MIME type to classify, e.g. `text/plain`
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "mime must be 1-255 characters"))]
    pub mime: String,
}

#[utoipa::path(
    get,
    path = "/api/formats",
    responses(
        (status = 200, description = "Every known file type", body = Vec<FormatResponse>)
    ),
    tag = "formats"
)]
pub async fn list_formats() -> Json<Vec<FormatResponse>> {
    Json(
        classifier::known_types()
            .map(|(mime, descriptor)| FormatResponse::new(mime, descriptor))
            .collect(),
    )
}

#[utoipa::path(
    get,
    path = "/api/formats/classify",
    params(ClassifyQuery),
    responses(
        (status = 200, description = "Descriptor for the type", body = FormatResponse),
        (status = 400, description = "Missing or oversized mime parameter")
    ),
    tag = "formats"
)]
pub async fn classify_format(
    Query(query): Query<ClassifyQuery>,
) -> Result<Json<FormatResponse>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mime = classifier::normalize_mime(&query.mime);
    let descriptor = classifier::classify(&mime);
    Ok(Json(FormatResponse::new(&mime, descriptor)))
}

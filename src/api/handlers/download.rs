use crate::AppState;
use crate::api::error::PlainTextError;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(display_name: &str) -> String {
    let ascii_filename = display_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.trim().is_empty() {
        "converted"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(display_name, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    params(
        ("filename" = String, Path, description = "Stored name returned by /api/convert")
    ),
    responses(
        (status = 200, description = "Converted file"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Download failed")
    ),
    tag = "conversion"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, PlainTextError> {
    let served = state.downloads.serve(&filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, served.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&served.display_name),
            ),
        ],
        served.bytes,
    )
        .into_response())
}

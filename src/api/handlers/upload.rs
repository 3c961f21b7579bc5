use crate::api::error::AppError;
use crate::services::lifecycle::LifecycleManager;
use crate::services::staging::{StagedFile, StagingArea};
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// The parsed parts of an upload request
#[derive(Debug)]
pub struct UploadForm {
    /// The first `file` part, already staged on disk
    pub file: Option<StagedFile>,
    /// Text parts by name, in arrival order
    pub fields: HashMap<String, Vec<String>>,
}

impl UploadForm {
    /// First value of a text part
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

/// Reads every part of `multipart`, streaming the first `file` part into
/// the staging area. If anything fails after the file was staged, the
/// staged file is removed before the error is returned.
pub async fn receive_upload(
    multipart: &mut Multipart,
    staging: &StagingArea,
    lifecycle: &Arc<LifecycleManager>,
) -> Result<UploadForm, AppError> {
    let mut guard = lifecycle.guard();
    let mut file: Option<StagedFile> = None;
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                guard.cleanup_now().await;
                return Err(multipart_error(e));
            }
        };

        let name = field.name().unwrap_or_default().to_string();

        // Only parts carrying a filename are files; a bare `file=...` is text
        if let Some(original_name) = field
            .file_name()
            .filter(|_| name == "file")
            .map(str::to_string)
        {
            if file.is_some() {
                tracing::debug!("Ignoring extra file part");
                continue;
            }

            let content_type = field
                .content_type()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
                .to_string();

            let reader = StreamReader::new(field.map_err(std::io::Error::other));
            match staging.stage(&original_name, &content_type, reader).await {
                Ok(staged) => {
                    guard.track(staged.storage_path.clone());
                    file = Some(staged);
                }
                Err(e) => {
                    guard.cleanup_now().await;
                    return Err(e.into());
                }
            }
        } else {
            match field.text().await {
                Ok(text) => {
                    fields.entry(name).or_insert_with(Vec::new).push(text);
                }
                Err(e) => {
                    guard.cleanup_now().await;
                    return Err(multipart_error(e));
                }
            }
        }
    }

    guard.disarm();
    Ok(UploadForm { file, fields })
}

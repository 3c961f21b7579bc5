use crate::api::error::AppError;
use crate::services::classifier::content_type_for_extension;
use crate::services::lifecycle::LifecycleManager;
use crate::services::staging::StagingArea;
use std::path::Path;
use std::sync::Arc;

/// A converted file read into memory, ready to send
#[derive(Debug)]
pub struct ServedFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub display_name: String,
}

/// `notes-1718000000000.pdf` -> `notes - Converted.pdf`
pub fn display_name(stored_name: &str) -> String {
    let path = Path::new(stored_name);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stored_name);

    let clean = match stem.rsplit_once('-') {
        Some((head, digits))
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) =>
        {
            head
        }
        _ => stem,
    };

    if ext.is_empty() {
        format!("{} - Converted", clean)
    } else {
        format!("{} - Converted.{}", clean, ext)
    }
}

pub struct DownloadService {
    staging: Arc<StagingArea>,
    lifecycle: Arc<LifecycleManager>,
}

impl DownloadService {
    pub fn new(staging: Arc<StagingArea>, lifecycle: Arc<LifecycleManager>) -> Self {
        Self { staging, lifecycle }
    }

    /// Serves a converted output and hands its deletion to the serve timer
    pub async fn serve(&self, filename: &str) -> Result<ServedFile, AppError> {
        let not_found = || AppError::NotFound(format!("File not found: {}", filename));

        let path = self.staging.resolve(filename).ok_or_else(not_found)?;

        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(not_found());
        }

        if !self.lifecycle.claim_for_download(filename, path.clone()) {
            tracing::info!("Refusing download of {}: not available", filename);
            return Err(not_found());
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        tracing::info!(
            "Serving {} ({} bytes), deleting in {:?}",
            filename,
            bytes.len(),
            self.lifecycle.retention()
        );

        Ok(ServedFile {
            bytes,
            content_type: content_type_for_extension(ext),
            display_name: display_name(filename),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagingConfig;
    use crate::services::lifecycle::ArtifactState;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("notes-1718000000000.pdf"), "notes - Converted.pdf");
        assert_eq!(display_name("my-file-12.PNG"), "my-file - Converted.png");
        assert_eq!(display_name("plain.txt"), "plain - Converted.txt");
        assert_eq!(display_name("trailing-.txt"), "trailing- - Converted.txt");
        assert_eq!(display_name("v-1-2.pdf"), "v-1 - Converted.pdf");
        assert_eq!(display_name("noext-99"), "noext - Converted");
    }

    fn service(dir: &TempDir) -> (DownloadService, Arc<LifecycleManager>) {
        let staging = Arc::new(StagingArea::new(StagingConfig::new(dir.path()), 1024));
        let lifecycle = LifecycleManager::new(Duration::from_secs(3600));
        (DownloadService::new(staging, lifecycle.clone()), lifecycle)
    }

    #[tokio::test]
    async fn test_serve_existing_file() {
        let dir = TempDir::new().unwrap();
        let (service, lifecycle) = service(&dir);
        tokio::fs::write(dir.path().join("clip-42.mp4"), b"video").await.unwrap();

        let served = service.serve("clip-42.mp4").await.unwrap();
        assert_eq!(served.bytes, b"video");
        assert_eq!(served.content_type, "video/mp4");
        assert_eq!(served.display_name, "clip - Converted.mp4");
        assert_eq!(lifecycle.state("clip-42.mp4"), Some(ArtifactState::Downloaded));
    }

    #[tokio::test]
    async fn test_serve_unknown_extension_is_octet_stream() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        tokio::fs::write(dir.path().join("data-1.xyz"), b"?").await.unwrap();

        let served = service.serve("data-1.xyz").await.unwrap();
        assert_eq!(served.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_and_unsafe_names_are_not_found() {
        let dir = TempDir::new().unwrap();
        let (service, lifecycle) = service(&dir);

        for name in ["unknown-file.pdf", "../etc/passwd", "..", ""] {
            let err = service.serve(name).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{}", name);
        }
        // Lookups of missing files register nothing
        assert_eq!(lifecycle.state("unknown-file.pdf"), None);
    }

    #[tokio::test]
    async fn test_pending_output_is_not_served() {
        let dir = TempDir::new().unwrap();
        let (service, lifecycle) = service(&dir);
        let path = dir.path().join("half-7.pdf");
        tokio::fs::write(&path, b"partial").await.unwrap();
        lifecycle.begin_output("half-7.pdf", path);

        let err = service.serve("half-7.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

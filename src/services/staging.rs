use crate::config::StagingConfig;
use crate::utils::validation::{is_safe_stored_name, sanitize_filename, split_extension};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFilePart,

    #[error("File exceeds the maximum allowed size of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded file persisted in the staging directory
#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    pub storage_path: PathBuf,
    pub stored_name: String,
    pub original_name: String,
    pub declared_mime_type: String,
    pub size_bytes: u64,
}

/// The directory where uploads and converted outputs transiently live
pub struct StagingArea {
    config: StagingConfig,
    max_file_size: usize,
}

impl StagingArea {
    pub fn new(config: StagingConfig, max_file_size: usize) -> Self {
        Self {
            config,
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.config.dir).await
    }

    /// `<name>-<millis>-<random><ext>`, e.g. `notes.txt-1718000000000-48213.txt`.
    ///
    /// The sanitized name and extension are both bounded, so the result
    /// always fits a 255-byte file name.
    pub fn unique_upload_name(original_name: &str) -> String {
        let name = sanitize_filename(original_name);
        let suffix = rand::thread_rng().gen_range(0..1_000_000_000u32);
        let ext = split_extension(&name)
            .1
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        format!("{}-{}-{}{}", name, Utc::now().timestamp_millis(), suffix, ext)
    }

    /// `<stem>-<millis>.<target>`, e.g. `notes-1718000000000.pdf`
    pub fn output_name(original_name: &str, target_format: &str, millis: i64) -> String {
        let name = sanitize_filename(original_name);
        let (stem, _) = split_extension(&name);
        format!("{}-{}.{}", stem, millis, target_format.to_lowercase())
    }

    /// Path of a stored name inside the staging directory
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.config.dir.join(stored_name)
    }

    /// Resolves a client-supplied stored name, refusing anything that could
    /// escape the staging directory.
    pub fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        is_safe_stored_name(stored_name).then(|| self.path_for(stored_name))
    }

    /// Streams `reader` into a freshly named staging file.
    ///
    /// The partial file is removed when the stream fails or exceeds the
    /// size limit, so an error never leaves anything behind.
    pub async fn stage<R>(
        &self,
        original_name: &str,
        declared_mime_type: &str,
        reader: R,
    ) -> Result<StagedFile, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ensure_dir().await?;

        let stored_name = Self::unique_upload_name(original_name);
        let storage_path = self.path_for(&stored_name);

        // create_new: a stored name is never reused
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&storage_path)
            .await?;
        let partial = PartialFile::new(storage_path.clone());

        let limit = self.max_file_size as u64;
        let mut limited = reader.take(limit + 1);
        let copied = tokio::io::copy(&mut limited, &mut file).await;
        let flushed = match copied {
            Ok(n) => file.flush().await.map(|_| n),
            Err(e) => Err(e),
        };
        drop(file);

        let size_bytes = match flushed {
            Ok(n) if n > limit => {
                partial.remove().await;
                return Err(UploadError::PayloadTooLarge(self.max_file_size));
            }
            Ok(n) => n,
            Err(e) => {
                partial.remove().await;
                let msg = e.to_string();
                if msg.contains("length limit exceeded") {
                    return Err(UploadError::PayloadTooLarge(self.max_file_size));
                }
                return Err(UploadError::Io(e));
            }
        };

        partial.keep();

        tracing::info!(
            stored_name = %stored_name,
            size_bytes,
            mime = %declared_mime_type,
            "Staged upload"
        );

        Ok(StagedFile {
            storage_path,
            stored_name,
            original_name: original_name.to_string(),
            declared_mime_type: declared_mime_type.to_string(),
            size_bytes,
        })
    }
}

/// A staging file still being written. Dropped without [`PartialFile::keep`]
/// (including when the staging future itself is dropped) it is unlinked.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }

    async fn remove(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to remove partial upload {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Upload interrupted, removing {}", self.path.display());
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to remove partial upload {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staging(dir: &TempDir, max: usize) -> StagingArea {
        StagingArea::new(StagingConfig::new(dir.path().join("upload")), max)
    }

    #[test]
    fn test_unique_upload_name_shape() {
        let name = StagingArea::unique_upload_name("notes.txt");
        assert!(name.starts_with("notes.txt-"));
        assert!(name.ends_with(".txt"));

        let middle = &name["notes.txt-".len()..name.len() - ".txt".len()];
        let parts: Vec<&str> = middle.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn test_unique_upload_names_differ() {
        let names: std::collections::HashSet<String> = (0..64)
            .map(|_| StagingArea::unique_upload_name("same.bin"))
            .collect();
        assert!(names.len() > 1);
    }

    #[test]
    fn test_output_name() {
        assert_eq!(
            StagingArea::output_name("notes.txt", "PDF", 1718000000000),
            "notes-1718000000000.pdf"
        );
        assert_eq!(
            StagingArea::output_name("archive.tar.gz", "ZIP", 7),
            "archive.tar-7.zip"
        );
        assert_eq!(StagingArea::output_name("README", "txt", 1), "README-1.txt");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 1024);
        assert!(area.resolve("notes-1.pdf").is_some());
        assert!(area.resolve("../notes-1.pdf").is_none());
        assert!(area.resolve("a/b.pdf").is_none());
    }

    #[tokio::test]
    async fn test_stage_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 1024);

        let staged = area
            .stage("notes.txt", "text/plain", &b"hello world"[..])
            .await
            .unwrap();

        assert_eq!(staged.size_bytes, 11);
        assert_eq!(staged.original_name, "notes.txt");
        assert_eq!(staged.declared_mime_type, "text/plain");
        assert!(staged.storage_path.starts_with(area.dir()));
        assert_eq!(fs::read(&staged.storage_path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_stage_rejects_oversized_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 4);

        let err = area
            .stage("big.bin", "application/octet-stream", &b"12345"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::PayloadTooLarge(4)));

        let mut entries = fs::read_dir(area.dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stage_accepts_exact_limit() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 4);
        let staged = area.stage("ok.bin", "", &b"1234"[..]).await.unwrap();
        assert_eq!(staged.size_bytes, 4);
    }

    #[test]
    fn test_unique_upload_name_fits_for_long_names() {
        let dotted = format!("v1.{}.txt", "b".repeat(200));
        let plain = format!("{}.txt", "x".repeat(200));
        let odd_ext = format!("notes.{}", "e".repeat(200));

        for original in [&dotted, &plain] {
            let name = StagingArea::unique_upload_name(original);
            assert!(name.len() <= 255, "{} bytes", name.len());
            assert!(name.ends_with(".txt"), "{}", name);
        }

        // An extension too long to be one is not repeated after the suffix
        let name = StagingArea::unique_upload_name(&odd_ext);
        assert!(name.len() <= 255);
        assert!(name.rsplit('-').next().unwrap().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_output_name_for_long_names() {
        let original = format!("v1.{}.txt", "b".repeat(200));
        let name = StagingArea::output_name(&original, "PDF", 1718000000000);
        assert!(name.len() <= 255);
        assert!(name.starts_with("v1.bbb"));
        assert!(name.ends_with("-1718000000000.pdf"));
    }

    #[tokio::test]
    async fn test_stage_long_names() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 1024);

        for original in [
            format!("v1.{}.txt", "b".repeat(200)),
            format!("{}.txt", "x".repeat(200)),
        ] {
            let staged = area.stage(&original, "text/plain", &b"hi"[..]).await.unwrap();
            assert_eq!(staged.original_name, original);
            assert!(staged.stored_name.ends_with(".txt"));
            assert!(staged.storage_path.exists());
        }
    }

    #[tokio::test]
    async fn test_interrupted_stage_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 1024);
        area.ensure_dir().await.unwrap();

        // The writer half stays open, so the copy never finishes
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"first chunk").await.unwrap();

        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            area.stage("slow.txt", "text/plain", reader),
        )
        .await;
        assert!(stalled.is_err());
        drop(writer);

        let mut entries = fs::read_dir(area.dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_read_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, 1024);

        let broken = futures::stream::iter(vec![
            Ok(&b"some bytes"[..]),
            Err(std::io::Error::other("connection reset")),
        ]);
        let reader = tokio_util::io::StreamReader::new(broken);

        let err = area.stage("cut.txt", "text/plain", reader).await.unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));

        let mut entries = fs::read_dir(area.dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}

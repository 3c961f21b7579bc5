use crate::config::ConversionDelays;
use crate::services::classifier::{self, ConversionCategory};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Outcome of a single conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success { output_path: PathBuf },
    Failure { error: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unsupported file type for conversion: {0}")]
    UnsupportedType(String),
}

/// A converter for one category of input.
///
/// Implementations report I/O problems through [`ConversionResult::Failure`]
/// and never return early with an error.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path, target_format: &str) -> ConversionResult;
}

/// Placeholder converter: waits, then copies the input byte for byte
pub struct StubConverter {
    category: ConversionCategory,
    delay: Duration,
}

impl StubConverter {
    pub fn new(category: ConversionCategory, delay: Duration) -> Self {
        Self { category, delay }
    }
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(&self, input: &Path, output: &Path, target_format: &str) -> ConversionResult {
        tracing::debug!(
            category = %self.category,
            target = %target_format,
            "Simulating conversion of {}",
            input.display()
        );

        if let Some(parent) = output.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                tracing::error!("{} conversion error: {}", self.category, e);
                return ConversionResult::Failure {
                    error: e.to_string(),
                };
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match fs::copy(input, output).await {
            Ok(_) => ConversionResult::Success {
                output_path: output.to_path_buf(),
            },
            Err(e) => {
                tracing::error!("{} conversion error: {}", self.category, e);
                ConversionResult::Failure {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Routes inputs to the converter for their MIME category
#[derive(Clone)]
pub struct ConversionDispatcher {
    document: Arc<dyn Converter>,
    image: Arc<dyn Converter>,
    audio_video: Arc<dyn Converter>,
}

impl ConversionDispatcher {
    pub fn new(
        document: Arc<dyn Converter>,
        image: Arc<dyn Converter>,
        audio_video: Arc<dyn Converter>,
    ) -> Self {
        Self {
            document,
            image,
            audio_video,
        }
    }

    /// Dispatcher backed by the copy-through stubs
    pub fn stubs(delays: ConversionDelays) -> Self {
        Self::new(
            Arc::new(StubConverter::new(ConversionCategory::Document, delays.document)),
            Arc::new(StubConverter::new(ConversionCategory::Image, delays.image)),
            Arc::new(StubConverter::new(
                ConversionCategory::AudioVideo,
                delays.audio_video,
            )),
        )
    }

    pub fn route(&self, mime_type: &str) -> Result<ConversionCategory, DispatchError> {
        classifier::category_for(mime_type)
            .ok_or_else(|| DispatchError::UnsupportedType(mime_type.to_string()))
    }

    fn converter(&self, category: ConversionCategory) -> &dyn Converter {
        match category {
            ConversionCategory::Document => self.document.as_ref(),
            ConversionCategory::Image => self.image.as_ref(),
            ConversionCategory::AudioVideo => self.audio_video.as_ref(),
        }
    }

    pub async fn run(
        &self,
        category: ConversionCategory,
        input: &Path,
        output: &Path,
        target_format: &str,
    ) -> ConversionResult {
        self.converter(category)
            .convert(input, output, target_format)
            .await
    }

    /// Routes by `mime_type` and converts. Unsupported types touch nothing.
    pub async fn convert(
        &self,
        mime_type: &str,
        input: &Path,
        output: &Path,
        target_format: &str,
    ) -> Result<ConversionResult, DispatchError> {
        let category = self.route(mime_type)?;
        Ok(self.run(category, input, output, target_format).await)
    }
}

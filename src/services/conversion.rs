use crate::api::error::AppError;
use crate::services::converter::{ConversionDispatcher, ConversionResult};
use crate::services::lifecycle::LifecycleManager;
use crate::services::staging::{StagedFile, StagingArea};
use crate::utils::validation::validate_target_format;
use chrono::Utc;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;

pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Unsupported file type for conversion";

/// A finished conversion whose output is ready for download
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub download_id: String,
    pub filename: String,
    pub original_name: String,
    pub converted_format: String,
}

/// Runs one upload through classification, conversion and cleanup
pub struct ConversionService {
    staging: Arc<StagingArea>,
    dispatcher: ConversionDispatcher,
    lifecycle: Arc<LifecycleManager>,
}

impl ConversionService {
    pub fn new(
        staging: Arc<StagingArea>,
        dispatcher: ConversionDispatcher,
        lifecycle: Arc<LifecycleManager>,
    ) -> Self {
        Self {
            staging,
            dispatcher,
            lifecycle,
        }
    }

    /// Converts a staged upload. The input is gone when this returns,
    /// whatever the outcome; the output survives only on success.
    pub async fn convert(
        &self,
        staged: StagedFile,
        target_format: Option<&str>,
    ) -> Result<ConvertedFile, AppError> {
        let mut guard = self.lifecycle.guard();
        guard.track(staged.storage_path.clone());

        let target = match validate_target_format(target_format.unwrap_or_default()) {
            Ok(target) => target,
            Err(e) => {
                guard.cleanup_now().await;
                return Err(AppError::BadRequest(e.message));
            }
        };

        let category = match self.dispatcher.route(&staged.declared_mime_type) {
            Ok(category) => category,
            Err(e) => {
                tracing::info!("Rejecting {}: {}", staged.stored_name, e);
                guard.cleanup_now().await;
                return Err(AppError::BadRequest(UNSUPPORTED_TYPE_MESSAGE.to_string()));
            }
        };

        let (output_name, output_path) = self
            .reserve_output(&staged.original_name, &target)
            .await;
        guard.track_output(output_name.clone());

        tracing::info!(
            input = %staged.stored_name,
            output = %output_name,
            category = %category,
            "Converting to {}",
            target
        );

        match self
            .dispatcher
            .run(category, &staged.storage_path, &output_path, &target)
            .await
        {
            ConversionResult::Success { .. } => {
                let removed = self
                    .lifecycle
                    .remove_now(std::slice::from_ref(&staged.storage_path))
                    .await;
                if removed.iter().any(|outcome| outcome.is_failure()) {
                    // Left for the staging sweeper
                    tracing::warn!("Input {} outlived its conversion", staged.stored_name);
                }
                self.lifecycle.mark_ready(&output_name);
                guard.disarm();

                Ok(ConvertedFile {
                    download_id: download_id(),
                    filename: output_name,
                    original_name: staged.original_name,
                    converted_format: target,
                })
            }
            ConversionResult::Failure { error } => {
                tracing::warn!("Conversion of {} failed: {}", staged.stored_name, error);
                guard.cleanup_now().await;
                Err(AppError::Conversion(error))
            }
        }
    }

    /// Picks an output name nobody tracks yet and reserves it as `Pending`
    async fn reserve_output(&self, original_name: &str, target: &str) -> (String, PathBuf) {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let name = StagingArea::output_name(original_name, target, millis);
            let path = self.staging.path_for(&name);
            let on_disk = tokio::fs::try_exists(&path).await.unwrap_or(false);
            if !on_disk && self.lifecycle.begin_output(&name, path.clone()) {
                return (name, path);
            }
            millis += 1;
        }
    }
}

fn download_id() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen_range(0..1_000_000_000u32)
    )
}

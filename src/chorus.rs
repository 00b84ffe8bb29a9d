//! Chorus extraction for Vapord.
//!
//! The actual chorus detection is an external command-line tool treated as
//! a black box. This module owns the retry policy: start at the configured
//! target length and shrink it on every failed attempt until it reaches
//! zero.

use crate::config::ChorusSettings;
use crate::error::{Result, VaporError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Trait for chorus detection backends.
#[async_trait]
pub trait ChorusBackend: Send + Sync {
    /// Attempt to extract a chorus of roughly `duration_seconds` from
    /// `input` into `output`. Returns `Ok(false)` when no chorus was found
    /// at this target length.
    async fn find_chorus(&self, input: &Path, output: &Path, duration_seconds: u32)
        -> Result<bool>;
}

/// Chorus detection via an external command-line tool.
///
/// The tool is expected to accept
/// `<input> --output_file <output> --min_clip_length <seconds>`,
/// which matches the pychorus CLI.
pub struct CliChorusBackend {
    program: String,
}

impl CliChorusBackend {
    pub fn new(settings: &ChorusSettings) -> Self {
        Self {
            program: settings.program.clone(),
        }
    }
}

#[async_trait]
impl ChorusBackend for CliChorusBackend {
    async fn find_chorus(
        &self,
        input: &Path,
        output: &Path,
        duration_seconds: u32,
    ) -> Result<bool> {
        let result = Command::new(&self.program)
            .arg(input)
            .arg("--output_file").arg(output)
            .arg("--min_clip_length").arg(duration_seconds.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let out = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaporError::ToolNotFound(self.program.clone()));
            }
            Err(e) => {
                return Err(VaporError::ChorusTool(format!(
                    "{} execution failed: {e}",
                    self.program
                )));
            }
        };

        // A failed exit or a missing output file both count as "no chorus
        // at this length"; the caller retries with a smaller target.
        if !out.status.success() || !output.exists() {
            debug!(
                "No chorus found at {}s target (exit: {:?})",
                duration_seconds,
                out.status.code()
            );
            return Ok(false);
        }

        Ok(true)
    }
}

/// Retry loop around a [`ChorusBackend`].
pub struct ChorusExtractor {
    backend: Arc<dyn ChorusBackend>,
    initial_duration_seconds: u32,
    retry_step_seconds: u32,
}

impl ChorusExtractor {
    pub fn new(backend: Arc<dyn ChorusBackend>, settings: &ChorusSettings) -> Self {
        Self {
            backend,
            initial_duration_seconds: settings.initial_duration_seconds,
            // A zero step would retry the same target forever
            retry_step_seconds: settings.retry_step_seconds.max(1),
        }
    }

    /// Extract a chorus from `input` into `output`, shrinking the target
    /// length on each failed attempt. Returns `Ok(false)` when every
    /// attempt was exhausted.
    pub async fn extract(&self, input: &Path, output: &Path) -> Result<bool> {
        let mut target = self.initial_duration_seconds;

        while target > 0 {
            info!("Trying chorus extraction with {}s target", target);
            if self.backend.find_chorus(input, output, target).await? {
                return Ok(true);
            }
            target = target.saturating_sub(self.retry_step_seconds);
        }

        Ok(false)
    }
}

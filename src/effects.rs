//! Vaporwave effect processing.
//!
//! Two sequential sox invocations: slow the chorus down, then drench it in
//! reverb. Both exit statuses are checked so a failing stage surfaces as a
//! typed error instead of a corrupt file downstream.

use crate::config::EffectSettings;
use crate::error::{Result, VaporError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Trait for the effect chain.
#[async_trait]
pub trait EffectChain: Send + Sync {
    /// Apply the slow-down + reverb chain: `chorus` is slowed into `slow`,
    /// which is reverbed into `output`.
    async fn apply(&self, chorus: &Path, slow: &Path, output: &Path) -> Result<()>;
}

/// sox backed effect chain.
pub struct SoxEffects {
    program: String,
    speed: f64,
    volume: f64,
    reverb: u32,
}

impl SoxEffects {
    pub fn new(settings: &EffectSettings) -> Self {
        Self {
            program: settings.program.clone(),
            speed: settings.speed,
            volume: settings.volume,
            reverb: settings.reverb,
        }
    }

    fn speed_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-V0".to_string(),
            "-v".to_string(),
            self.volume.to_string(),
            input.display().to_string(),
            output.display().to_string(),
            "speed".to_string(),
            self.speed.to_string(),
        ]
    }

    fn reverb_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-V0".to_string(),
            "-v".to_string(),
            self.volume.to_string(),
            input.display().to_string(),
            output.display().to_string(),
            "reverb".to_string(),
            self.reverb.to_string(),
        ]
    }

    async fn run(&self, args: &[String], stage: &str) -> Result<()> {
        let result = Command::new(&self.program)
            .args(args)
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
                return Err(VaporError::Effect(format!(
                    "{} execution failed: {e}",
                    self.program
                )));
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(VaporError::Effect(format!("{stage} stage failed: {stderr}")));
        }

        Ok(())
    }
}

#[async_trait]
impl EffectChain for SoxEffects {
    async fn apply(&self, chorus: &Path, slow: &Path, output: &Path) -> Result<()> {
        info!("Applying vaporwave FX");

        self.run(&self.speed_args(chorus, slow), "speed").await?;
        self.run(&self.reverb_args(slow, output), "reverb").await?;

        Ok(())
    }
}

//! Audio download for Vapord.
//!
//! Downloads the best available audio track for a resolved video using
//! yt-dlp and normalizes it to an MP3 named after the request id.

use crate::config::FetcherSettings;
use crate::error::{Result, VaporError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Trait for audio downloaders.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the audio track of `url` into `output_dir`, returning the
    /// path of the resulting `<request_id>.mp3`.
    async fn fetch(&self, url: &str, request_id: &str, output_dir: &Path) -> Result<PathBuf>;
}

/// yt-dlp backed audio fetcher.
pub struct YtDlpFetcher {
    audio_quality: String,
}

impl YtDlpFetcher {
    pub fn new(settings: &FetcherSettings) -> Self {
        Self {
            audio_quality: settings.audio_quality.clone(),
        }
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, request_id: &str, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let target_path = output_dir.join(format!("{}.mp3", request_id));
        let template = output_dir.join(format!("{}.%(ext)s", request_id));

        info!("Downloading audio from {}", url);

        let result = Command::new("yt-dlp")
            .arg("--extract-audio")
            .arg("--audio-format").arg("mp3")
            .arg("--audio-quality").arg(&self.audio_quality)
            .arg("--output").arg(template.to_str().unwrap_or_default())
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaporError::ToolNotFound("yt-dlp".into()));
            }
            Err(e) => {
                return Err(VaporError::Download(format!("yt-dlp execution failed: {e}")));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaporError::Download(format!("yt-dlp failed: {stderr}")));
        }

        // yt-dlp may leave a different container behind; normalize to mp3
        let downloaded = find_audio_file(output_dir, request_id)?;

        if downloaded != target_path {
            normalize_to_mp3(&downloaded, &target_path).await?;
            let _ = std::fs::remove_file(&downloaded);
        }

        Ok(target_path)
    }
}

/// Locates a downloaded audio file by request id.
fn find_audio_file(dir: &Path, request_id: &str) -> Result<PathBuf> {
    // Common audio formats that yt-dlp may produce
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{}.{}", request_id, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(VaporError::Download(
        "Audio file not found after download".into(),
    ))
}

/// Converts an audio file to MP3 using ffmpeg.
async fn normalize_to_mp3(source: &Path, dest: &Path) -> Result<()> {
    debug!("Converting {:?} to MP3", source);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(VaporError::Download(format!("ffmpeg conversion failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VaporError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(VaporError::Download(format!("ffmpeg error: {e}"))),
    }
}

//! yt-dlp backed video provider.

use super::{VideoCandidate, VideoProvider};
use crate::error::{Result, VaporError};
use async_trait::async_trait;
use tracing::debug;

/// Video search and metadata via the yt-dlp executable.
pub struct YtDlpProvider;

impl YtDlpProvider {
    pub fn new() -> Self {
        Self
    }

    fn candidate_from_json(json: &serde_json::Value) -> Option<VideoCandidate> {
        let id = json["id"].as_str()?.to_string();
        let title = json["title"].as_str().unwrap_or("Unknown Title").to_string();
        let duration = json["duration"].as_f64().map(|d| d as u32);

        Some(VideoCandidate {
            url: format!("https://www.youtube.com/watch?v={}", id),
            id,
            title,
            duration_seconds: duration,
        })
    }
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoProvider for YtDlpProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let target = format!("ytsearch{}:{}", limit, query);

        let output = tokio::process::Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--no-download",
                "--no-warnings",
                "--flat-playlist",
                &target,
            ])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VaporError::ToolNotFound("yt-dlp".to_string())
                } else {
                    VaporError::Lookup(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaporError::Lookup(format!("Search failed: {}", stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ids = Vec::new();

        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(json) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(id) = json["id"].as_str() {
                    ids.push(id.to_string());
                }
            }
        }

        debug!("yt-dlp search for {:?} returned {} ids", query, ids.len());
        Ok(ids)
    }

    async fn metadata(&self, id: &str) -> Result<VideoCandidate> {
        let url = format!("https://www.youtube.com/watch?v={}", id);

        let output = tokio::process::Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-warnings", &url])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VaporError::ToolNotFound("yt-dlp".to_string())
                } else {
                    VaporError::Lookup(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaporError::Lookup(format!(
                "Video {} not found or unavailable: {}",
                id, stderr
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| VaporError::Lookup(format!("Failed to parse yt-dlp output: {}", e)))?;

        Self::candidate_from_json(&json)
            .ok_or_else(|| VaporError::Lookup(format!("yt-dlp output missing id for {}", id)))
    }
}

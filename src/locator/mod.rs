//! Media location for Vapord.
//!
//! Resolves a free-text query or a direct YouTube link to a single video
//! candidate. Search results are scanned in order and the first video under
//! the duration ceiling wins; direct links skip the ceiling unless
//! configured otherwise.

mod ytdlp;

pub use ytdlp::YtDlpProvider;

use crate::config::LocatorSettings;
use crate::error::{Result, VaporError};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

/// A resolved video with the metadata the pipeline needs.
#[derive(Debug, Clone)]
pub struct VideoCandidate {
    /// Source video identifier.
    pub id: String,
    /// Canonical watch URL.
    pub url: String,
    /// Video title.
    pub title: String,
    /// Duration in seconds, if known.
    pub duration_seconds: Option<u32>,
}

/// Trait for video search/metadata providers.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Search for videos matching `query`, returning candidate ids in
    /// result order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Fetch metadata for a single video id.
    async fn metadata(&self, id: &str) -> Result<VideoCandidate>;
}

/// Resolves queries and links to a single acceptable video.
pub struct MediaLocator {
    provider: Arc<dyn VideoProvider>,
    max_duration_seconds: u32,
    search_limit: usize,
    enforce_ceiling_on_url: bool,
    url_regex: Regex,
}

impl MediaLocator {
    pub fn new(provider: Arc<dyn VideoProvider>, settings: &LocatorSettings) -> Self {
        // Matches the YouTube URL forms users paste into chat. Bare video
        // ids are deliberately not matched; they are treated as search text.
        let url_regex = Regex::new(
            r"(?x)
            ^(?:https?://)?
            (?:www\.)?
            (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
            ([a-zA-Z0-9_-]{11})
        ",
        )
        .expect("Invalid regex");

        Self {
            provider,
            max_duration_seconds: settings.max_duration_seconds,
            search_limit: settings.search_limit,
            enforce_ceiling_on_url: settings.enforce_ceiling_on_url,
            url_regex,
        }
    }

    /// Extract a video id if the input is a recognized YouTube link.
    pub fn extract_video_id(&self, input: &str) -> Option<String> {
        self.url_regex
            .captures(input.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Resolve `query` to a video candidate.
    pub async fn locate(&self, query: &str) -> Result<VideoCandidate> {
        if let Some(video_id) = self.extract_video_id(query) {
            debug!("Query is a direct link to {}", video_id);
            let candidate = self.provider.metadata(&video_id).await?;

            if self.enforce_ceiling_on_url {
                match candidate.duration_seconds {
                    Some(d) if d < self.max_duration_seconds => {}
                    _ => return Err(VaporError::NoSuitableVideo(candidate.title)),
                }
            }

            return Ok(candidate);
        }

        let candidates = self.provider.search(query, self.search_limit).await?;
        info!("Search returned {} candidates", candidates.len());

        let mut last_title: Option<String> = None;
        for id in candidates {
            let candidate = self.provider.metadata(&id).await?;
            match candidate.duration_seconds {
                // First fit under the ceiling wins, not best fit.
                Some(d) if d < self.max_duration_seconds => {
                    debug!("Selected {} ({}s)", candidate.title, d);
                    return Ok(candidate);
                }
                _ => {
                    debug!("Skipping {} (too long or unknown duration)", candidate.title);
                    last_title = Some(candidate.title);
                }
            }
        }

        Err(VaporError::NoSuitableVideo(
            last_title.unwrap_or_else(|| query.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        search_results: Vec<String>,
        videos: HashMap<String, VideoCandidate>,
        metadata_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(videos: Vec<VideoCandidate>) -> Self {
            let search_results = videos.iter().map(|v| v.id.clone()).collect();
            let videos = videos.into_iter().map(|v| (v.id.clone(), v)).collect();
            Self {
                search_results,
                videos,
                metadata_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VideoProvider for MockProvider {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<String>> {
            Ok(self.search_results.iter().take(limit).cloned().collect())
        }

        async fn metadata(&self, id: &str) -> Result<VideoCandidate> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            self.videos
                .get(id)
                .cloned()
                .ok_or_else(|| VaporError::Lookup(format!("unknown id {}", id)))
        }
    }

    fn candidate(id: &str, title: &str, duration: u32) -> VideoCandidate {
        VideoCandidate {
            id: id.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            title: title.to_string(),
            duration_seconds: Some(duration),
        }
    }

    fn locator(provider: MockProvider, enforce_on_url: bool) -> MediaLocator {
        let settings = LocatorSettings {
            enforce_ceiling_on_url: enforce_on_url,
            ..LocatorSettings::default()
        };
        MediaLocator::new(Arc::new(provider), &settings)
    }

    #[test]
    fn test_extract_video_id() {
        let loc = locator(MockProvider::new(vec![]), false);

        assert_eq!(
            loc.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            loc.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            loc.extract_video_id("youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );

        // Bare ids and plain text are search queries, not links
        assert_eq!(loc.extract_video_id("dQw4w9WgXcQ"), None);
        assert_eq!(loc.extract_video_id("some test song"), None);
    }

    #[tokio::test]
    async fn test_search_picks_first_under_ceiling() {
        let loc = locator(
            MockProvider::new(vec![
                candidate("aaaaaaaaaaa", "Extended Mix", 1200),
                candidate("bbbbbbbbbbb", "Radio Edit", 200),
                candidate("ccccccccccc", "Shorter Still", 100),
            ]),
            false,
        );

        let found = loc.locate("some test song").await.unwrap();
        // First fit in result order, not the shortest
        assert_eq!(found.id, "bbbbbbbbbbb");
    }

    #[tokio::test]
    async fn test_search_all_too_long_reports_last_title() {
        let loc = locator(
            MockProvider::new(vec![
                candidate("aaaaaaaaaaa", "Ten Hour Loop", 36000),
                candidate("bbbbbbbbbbb", "Full Album", 3600),
            ]),
            false,
        );

        let err = loc.locate("some test song").await.unwrap_err();
        match err {
            VaporError::NoSuitableVideo(title) => assert_eq!(title, "Full Album"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_url_path_bypasses_ceiling() {
        let mut long_video = candidate("dQw4w9WgXcQ", "Very Long Video", 4000);
        long_video.url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string();
        let loc = locator(MockProvider::new(vec![long_video]), false);

        // 4000s is far over the 600s ceiling, but the link path accepts it
        let found = loc
            .locate("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(found.duration_seconds, Some(4000));
    }

    #[tokio::test]
    async fn test_url_path_ceiling_when_enforced() {
        let loc = locator(
            MockProvider::new(vec![candidate("dQw4w9WgXcQ", "Very Long Video", 4000)]),
            true,
        );

        let err = loc
            .locate("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, VaporError::NoSuitableVideo(_)));
    }

    #[tokio::test]
    async fn test_unknown_duration_is_skipped() {
        let mut no_duration = candidate("aaaaaaaaaaa", "Live Stream", 0);
        no_duration.duration_seconds = None;
        let loc = locator(
            MockProvider::new(vec![no_duration, candidate("bbbbbbbbbbb", "A Song", 180)]),
            false,
        );

        let found = loc.locate("some test song").await.unwrap();
        assert_eq!(found.id, "bbbbbbbbbbb");
    }
}

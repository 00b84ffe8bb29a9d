//! Pipeline orchestrator for Vapord.
//!
//! Sequences one request end to end: validate the query, locate a video,
//! check the clip cache, and on a miss run download, chorus extraction and
//! the effect chain. Intermediate files are cleaned up on success and
//! failure alike.

use crate::cache::CacheStore;
use crate::chorus::{ChorusExtractor, CliChorusBackend};
use crate::config::Settings;
use crate::effects::{EffectChain, SoxEffects};
use crate::error::{Result, VaporError};
use crate::fetcher::{AudioFetcher, YtDlpFetcher};
use crate::locator::{MediaLocator, VideoCandidate, YtDlpProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// The finished clip handed back to the chat layer.
#[derive(Debug)]
pub struct Delivery {
    /// Path of the clip to send.
    pub path: PathBuf,
    /// Resolved video title.
    pub title: String,
    /// Whether the clip came straight from the cache.
    pub cached: bool,
    /// Current cache size in megabytes, set when a fresh entry pushed the
    /// cache over the advisory threshold.
    pub cache_warning_mb: Option<u64>,
}

/// The main orchestrator for the Vapord pipeline.
pub struct Orchestrator {
    locator: MediaLocator,
    fetcher: Arc<dyn AudioFetcher>,
    chorus: ChorusExtractor,
    effects: Arc<dyn EffectChain>,
    cache: CacheStore,
    min_query_length: usize,
}

impl Orchestrator {
    /// Create an orchestrator with the real yt-dlp/chorus-tool/sox
    /// components.
    pub fn new(settings: &Settings) -> Result<Self> {
        let locator = MediaLocator::new(Arc::new(YtDlpProvider::new()), &settings.locator);
        let fetcher = Arc::new(YtDlpFetcher::new(&settings.fetcher));
        let chorus = ChorusExtractor::new(
            Arc::new(CliChorusBackend::new(&settings.chorus)),
            &settings.chorus,
        );
        let effects = Arc::new(SoxEffects::new(&settings.effects));
        let cache = CacheStore::new(&settings.cache_dir(), &settings.cache)?;

        Ok(Self {
            locator,
            fetcher,
            chorus,
            effects,
            cache,
            min_query_length: settings.bot.min_query_length,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: &Settings,
        locator: MediaLocator,
        fetcher: Arc<dyn AudioFetcher>,
        chorus: ChorusExtractor,
        effects: Arc<dyn EffectChain>,
    ) -> Result<Self> {
        let cache = CacheStore::new(&settings.cache_dir(), &settings.cache)?;

        Ok(Self {
            locator,
            fetcher,
            chorus,
            effects,
            cache,
            min_query_length: settings.bot.min_query_length,
        })
    }

    /// Get a reference to the cache store.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run the full pipeline for one request.
    #[instrument(skip(self, query))]
    pub async fn handle_request(&self, request_id: i64, query: &str) -> Result<Delivery> {
        let started = Instant::now();
        let outcome = self.run_pipeline(request_id, query).await;

        match &outcome {
            Ok(delivery) if delivery.cached => {
                info!("Served {:?} from cache in {:.1}s", delivery.title, started.elapsed().as_secs_f64());
            }
            Ok(delivery) => {
                info!("Produced {:?} in {:.1}s", delivery.title, started.elapsed().as_secs_f64());
            }
            Err(err) => {
                info!("Request failed after {:.1}s: {}", started.elapsed().as_secs_f64(), err);
            }
        }

        outcome
    }

    async fn run_pipeline(&self, request_id: i64, query: &str) -> Result<Delivery> {
        let query = query.trim();
        if query.chars().count() < self.min_query_length {
            return Err(VaporError::QueryTooShort);
        }

        info!("Searching for query");
        let candidate = self.locator.locate(query).await?;
        let key = self.cache.key_for(&candidate.title);

        // Hold the key for the whole cache-check + production window so two
        // requests resolving to the same title never produce concurrently.
        let _guard = self.cache.lock_key(&key).await;

        if let Some(path) = self.cache.lookup(&key) {
            info!("Found {:?} cached", path);
            return Ok(Delivery {
                path,
                title: candidate.title,
                cached: true,
                cache_warning_mb: None,
            });
        }

        let produced = self.produce(request_id, &candidate, &key).await;
        self.cleanup_intermediates(request_id);

        let path = produced?;

        Ok(Delivery {
            path,
            cache_warning_mb: self.cache.over_threshold(),
            title: candidate.title,
            cached: false,
        })
    }

    /// Fetch, extract and transform. Only called on a cache miss, under the
    /// key lock.
    async fn produce(
        &self,
        request_id: i64,
        candidate: &VideoCandidate,
        key: &str,
    ) -> Result<PathBuf> {
        let dir = self.cache.dir();
        let stem = request_id.to_string();

        info!("Downloading video and converting to mp3");
        let audio_path = self.fetcher.fetch(&candidate.url, &stem, dir).await?;

        let chorus_path = dir.join(format!("{}_chorus.wav", stem));
        let slow_path = dir.join(format!("{}_slow.wav", stem));
        let vapor_path = self.cache.entry_path(key);

        info!("Searching for song chorus");
        let found = self.chorus.extract(&audio_path, &chorus_path).await?;
        if !found {
            return Err(VaporError::NoChorusFound(candidate.title.clone()));
        }

        self.effects
            .apply(&chorus_path, &slow_path, &vapor_path)
            .await?;

        Ok(vapor_path)
    }

    /// Best-effort removal of per-request intermediate files. Absent files
    /// are expected on early failures.
    fn cleanup_intermediates(&self, request_id: i64) {
        let dir = self.cache.dir();
        let names = [
            format!("{}.mp3", request_id),
            format!("{}_chorus.wav", request_id),
            format!("{}_slow.wav", request_id),
        ];

        for name in names {
            let path = dir.join(name);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {:?}: {}", path, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chorus::ChorusBackend;
    use crate::config::{LocatorSettings, Settings};
    use crate::locator::VideoProvider;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        candidates: Vec<VideoCandidate>,
        search_calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoProvider for FakeProvider {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<String>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .candidates
                .iter()
                .take(limit)
                .map(|c| c.id.clone())
                .collect())
        }

        async fn metadata(&self, id: &str) -> Result<VideoCandidate> {
            self.candidates
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| VaporError::Lookup(format!("unknown id {}", id)))
        }
    }

    /// Writes a fake mp3 where yt-dlp would.
    struct FakeFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioFetcher for FakeFetcher {
        async fn fetch(&self, _url: &str, request_id: &str, output_dir: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = output_dir.join(format!("{}.mp3", request_id));
            std::fs::write(&path, b"mp3 bytes")?;
            Ok(path)
        }
    }

    struct FakeChorus {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl ChorusBackend for FakeChorus {
        async fn find_chorus(&self, _input: &Path, output: &Path, _duration: u32) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                std::fs::write(output, b"chorus bytes")?;
            }
            Ok(self.succeed)
        }
    }

    struct FakeEffects {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EffectChain for FakeEffects {
        async fn apply(&self, _chorus: &Path, slow: &Path, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(slow, b"slow bytes")?;
            std::fs::write(output, b"vapor bytes")?;
            Ok(())
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        fetcher: Arc<FakeFetcher>,
        chorus: Arc<FakeChorus>,
        effects: Arc<FakeEffects>,
        _dir: tempfile::TempDir,
    }

    fn harness(candidates: Vec<VideoCandidate>, chorus_succeeds: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.cache_dir = dir.path().to_str().unwrap().to_string();

        let provider = Arc::new(FakeProvider {
            candidates,
            search_calls: AtomicUsize::new(0),
        });
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let chorus_backend = Arc::new(FakeChorus {
            calls: AtomicUsize::new(0),
            succeed: chorus_succeeds,
        });
        let effects = Arc::new(FakeEffects {
            calls: AtomicUsize::new(0),
        });

        let locator = MediaLocator::new(provider, &LocatorSettings::default());
        let chorus = ChorusExtractor::new(chorus_backend.clone(), &settings.chorus);

        let orchestrator = Orchestrator::with_components(
            &settings,
            locator,
            fetcher.clone(),
            chorus,
            effects.clone(),
        )
        .unwrap();

        Harness {
            orchestrator,
            fetcher,
            chorus: chorus_backend,
            effects,
            _dir: dir,
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

    #[tokio::test]
    async fn test_short_query_never_invokes_pipeline() {
        let h = harness(vec![candidate("aaaaaaaaaaa", "A Song", 200)], true);

        let err = h.orchestrator.handle_request(1, "xy").await.unwrap_err();
        assert!(matches!(err, VaporError::QueryTooShort));

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.chorus.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.effects.calls.load(Ordering::SeqCst), 0);

        // No files were created either
        let files: Vec<_> = std::fs::read_dir(h.orchestrator.cache().dir())
            .unwrap()
            .collect();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_success_cleans_intermediates() {
        let h = harness(vec![candidate("aaaaaaaaaaa", "Some Test Song", 200)], true);

        let delivery = h
            .orchestrator
            .handle_request(42, "some test song")
            .await
            .unwrap();

        assert!(!delivery.cached);
        assert_eq!(delivery.title, "Some Test Song");
        assert!(delivery.path.exists());
        assert!(delivery
            .path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_vapor.wav"));

        let dir = h.orchestrator.cache().dir();
        assert!(!dir.join("42.mp3").exists());
        assert!(!dir.join("42_chorus.wav").exists());
        assert!(!dir.join("42_slow.wav").exists());
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let h = harness(vec![candidate("aaaaaaaaaaa", "Some Test Song", 200)], true);

        let first = h
            .orchestrator
            .handle_request(1, "some test song")
            .await
            .unwrap();
        assert!(!first.cached);
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

        let second = h
            .orchestrator
            .handle_request(2, "some test song")
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.path, first.path);

        // No second fetch/extract/effect pass
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.chorus.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.effects.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_candidates_too_long() {
        let h = harness(
            vec![
                candidate("aaaaaaaaaaa", "Ten Hour Version", 36000),
                candidate("bbbbbbbbbbb", "Full Concert", 7200),
            ],
            true,
        );

        let err = h
            .orchestrator
            .handle_request(1, "some test song")
            .await
            .unwrap_err();

        match err {
            VaporError::NoSuitableVideo(title) => assert_eq!(title, "Full Concert"),
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
        let files: Vec<_> = std::fs::read_dir(h.orchestrator.cache().dir())
            .unwrap()
            .collect();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_chorus_exhaustion_cleans_up_and_reports_title() {
        let h = harness(vec![candidate("aaaaaaaaaaa", "Some Test Song", 200)], false);

        let err = h
            .orchestrator
            .handle_request(7, "some test song")
            .await
            .unwrap_err();

        match err {
            VaporError::NoChorusFound(title) => assert_eq!(title, "Some Test Song"),
            other => panic!("unexpected error: {:?}", other),
        }

        // Exactly the {15, 10, 5} retry sequence
        assert_eq!(h.chorus.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.effects.calls.load(Ordering::SeqCst), 0);

        // Downloaded audio was cleaned up despite the failure
        let dir = h.orchestrator.cache().dir();
        assert!(!dir.join("7.mp3").exists());
        assert!(!dir.join("7_chorus.wav").exists());
    }
}

//! Configuration settings for Vapord.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub locator: LocatorSettings,
    pub fetcher: FetcherSettings,
    pub chorus: ChorusSettings,
    pub effects: EffectSettings,
    pub cache: CacheSettings,
    pub bot: BotSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Working directory for downloaded, intermediate, and cached audio.
    pub cache_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Video location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    /// Maximum video duration accepted from search results, in seconds.
    pub max_duration_seconds: u32,
    /// How many search candidates to consider, in result order.
    pub search_limit: usize,
    /// Apply the duration ceiling to direct video links too.
    ///
    /// Off by default: a user pasting a link is trusted to have picked
    /// something sensible, matching the search/link asymmetry of the
    /// original bot.
    pub enforce_ceiling_on_url: bool,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            max_duration_seconds: 600, // 10 minutes
            search_limit: 10,
            enforce_ceiling_on_url: false,
        }
    }
}

/// Audio download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherSettings {
    /// Target audio bitrate passed to yt-dlp.
    pub audio_quality: String,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            audio_quality: "192K".to_string(),
        }
    }
}

/// Chorus extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusSettings {
    /// Chorus-finder executable to invoke.
    pub program: String,
    /// First target chorus length, in seconds.
    pub initial_duration_seconds: u32,
    /// How much to shrink the target on each failed attempt.
    pub retry_step_seconds: u32,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            program: "pychorus".to_string(),
            initial_duration_seconds: 15,
            retry_step_seconds: 5,
        }
    }
}

/// Vaporwave effect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    /// Audio effect executable to invoke.
    pub program: String,
    /// Playback speed factor for the slow-down stage.
    pub speed: f64,
    /// Volume attenuation applied at both stages.
    pub volume: f64,
    /// Reverberance percentage for the reverb stage.
    pub reverb: u32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            program: "sox".to_string(),
            speed: 0.63,
            volume: 0.99,
            reverb: 100,
        }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Length of the sanitized title key.
    pub key_length: usize,
    /// Advisory cache size threshold in megabytes. No eviction is
    /// performed; the primary admin is notified when exceeded.
    pub warn_threshold_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key_length: 15,
            warn_threshold_mb: 500,
        }
    }
}

/// Chat bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Telegram user ids allowed to run /test and /restart.
    pub admin_ids: Vec<u64>,
    /// Minimum length of a /vapor query.
    pub min_query_length: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            min_query_length: 5,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VaporError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vapord")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded cache directory path.
    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.cache_dir)
    }
}

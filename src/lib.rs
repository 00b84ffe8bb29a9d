//! Vapord - Vaporwave Telegram Bot
//!
//! A Telegram bot that turns a song name or YouTube link into a slowed +
//! reverbed chorus clip.
//!
//! # Overview
//!
//! Given `/vapor <query or URL>`, Vapord:
//! - Resolves a video (first search hit under the duration ceiling, or the
//!   linked video directly)
//! - Downloads its audio with yt-dlp
//! - Finds the chorus with an external chorus-finder tool, shrinking the
//!   target length on failed attempts
//! - Slows it down and applies reverb with sox
//! - Caches the finished clip under a sanitized-title key
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `locator` - Video search and metadata resolution
//! - `fetcher` - Audio download
//! - `chorus` - Chorus extraction and retry policy
//! - `effects` - Slow-down + reverb effect chain
//! - `cache` - Clip cache with per-key production locks
//! - `orchestrator` - Pipeline coordination
//! - `bot` - Telegram command surface

pub mod bot;
pub mod cache;
pub mod chorus;
pub mod config;
pub mod effects;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod orchestrator;

pub use error::{Result, VaporError};

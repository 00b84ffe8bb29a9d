//! Configuration management for Vapord.

mod settings;

pub use settings::{
    BotSettings, CacheSettings, ChorusSettings, EffectSettings, FetcherSettings,
    GeneralSettings, LocatorSettings, Settings,
};

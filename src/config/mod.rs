//! Widget configuration.
//!
//! [`AppConfig`] groups one section per subsystem (`capture`, `playback`,
//! `endpoint`, `phrases`, `ui`) and is persisted as TOML at the location
//! resolved by [`AppPaths`].

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, CONFIG_ENV};
pub use settings::{AppConfig, CaptureConfig, EndpointConfig, Phrases, PlaybackConfig, UiConfig};

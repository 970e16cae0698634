//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every struct is `#[serde(default)]` so a partially written settings file
//! still loads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for the voice capture controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// BCP-47 language tag; the recognizer uses its primary subtag.
    pub language: String,
    /// Milliseconds of silence after which a listening session is stopped.
    pub silence_timeout_ms: u64,
    /// GGML Whisper model.  A relative path is looked up in the models
    /// directory next to `settings.toml`.
    pub model: PathBuf,
}

impl CaptureConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    /// Absolute location of [`model`](Self::model).
    pub fn model_path(&self, paths: &AppPaths) -> PathBuf {
        if self.model.is_absolute() {
            self.model.clone()
        } else {
            paths.models_dir.join(&self.model)
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            silence_timeout_ms: 5_000,
            model: PathBuf::from("ggml-base.en.bin"),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Settings for spoken replies and voice selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Speak assistant replies at all.
    pub enabled: bool,
    /// Speaking rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Exact voice name to use.  `None` runs the hint-based selection.
    pub voice: Option<String>,
    /// Only voices whose language starts with this prefix are considered
    /// first.
    pub language_prefix: String,
    /// Case-insensitive name fragments that make a voice preferred.
    pub preferred_voice_hints: Vec<String>,
    /// Case-insensitive name fragments that rule a voice out in the second
    /// selection pass.
    pub avoided_voice_hints: Vec<String>,
    /// Pace of the built-in paced engine at `rate == 1.0`.
    pub words_per_minute: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 1.2,
            voice: None,
            language_prefix: "en".into(),
            preferred_voice_hints: ["female", "zira", "samantha", "ava"]
                .into_iter()
                .map(String::from)
                .collect(),
            avoided_voice_hints: ["male", "david", "aaron", "paul", "mike", "zack", "daniel"]
                .into_iter()
                .map(String::from)
                .collect(),
            words_per_minute: 170,
        }
    }
}

// ---------------------------------------------------------------------------
// EndpointConfig
// ---------------------------------------------------------------------------

/// Where commands are submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Scheme, host and port of the assistant server.
    pub base_url: String,
    /// Path of the command route, appended to `base_url`.
    pub command_path: String,
    /// Maximum seconds to wait for a reply before giving up.
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Full URL of the command route.
    ///
    /// ```
    /// use voice_chat::config::EndpointConfig;
    ///
    /// let cfg = EndpointConfig {
    ///     base_url: "http://localhost:5000/".into(),
    ///     ..EndpointConfig::default()
    /// };
    /// assert_eq!(cfg.command_url(), "http://localhost:5000/send_command");
    /// ```
    pub fn command_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.command_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            command_path: "/send_command".into(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Phrases
// ---------------------------------------------------------------------------

/// Fixed sentences the assistant displays or speaks on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub greeting: String,
    /// Spoken when a listening session times out without input.
    pub no_input: String,
    /// Spoken and displayed when the recognizer reports a fault.
    pub microphone_issue: String,
    /// Spoken after the server answered with an error status.
    pub server_trouble: String,
    /// Displayed when the server could not be reached.
    pub network_error: String,
    /// Spoken when the server could not be reached.
    pub network_lost: String,
    /// Display text for image replies that carry no `text_response`.
    pub default_structured_text: String,
    /// Used when a reply has neither text nor a known structure.
    pub unknown_response: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm Senorita Assistant. How can I help you? \
                       Click the Voice button to speak your command."
                .into(),
            no_input: "Sorry, I didn't catch that.".into(),
            microphone_issue: "I experienced an issue with the microphone.".into(),
            server_trouble: "I had trouble connecting to the server. Please check the console."
                .into(),
            network_error: "Network Error: Could not reach the server.".into(),
            network_lost: "I lost my connection. Please check the network.".into(),
            default_structured_text: "Here is your content.".into(),
            unknown_response: "Sorry, I received an unknown non-text response.".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Desktop widget appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial window size `(width, height)` in points.
    pub window_size: (f32, f32),
    /// Keep the widget floating above all other windows.
    pub always_on_top: bool,
    /// Speak the greeting once a voice is available.
    pub greet_on_start: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (420.0, 560.0),
            always_on_top: false,
            greet_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_chat::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub endpoint: EndpointConfig,
    pub phrases: Phrases,
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        let paths = AppPaths::new();
        log::debug!("config: loading {}", paths.settings_file.display());
        Self::load_from(&paths.settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

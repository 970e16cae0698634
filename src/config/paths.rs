//! Where the widget keeps `settings.toml`.
//!
//! The platform config directory from `dirs` is used unless
//! `VOICE_CHAT_CONFIG` names a settings file explicitly:
//!
//!   Windows: %APPDATA%\voice-chat\settings.toml
//!   macOS:   ~/Library/Application Support/voice-chat/settings.toml
//!   Linux:   ~/.config/voice-chat/settings.toml
//!
//! Whisper models live in `models/` beside the settings file.

use std::path::{Path, PathBuf};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "VOICE_CHAT_CONFIG";

const APP_DIR: &str = "voice-chat";
const SETTINGS_FILE: &str = "settings.toml";
const MODELS_DIR: &str = "models";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Whisper model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    /// Resolve the settings location for this host.
    ///
    /// Falls back to `./voice-chat` when the platform has no config
    /// directory.
    pub fn new() -> Self {
        if let Some(file) = std::env::var_os(CONFIG_ENV) {
            return Self::for_file(PathBuf::from(file));
        }

        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::in_dir(base.join(APP_DIR))
    }

    /// `settings.toml` inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let config_dir = dir.into();
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            models_dir: config_dir.join(MODELS_DIR),
            config_dir,
        }
    }

    /// An explicit settings file; its parent becomes the config dir.
    pub fn for_file(file: impl Into<PathBuf>) -> Self {
        let settings_file = file.into();
        let config_dir = settings_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            models_dir: config_dir.join(MODELS_DIR),
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_appends_settings_file() {
        let paths = AppPaths::in_dir("/tmp/vc");
        assert_eq!(paths.config_dir, PathBuf::from("/tmp/vc"));
        assert_eq!(paths.settings_file, PathBuf::from("/tmp/vc/settings.toml"));
        assert_eq!(paths.models_dir, PathBuf::from("/tmp/vc/models"));
    }

    #[test]
    fn for_file_uses_parent_as_dir() {
        let paths = AppPaths::for_file("/etc/vc/widget.toml");
        assert_eq!(paths.config_dir, PathBuf::from("/etc/vc"));
        assert!(paths.settings_file.ends_with("widget.toml"));
        assert_eq!(paths.models_dir, PathBuf::from("/etc/vc/models"));
    }

    #[test]
    fn default_location_ends_with_settings_file() {
        let paths = AppPaths::new();
        assert!(paths
            .settings_file
            .extension()
            .is_some_and(|ext| ext == "toml"));
    }
}

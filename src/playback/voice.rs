//! Voice selection.
//!
//! Order of preference:
//!
//! 1. the voice named in `PlaybackConfig::voice` (case-insensitive);
//! 2. a voice in the configured language whose name contains a preferred hint;
//! 3. a voice in the configured language whose name contains no avoided hint;
//! 4. the first voice in the configured language;
//! 5. the first voice at all.

use crate::config::PlaybackConfig;

use super::engine::VoiceInfo;

pub fn select_voice<'a>(voices: &'a [VoiceInfo], config: &PlaybackConfig) -> Option<&'a VoiceInfo> {
    if let Some(wanted) = config.voice.as_deref() {
        match voices.iter().find(|v| v.name.eq_ignore_ascii_case(wanted)) {
            Some(voice) => return Some(voice),
            None => log::warn!("playback: configured voice {wanted:?} not installed"),
        }
    }

    let prefix = config.language_prefix.to_lowercase();
    let in_language: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| v.lang.to_lowercase().starts_with(&prefix))
        .collect();

    in_language
        .iter()
        .copied()
        .find(|v| name_has(v, &config.preferred_voice_hints))
        .or_else(|| {
            in_language
                .iter()
                .copied()
                .find(|v| !name_has(v, &config.avoided_voice_hints))
        })
        .or_else(|| in_language.first().copied())
        .or_else(|| voices.first())
}

fn name_has(voice: &VoiceInfo, hints: &[String]) -> bool {
    let name = voice.name.to_lowercase();
    hints.iter().any(|hint| name.contains(&hint.to_lowercase()))
}

//! Paced playback: a synthesizer with no audio output.
//!
//! [`PacedPlayback`] walks through the utterance at a fixed speaking pace and
//! emits the same events a real synthesizer would (`Started`, one word
//! `Boundary` per word, `Ended`).  The desktop widget uses it as a caption
//! engine so replies are still "read out" word by word on hosts without a
//! native speech backend.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::{
    BoundaryKind, PlaybackEngine, PlaybackError, PlaybackEvent, SpeechRequest, UtteranceId,
    VoiceInfo,
};

/// Name of the single voice this engine offers.
pub const PACED_VOICE: &str = "Captions";

/// Character offsets at which each whitespace-delimited word starts.
pub fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_word = false;
    for (i, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            starts.push(i);
            in_word = true;
        }
    }
    starts
}

pub struct PacedPlayback {
    words_per_minute: u32,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    current: Option<(UtteranceId, JoinHandle<()>)>,
}

impl PacedPlayback {
    pub fn new(words_per_minute: u32, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            events,
            current: None,
        }
    }

    /// Time spent on each word at `rate`.
    pub fn word_duration(&self, rate: f32) -> Duration {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        Duration::from_secs_f32(60.0 / (self.words_per_minute as f32 * rate))
    }
}

impl PlaybackEngine for PacedPlayback {
    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        vec![VoiceInfo::new(PACED_VOICE, "en-US")]
    }

    /// Fails with [`PlaybackError::Engine`] outside a tokio runtime.
    fn speak(&mut self, request: SpeechRequest) -> Result<(), PlaybackError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlaybackError::Engine(format!("no runtime for paced playback: {e}")))?;
        self.cancel();

        let id = request.id;
        let step = self.word_duration(request.rate);
        let starts = word_starts(&request.text);
        let events = self.events.clone();

        let handle = runtime.spawn(async move {
            let _ = events.send(PlaybackEvent::Started { utterance: id });
            for char_index in starts {
                let _ = events.send(PlaybackEvent::Boundary {
                    utterance: id,
                    char_index,
                    kind: BoundaryKind::Word,
                });
                tokio::time::sleep(step).await;
            }
            let _ = events.send(PlaybackEvent::Ended { utterance: id });
        });

        self.current = Some((id, handle));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some((id, handle)) = self.current.take() {
            if !handle.is_finished() {
                handle.abort();
                let _ = self.events.send(PlaybackEvent::Failed {
                    utterance: id,
                    message: "interrupted".into(),
                });
            }
        }
    }
}

impl Drop for PacedPlayback {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.current.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Speech-synthesis engine seam.
//!
//! [`PlaybackEngine`] is implemented by every text-to-speech backend.  Like
//! recognizers, synthesizers report progress asynchronously by sending
//! [`PlaybackEvent`]s on the channel they were constructed with.  Every event
//! carries the [`UtteranceId`] it belongs to, so events from a cancelled
//! utterance can be told apart from the current one.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Identifiers and payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

/// Granularity of a boundary event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Word,
    Sentence,
}

/// A voice offered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP-47 language tag, e.g. `"en-US"`.
    pub lang: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Everything an engine needs to speak one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub id: UtteranceId,
    pub text: String,
    pub rate: f32,
    /// Voice name; `None` lets the engine pick.
    pub voice: Option<String>,
}

// ---------------------------------------------------------------------------
// PlaybackEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started {
        utterance: UtteranceId,
    },
    /// Playback reached `char_index`, counted in characters (`char`s) from
    /// the start of the utterance text.
    Boundary {
        utterance: UtteranceId,
        char_index: usize,
        kind: BoundaryKind,
    },
    Ended {
        utterance: UtteranceId,
    },
    Failed {
        utterance: UtteranceId,
        message: String,
    },
    /// The engine's voice list changed (voices often load late).
    VoicesChanged,
}

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    #[error("speech synthesis is not available")]
    Unavailable,

    #[error("synthesizer rejected the utterance: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// PlaybackEngine trait
// ---------------------------------------------------------------------------

/// Object-safe interface for speech-synthesis backends.
///
/// # Contract
///
/// - One utterance plays at a time; [`speak`](Self::speak) while another is
///   playing is preceded by [`cancel`](Self::cancel) from the caller.
/// - An accepted utterance eventually produces `Ended` or `Failed`, unless it
///   is cancelled, in which case the engine may or may not report it.
pub trait PlaybackEngine: Send {
    /// Capability check, made once when the synchronizer is built.
    fn is_available(&self) -> bool;

    /// Voices currently known to the engine.  May be empty until the engine
    /// sends [`PlaybackEvent::VoicesChanged`].
    fn voices(&self) -> Vec<VoiceInfo>;

    fn speak(&mut self, request: SpeechRequest) -> Result<(), PlaybackError>;

    fn cancel(&mut self);
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PlaybackEngine>) {}
};

// ---------------------------------------------------------------------------
// UnavailablePlayback
// ---------------------------------------------------------------------------

/// Synthesizer stand-in for hosts without speech output.
#[derive(Debug, Default)]
pub struct UnavailablePlayback;

impl PlaybackEngine for UnavailablePlayback {
    fn is_available(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    fn speak(&mut self, _request: SpeechRequest) -> Result<(), PlaybackError> {
        Err(PlaybackError::Unavailable)
    }

    fn cancel(&mut self) {}
}

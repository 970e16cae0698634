//! Speech playback with word highlighting.
//!
//! This module provides:
//! * [`PlaybackEngine`]: trait implemented by every synthesizer backend.
//! * [`SpeechPlaybackSynchronizer`]: single-slot utterance owner that maps
//!   word boundaries back onto chat tokens.
//! * [`PacedPlayback`]: synthesizer without audio that paces word
//!   boundaries, used for captions.
//! * [`select_voice`]: hint-based voice selection.

pub mod engine;
pub mod paced;
pub mod synchronizer;
pub mod voice;

pub use engine::{
    BoundaryKind, PlaybackEngine, PlaybackError, PlaybackEvent, SpeechRequest,
    UnavailablePlayback, UtteranceId, VoiceInfo,
};
pub use paced::PacedPlayback;
pub use synchronizer::{word_index_at, SpeechPlaybackSynchronizer};
pub use voice::select_voice;

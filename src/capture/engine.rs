//! Speech-recognition engine seam.
//!
//! [`CaptureEngine`] is the interface every recognizer backend implements.
//! Engines report what happens to a session asynchronously by sending
//! [`CaptureEvent`]s on the channel they were constructed with; the
//! controller never polls them.
//!
//! [`UnavailableCapture`] stands in when the host has no recognizer at all.

use thiserror::Error;

use crate::config::CaptureConfig;

// ---------------------------------------------------------------------------
// CaptureErrorKind
// ---------------------------------------------------------------------------

/// Error categories a recognizer can report for a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// The session heard nothing.  Not worth telling the user about.
    NoSpeech,
    Aborted,
    /// No microphone, or the microphone failed.
    AudioCapture,
    /// Permission to use the microphone was refused.
    NotAllowed,
    Network,
    Other(String),
}

impl CaptureErrorKind {
    /// Map a recognizer error code (`"no-speech"`, `"audio-capture"`, …).
    ///
    /// ```
    /// use voice_chat::capture::CaptureErrorKind;
    ///
    /// assert_eq!(CaptureErrorKind::from_code("no-speech"), CaptureErrorKind::NoSpeech);
    /// assert_eq!(
    ///     CaptureErrorKind::from_code("bad-grammar"),
    ///     CaptureErrorKind::Other("bad-grammar".into())
    /// );
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::NotAllowed => "not-allowed",
            Self::Network => "network",
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

/// Everything that can happen to a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The engine began listening.
    Started,
    /// The engine recognised an utterance.
    Result { transcript: String },
    Error(CaptureErrorKind),
    /// The session is over, whatever the cause.
    End,
    /// Posted by the controller's own silence timer for session `session`.
    SilenceTimeout { session: u64 },
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors returned synchronously by [`CaptureEngine::start`].
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("speech recognition is not available")]
    Unavailable,

    /// The engine still has a session running.
    #[error("a recognition session is already running")]
    AlreadyRunning,

    #[error("recognizer failed to start: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// CaptureEngine trait
// ---------------------------------------------------------------------------

/// Object-safe interface for speech-recognition backends.
///
/// # Contract
///
/// - Only one session runs at a time.
/// - After a successful [`start`](Self::start) the engine eventually sends
///   [`CaptureEvent::End`], whether the session produced a result, failed or
///   was stopped.
/// - [`stop`](Self::stop) asks the engine to finish; it returns immediately.
pub trait CaptureEngine: Send {
    /// Capability check, made once when the controller is built.
    fn is_available(&self) -> bool;

    fn start(&mut self, settings: &CaptureConfig) -> Result<(), CaptureError>;

    fn stop(&mut self);
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureEngine>) {}
};

// ---------------------------------------------------------------------------
// UnavailableCapture
// ---------------------------------------------------------------------------

/// Recognizer stand-in for hosts without speech recognition.
#[derive(Debug, Default)]
pub struct UnavailableCapture;

impl CaptureEngine for UnavailableCapture {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _settings: &CaptureConfig) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable)
    }

    fn stop(&mut self) {}
}

//! Voice capture: one speech-recognition session at a time.
//!
//! # Architecture
//!
//! ```text
//! UI "Voice" click ──▶ VoiceCaptureController::toggle()
//!                          │ start()/stop()
//!                          ▼
//!                    CaptureEngine (trait) ──CaptureEvent (mpsc)──┐
//!                          ▲                                      │
//!                    SilenceTimer ──SilenceTimeout (same mpsc)────┤
//!                                                                 ▼
//!                          VoiceCaptureController::handle_event()
//!                                                                 │
//!                                              Option<CaptureOutcome>
//! ```
//!
//! The widget's recognizer is [`LocalRecognizer`]: `cpal` microphone input
//! transcribed by a Whisper model.  [`UnavailableCapture`] stands in when no
//! model is installed.

pub mod audio;
pub mod controller;
pub mod engine;
pub mod timer;
pub mod whisper;

pub use controller::{CaptureOutcome, CaptureState, VoiceCaptureController};
pub use engine::{CaptureEngine, CaptureError, CaptureErrorKind, CaptureEvent, UnavailableCapture};
pub use audio::{ActiveInput, Clip, CpalMicrophone, Microphone};
pub use timer::SilenceTimer;
pub use whisper::{whisper_language, LocalRecognizer, Transcriber, WhisperTranscriber};

//! Assistant orchestrator.
//!
//! Wires the voice capture controller, the speech playback synchronizer and
//! the command client into one event loop, and exposes [`UiCommand`] for the
//! front-end.
//!
//! # Architecture
//!
//! ```text
//! UiCommand (mpsc) ─────────┐
//! CaptureEvent (mpsc) ──────┼─▶ Assistant::run()  ← async tokio task
//! PlaybackEvent (mpsc) ─────┘        │
//!                                    ├─ VoiceCaptureController
//!                                    ├─ SpeechPlaybackSynchronizer
//!                                    └─ CommandClient (HTTP)
//!
//! SharedState (Arc<Mutex<WidgetState>>) ←─── read by egui update() each frame
//! ```

pub mod runner;

pub use runner::{Assistant, UiCommand};

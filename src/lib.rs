//! Voice chat widget: spoken commands in, highlighted spoken replies out.
//!
//! * [`capture`]: voice capture state machine with a silence timeout.
//! * [`playback`]: speech playback with per-word highlighting.
//! * [`client`]: command endpoint client.
//! * [`assistant`]: event loop tying the above together.
//! * [`chat`]: chat log and the state shared with the UI.
//! * [`app`]: egui front-end.

pub mod app;
pub mod assistant;
pub mod capture;
pub mod chat;
pub mod client;
pub mod config;
pub mod playback;

//! Chat log and the shared widget state the UI renders.
//!
//! * [`ChatLog`]: ordered messages with per-word [`DisplayToken`]s.
//! * [`WidgetState`] / [`SharedState`]: chat log plus the listening
//!   indicator and the "stop speaking" affordance, shared between the
//!   assistant task and the UI thread.

pub mod history;
pub mod state;

pub use history::{sanitize, tokenize, Attachment, ChatLog, DisplayToken, Message, MessageId, Sender};
pub use state::{lock_state, new_shared_state, SharedState, WidgetState};

//! Assistant event loop: UI commands, capture events and playback events in,
//! chat messages and speech out.
//!
//! # Command flow
//!
//! ```text
//! UiCommand::Submit(text) / CaptureOutcome::Utterance(text)
//!   └─▶ trim, ignore empty → add user message → stop speaking
//!         └─▶ spawn client.send                    [awaiting_reply]
//!               ⋮  (loop keeps serving commands and engine events)
//!         reply channel
//!               ├─ Ok(reply)        → add assistant message → speak it
//!               ├─ Err(Server)      → show server text      → speak apology
//!               └─ Err(other)       → show network error    → speak apology
//! ```
//!
//! `awaiting_reply` stays set while any request is in flight.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capture::{CaptureEvent, CaptureOutcome, VoiceCaptureController};
use crate::chat::{lock_state, Attachment, SharedState, Sender};
use crate::client::{AssistantReply, ClientError, CommandClient, StructuredResponse};
use crate::config::{AppConfig, Phrases};
use crate::playback::{PlaybackEvent, SpeechPlaybackSynchronizer};

type ReplyResult = Result<AssistantReply, ClientError>;

// ---------------------------------------------------------------------------
// UiCommand
// ---------------------------------------------------------------------------

/// Requests posted by the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// The Voice button: start listening, or stop if already listening.
    ToggleVoice,
    /// Send typed text to the command endpoint.
    Submit(String),
    /// The Stop Speaking button.
    StopSpeaking,
}

// ---------------------------------------------------------------------------
// Assistant
// ---------------------------------------------------------------------------

/// Owns both controllers and the command client.
///
/// Create with [`Assistant::new`], then call [`run`](Self::run) inside a
/// tokio task.  All controller state is touched from that one task only.
pub struct Assistant {
    state: SharedState,
    phrases: Phrases,
    greet_on_start: bool,
    capture: VoiceCaptureController,
    playback: SpeechPlaybackSynchronizer,
    client: Arc<dyn CommandClient>,
    /// Spawned requests post their result here.
    replies_tx: mpsc::UnboundedSender<ReplyResult>,
    replies_rx: mpsc::UnboundedReceiver<ReplyResult>,
    in_flight: usize,
    greeted: bool,
}

impl Assistant {
    pub fn new(
        config: &AppConfig,
        state: SharedState,
        capture: VoiceCaptureController,
        playback: SpeechPlaybackSynchronizer,
        client: Arc<dyn CommandClient>,
    ) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            state,
            phrases: config.phrases.clone(),
            greet_on_start: config.ui.greet_on_start,
            capture,
            playback,
            client,
            replies_tx,
            replies_rx,
            in_flight: 0,
            greeted: false,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `commands` is closed.
    ///
    /// The engine channels may close earlier (e.g. an engine that never
    /// reports); the loop keeps serving UI commands.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<UiCommand>,
        mut capture_events: mpsc::UnboundedReceiver<CaptureEvent>,
        mut playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    ) {
        self.greet_if_ready();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(result) = self.replies_rx.recv() => self.handle_reply(result),
                Some(event) = capture_events.recv() => self.handle_capture_event(event),
                Some(event) = playback_events.recv() => self.handle_playback_event(event),
            }
        }

        self.capture.stop();
        self.playback.cancel();
        log::info!("assistant: command channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    pub fn handle_command(&mut self, command: UiCommand) {
        log::debug!("assistant: {command:?}");
        match command {
            UiCommand::ToggleVoice => self.capture.toggle(),
            UiCommand::Submit(text) => self.submit(&text),
            UiCommand::StopSpeaking => self.playback.cancel(),
        }
    }

    pub fn handle_capture_event(&mut self, event: CaptureEvent) {
        match self.capture.handle_event(event) {
            Some(CaptureOutcome::Utterance(text)) => self.submit(&text),
            Some(CaptureOutcome::NoInputDetected) => {
                let phrase = self.phrases.no_input.clone();
                self.playback.speak(&phrase, None);
            }
            Some(CaptureOutcome::MicrophoneIssue(kind)) => {
                log::warn!("assistant: microphone issue ({kind})");
                let phrase = self.phrases.microphone_issue.clone();
                lock_state(&self.state)
                    .chat_mut()
                    .push(Sender::AssistantError, &phrase, None);
                self.playback.speak(&phrase, None);
            }
            None => {}
        }
    }

    pub fn handle_playback_event(&mut self, event: PlaybackEvent) {
        if self.playback.handle_event(event) {
            self.greet_if_ready();
        }
    }

    // -----------------------------------------------------------------------
    // Greeting
    // -----------------------------------------------------------------------

    /// Add and speak the greeting once, as soon as a voice is known (or at
    /// once when there is no speech output at all).
    fn greet_if_ready(&mut self) {
        if self.greeted || !self.greet_on_start {
            return;
        }
        if self.playback.is_available() && self.playback.voice().is_none() {
            log::debug!("assistant: greeting deferred until voices load");
            return;
        }

        self.greeted = true;
        let greeting = self.phrases.greeting.clone();
        self.say(&greeting, None);
    }

    // -----------------------------------------------------------------------
    // Command submission
    // -----------------------------------------------------------------------

    /// Post `text` to the command endpoint without waiting for the reply.
    fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.in_flight += 1;
        {
            let mut st = lock_state(&self.state);
            st.chat_mut().push(Sender::User, text, None);
            st.set_awaiting_reply(true);
        }
        self.playback.cancel();

        log::info!("assistant: sending command {text:?}");
        let client = Arc::clone(&self.client);
        let replies = self.replies_tx.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let result = client.send(&text).await;
            if replies.send(result).is_err() {
                log::debug!("assistant: reply for {text:?} arrived after shutdown");
            }
        });
    }

    /// Show and speak the outcome of one request.
    pub fn handle_reply(&mut self, result: ReplyResult) {
        self.in_flight = self.in_flight.saturating_sub(1);
        lock_state(&self.state).set_awaiting_reply(self.in_flight > 0);

        match result {
            Ok(reply) => self.show_reply(reply),
            Err(ClientError::Server { status, message }) => {
                log::warn!("assistant: server error {status}");
                lock_state(&self.state)
                    .chat_mut()
                    .push(Sender::AssistantError, &message, None);
                let phrase = self.phrases.server_trouble.clone();
                self.playback.speak(&phrase, None);
            }
            Err(e) => {
                if e.is_connectivity() {
                    log::warn!("assistant: server unreachable: {e}");
                } else {
                    log::error!("assistant: unusable reply: {e}");
                }
                let shown = self.phrases.network_error.clone();
                lock_state(&self.state)
                    .chat_mut()
                    .push(Sender::AssistantError, &shown, None);
                let phrase = self.phrases.network_lost.clone();
                self.playback.speak(&phrase, None);
            }
        }
    }

    fn show_reply(&mut self, reply: AssistantReply) {
        let (text, attachment) = match reply {
            AssistantReply::Structured(StructuredResponse::Image {
                content,
                text_response,
            }) => (
                self.structured_text(text_response),
                Some(Attachment::Image { url: content }),
            ),
            AssistantReply::Structured(StructuredResponse::ImageList {
                content,
                text_response,
            }) => (
                self.structured_text(text_response),
                Some(Attachment::ImageList(content)),
            ),
            other => match other.content_text() {
                Some(text) => (text.to_string(), None),
                None => {
                    log::warn!("assistant: reply without text: {other:?}");
                    (self.phrases.unknown_response.clone(), None)
                }
            },
        };

        self.say(&text, attachment);
    }

    fn structured_text(&self, text_response: Option<String>) -> String {
        text_response
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.phrases.default_structured_text.clone())
    }

    /// Add an assistant message and speak its display text, highlighting
    /// along.
    fn say(&mut self, text: &str, attachment: Option<Attachment>) {
        let (id, spoken) = {
            let mut st = lock_state(&self.state);
            let chat = st.chat_mut();
            let id = chat.push(Sender::Assistant, text, attachment);
            let spoken = chat.get(id).map(|m| m.text.clone()).unwrap_or_default();
            (id, spoken)
        };
        self.playback.speak(&spoken, Some(id));
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Voice capture state machine.
//!
//! ```text
//! Idle ──toggle/start (engine accepts)──▶ Listening   [arm silence timer]
//! Listening ──toggle/stop──▶ Listening (stop requested, timer cancelled)
//! Listening ──Result──▶ Idle   → Utterance(transcript)
//! Listening ──Error(no-speech)──▶ Idle
//! Listening ──Error(other)──▶ Idle   → MicrophoneIssue
//! Listening ──SilenceTimeout──▶ Idle   → NoInputDetected
//! any ──End──▶ Idle
//! ```
//!
//! The controller owns at most one capture session at a time.  Every
//! terminal event drops the session, which also cancels its silence timer.
//!
//! The engine confirms every session with exactly one `End`, in order.  When
//! the controller finishes a session itself (result, error, timeout) that
//! session's `End` is still on its way and may arrive after a new session
//! has started.  Such confirmations are counted and swallowed, together with
//! any result or error reported before them.
//! The listening indicator in [`SharedState`] is written only when the state
//! actually changes.

use tokio::sync::mpsc;

use crate::chat::{lock_state, SharedState};
use crate::config::CaptureConfig;

use super::engine::{CaptureEngine, CaptureErrorKind, CaptureEvent};
use super::timer::SilenceTimer;

// ---------------------------------------------------------------------------
// CaptureState / CaptureOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

/// What a finished session means for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A recognised command, already trimmed and non-empty.
    Utterance(String),
    /// The silence timeout expired with no result.
    NoInputDetected,
    /// The recognizer failed for a reason the user should hear about.
    MicrophoneIssue(CaptureErrorKind),
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CaptureSession {
    id: u64,
    timer: Option<SilenceTimer>,
    stop_requested: bool,
}

// ---------------------------------------------------------------------------
// VoiceCaptureController
// ---------------------------------------------------------------------------

pub struct VoiceCaptureController {
    /// `None` when the capability check failed.
    engine: Option<Box<dyn CaptureEngine>>,
    config: CaptureConfig,
    state: SharedState,
    /// Where the silence timer posts its event; the same channel the engine
    /// reports on.
    events: mpsc::UnboundedSender<CaptureEvent>,
    session: Option<CaptureSession>,
    next_session: u64,
    /// Sessions finished here whose `End` has not arrived yet.
    unconfirmed_ends: u32,
}

impl VoiceCaptureController {
    /// Build a controller around `engine`.
    ///
    /// The engine's capability is checked here, once.  An unavailable engine
    /// is dropped and every later [`toggle`](Self::toggle) is a logged no-op.
    pub fn new(
        engine: Box<dyn CaptureEngine>,
        config: CaptureConfig,
        state: SharedState,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        let engine = if engine.is_available() {
            Some(engine)
        } else {
            log::info!("capture: speech recognition not supported on this host");
            None
        };

        Self {
            engine,
            config,
            state,
            events,
            session: None,
            next_session: 0,
            unconfirmed_ends: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn state(&self) -> CaptureState {
        if self.session.is_some() {
            CaptureState::Listening
        } else {
            CaptureState::Idle
        }
    }

    // -----------------------------------------------------------------------
    // User operations
    // -----------------------------------------------------------------------

    /// Start listening when idle, request a stop when listening.
    pub fn toggle(&mut self) {
        match self.state() {
            CaptureState::Idle => self.start(),
            CaptureState::Listening => self.stop(),
        }
    }

    /// Open a new session.  No-op unless idle and available.
    pub fn start(&mut self) {
        if self.session.is_some() {
            log::debug!("capture: start ignored, already listening");
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            log::info!("capture: start ignored, recognition unavailable");
            return;
        };

        if let Err(e) = engine.start(&self.config) {
            log::warn!("capture: recognizer refused to start: {e}");
            return;
        }

        let id = self.next_session;
        self.next_session += 1;
        let timer = SilenceTimer::arm(self.config.silence_timeout(), id, self.events.clone());

        self.session = Some(CaptureSession {
            id,
            timer: Some(timer),
            stop_requested: false,
        });
        log::debug!("capture: session {id} Idle → Listening");
        self.show_listening(true);
    }

    /// Ask the engine to stop.  The controller stays `Listening` until the
    /// engine confirms with [`CaptureEvent::End`].
    pub fn stop(&mut self) {
        let (Some(session), Some(engine)) = (self.session.as_mut(), self.engine.as_mut()) else {
            return;
        };
        if session.stop_requested {
            log::debug!("capture: stop already requested for session {}", session.id);
            return;
        }

        session.stop_requested = true;
        if let Some(timer) = session.timer.take() {
            timer.cancel();
        }
        engine.stop();
        log::debug!("capture: stop requested for session {}", session.id);
    }

    // -----------------------------------------------------------------------
    // Engine / timer events
    // -----------------------------------------------------------------------

    /// Apply one event and return what it means for the caller, if
    /// anything.
    pub fn handle_event(&mut self, event: CaptureEvent) -> Option<CaptureOutcome> {
        match event {
            CaptureEvent::Started => {
                match &self.session {
                    Some(session) => log::debug!("capture: session {} started", session.id),
                    None => log::debug!("capture: start confirmation for a finished session"),
                }
                None
            }

            CaptureEvent::Result { transcript } => {
                if self.session.is_none() || self.from_finished_session("result") {
                    return None;
                }
                self.finish_early("result");
                if let Some(engine) = self.engine.as_mut() {
                    engine.stop();
                }

                let transcript = transcript.trim();
                if transcript.is_empty() {
                    log::debug!("capture: empty transcript discarded");
                    return None;
                }
                log::info!("capture: voice command received: {transcript:?}");
                Some(CaptureOutcome::Utterance(transcript.to_string()))
            }

            CaptureEvent::Error(kind) => {
                if self.session.is_none() || self.from_finished_session("error") {
                    return None;
                }
                self.finish_early("error");

                if kind == CaptureErrorKind::NoSpeech {
                    log::debug!("capture: no speech detected");
                    None
                } else {
                    log::warn!("capture: recognition error: {kind}");
                    Some(CaptureOutcome::MicrophoneIssue(kind))
                }
            }

            CaptureEvent::End => {
                if self.unconfirmed_ends > 0 {
                    self.unconfirmed_ends -= 1;
                    log::debug!("capture: end confirmed for an already finished session");
                    return None;
                }
                self.finish("end");
                None
            }

            CaptureEvent::SilenceTimeout { session } => {
                let current = self.session.as_ref()?;
                if current.id != session || current.stop_requested {
                    log::debug!("capture: stale silence timeout for session {session}");
                    return None;
                }

                if let Some(engine) = self.engine.as_mut() {
                    engine.stop();
                }
                self.finish_early("silence timeout");
                Some(CaptureOutcome::NoInputDetected)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Drop the session (cancelling its timer) and go Idle.
    fn finish(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            log::debug!("capture: session {} Listening → Idle ({reason})", session.id);
        }
        self.show_listening(false);
    }

    /// Finish before the engine has confirmed; its `End` is still due.
    fn finish_early(&mut self, reason: &str) {
        self.finish(reason);
        self.unconfirmed_ends += 1;
    }

    /// `true` when an engine event belongs to a session that already
    /// finished here and has yet to send its `End`.
    fn from_finished_session(&self, what: &str) -> bool {
        if self.unconfirmed_ends == 0 {
            return false;
        }
        log::debug!("capture: {what} from a finished session ignored");
        true
    }

    fn show_listening(&self, listening: bool) {
        lock_state(&self.state).set_listening(listening);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use crate::chat::new_shared_state;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Start,
        Stop,
    }

    /// Recognizer that records calls and never emits events on its own.
    struct FakeEngine {
        available: bool,
        refuse_start: bool,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl CaptureEngine for FakeEngine {
        fn is_available(&self) -> bool {
            self.available
        }

        fn start(&mut self, _settings: &CaptureConfig) -> Result<(), CaptureError> {
            if self.refuse_start {
                return Err(CaptureError::AlreadyRunning);
            }
            self.calls.lock().unwrap().push(Call::Start);
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push(Call::Stop);
        }
    }

    struct Harness {
        controller: VoiceCaptureController,
        state: SharedState,
        calls: Arc<Mutex<Vec<Call>>>,
        rx: mpsc::UnboundedReceiver<CaptureEvent>,
    }

    fn harness_with(available: bool, refuse_start: bool) -> Harness {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = FakeEngine {
            available,
            refuse_start,
            calls: Arc::clone(&calls),
        };
        let state = new_shared_state();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller =
            VoiceCaptureController::new(Box::new(engine), CaptureConfig::default(), Arc::clone(&state), tx);
        Harness {
            controller,
            state,
            calls,
            rx,
        }
    }

    fn harness() -> Harness {
        harness_with(true, false)
    }

    fn calls(h: &Harness) -> Vec<Call> {
        h.calls.lock().unwrap().clone()
    }

    fn listening(h: &Harness) -> bool {
        lock_state(&h.state).listening()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn toggle_from_idle_starts_listening() {
        let mut h = harness();
        h.controller.toggle();

        assert_eq!(h.controller.state(), CaptureState::Listening);
        assert!(listening(&h));
        assert_eq!(calls(&h), vec![Call::Start]);
    }

    #[tokio::test]
    async fn double_toggle_requests_stop_without_second_session() {
        let mut h = harness();
        h.controller.toggle();
        h.controller.toggle();

        assert_eq!(calls(&h), vec![Call::Start, Call::Stop]);
        // Still listening until the engine confirms.
        assert_eq!(h.controller.state(), CaptureState::Listening);

        h.controller.toggle();
        assert_eq!(calls(&h), vec![Call::Start, Call::Stop]);

        assert_eq!(h.controller.handle_event(CaptureEvent::End), None);
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!listening(&h));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_timeout_reports_no_input_once() {
        let mut h = harness();
        h.controller.toggle();

        let event = h.rx.recv().await.expect("timeout event");
        assert_eq!(event, CaptureEvent::SilenceTimeout { session: 0 });

        let outcome = h.controller.handle_event(event);
        assert_eq!(outcome, Some(CaptureOutcome::NoInputDetected));
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!listening(&h));
        assert_eq!(calls(&h), vec![Call::Start, Call::Stop]);

        // The engine's own End afterwards adds nothing.
        assert_eq!(h.controller.handle_event(CaptureEvent::End), None);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_waits_for_configured_duration() {
        let mut h = harness();
        h.controller.toggle();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert!(h.rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(matches!(
            h.rx.recv().await,
            Some(CaptureEvent::SilenceTimeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn result_emits_trimmed_utterance_and_cancels_timer() {
        let mut h = harness();
        h.controller.toggle();

        let outcome = h.controller.handle_event(CaptureEvent::Result {
            transcript: "  find cats ".into(),
        });
        assert_eq!(outcome, Some(CaptureOutcome::Utterance("find cats".into())));
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert_eq!(calls(&h), vec![Call::Start, Call::Stop]);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_result_is_discarded() {
        let mut h = harness();
        h.controller.toggle();

        let outcome = h.controller.handle_event(CaptureEvent::Result {
            transcript: "   ".into(),
        });
        assert_eq!(outcome, None);
        assert_eq!(h.controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn no_speech_error_is_silent() {
        let mut h = harness();
        h.controller.toggle();

        let outcome = h
            .controller
            .handle_event(CaptureEvent::Error(CaptureErrorKind::NoSpeech));
        assert_eq!(outcome, None);
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!listening(&h));
    }

    #[tokio::test]
    async fn other_error_reports_microphone_issue_once() {
        let mut h = harness();
        h.controller.toggle();

        let outcome = h
            .controller
            .handle_event(CaptureEvent::Error(CaptureErrorKind::AudioCapture));
        assert_eq!(
            outcome,
            Some(CaptureOutcome::MicrophoneIssue(CaptureErrorKind::AudioCapture))
        );
        assert_eq!(h.controller.state(), CaptureState::Idle);

        // A duplicate error after the session ended is not reported again.
        let again = h
            .controller
            .handle_event(CaptureEvent::Error(CaptureErrorKind::AudioCapture));
        assert_eq!(again, None);
    }

    #[tokio::test]
    async fn stale_timeout_is_ignored() {
        let mut h = harness();
        h.controller.toggle();
        h.controller.handle_event(CaptureEvent::End);
        h.controller.toggle();

        // Session 0 is gone; session 1 is live.
        let outcome = h
            .controller
            .handle_event(CaptureEvent::SilenceTimeout { session: 0 });
        assert_eq!(outcome, None);
        assert_eq!(h.controller.state(), CaptureState::Listening);
    }

    #[tokio::test]
    async fn timeout_after_stop_request_is_ignored() {
        let mut h = harness();
        h.controller.toggle();
        h.controller.stop();

        let outcome = h
            .controller
            .handle_event(CaptureEvent::SilenceTimeout { session: 0 });
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn unavailable_engine_makes_toggle_a_no_op() {
        let mut h = harness_with(false, false);
        assert!(!h.controller.is_available());

        h.controller.toggle();
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(calls(&h).is_empty());
        assert_eq!(lock_state(&h.state).revision(), 0);
    }

    #[tokio::test]
    async fn refused_start_stays_idle() {
        let mut h = harness_with(true, true);
        h.controller.toggle();

        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!listening(&h));
    }

    #[tokio::test]
    async fn indicator_changes_once_per_transition() {
        let mut h = harness();

        h.controller.toggle();
        assert_eq!(lock_state(&h.state).revision(), 1);

        h.controller.handle_event(CaptureEvent::Started);
        h.controller.toggle(); // stop request: no visible change yet
        assert_eq!(lock_state(&h.state).revision(), 1);

        h.controller.handle_event(CaptureEvent::End);
        h.controller.handle_event(CaptureEvent::End);
        assert_eq!(lock_state(&h.state).revision(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_end_of_previous_session_keeps_new_session() {
        let mut h = harness();
        h.controller.toggle();
        let outcome = h.controller.handle_event(CaptureEvent::Result {
            transcript: "find cats".into(),
        });
        assert_eq!(outcome, Some(CaptureOutcome::Utterance("find cats".into())));

        // Restart before the first session's End has been delivered.
        h.controller.toggle();
        assert_eq!(h.controller.handle_event(CaptureEvent::End), None);

        assert_eq!(h.controller.state(), CaptureState::Listening);
        assert!(listening(&h));
        assert_eq!(calls(&h), vec![Call::Start, Call::Stop, Call::Start]);

        // The new session still times out normally.
        let outcome = h
            .controller
            .handle_event(CaptureEvent::SilenceTimeout { session: 1 });
        assert_eq!(outcome, Some(CaptureOutcome::NoInputDetected));
        assert_eq!(h.controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn own_end_still_finishes_after_late_end() {
        let mut h = harness();
        h.controller.toggle();
        h.controller.handle_event(CaptureEvent::Error(CaptureErrorKind::NoSpeech));
        h.controller.toggle();

        h.controller.handle_event(CaptureEvent::End);
        assert_eq!(h.controller.state(), CaptureState::Listening);

        h.controller.toggle();
        assert_eq!(h.controller.handle_event(CaptureEvent::End), None);
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert!(!listening(&h));
    }

    #[tokio::test]
    async fn late_error_of_previous_session_is_ignored() {
        let mut h = harness();
        h.controller.toggle();
        h.controller.handle_event(CaptureEvent::Result {
            transcript: "find cats".into(),
        });
        h.controller.toggle();

        let outcome = h
            .controller
            .handle_event(CaptureEvent::Error(CaptureErrorKind::Aborted));
        assert_eq!(outcome, None);
        assert_eq!(h.controller.state(), CaptureState::Listening);

        h.controller.handle_event(CaptureEvent::End);
        let outcome = h.controller.handle_event(CaptureEvent::Result {
            transcript: "dogs".into(),
        });
        assert_eq!(outcome, Some(CaptureOutcome::Utterance("dogs".into())));
    }

    #[tokio::test]
    async fn end_without_session_is_harmless() {
        let mut h = harness();
        assert_eq!(h.controller.handle_event(CaptureEvent::End), None);
        assert_eq!(h.controller.state(), CaptureState::Idle);
        assert_eq!(lock_state(&h.state).revision(), 0);
    }
}

//! Speech playback synchronizer.
//!
//! Owns a single utterance slot.  [`speak`](SpeechPlaybackSynchronizer::speak)
//! always empties the slot first (engine cancel, highlights cleared,
//! affordance disabled) and only then starts the new utterance, so nothing
//! from the previous one can leak into the new one.
//!
//! On every word boundary the highlighted token is recomputed from the
//! absolute character offset reported by the engine.  Engines skip and
//! repeat boundary events; a running counter would drift, the offset does
//! not.

use crate::chat::{lock_state, MessageId, SharedState};
use crate::config::PlaybackConfig;

use super::engine::{
    BoundaryKind, PlaybackEngine, PlaybackEvent, SpeechRequest, UtteranceId, VoiceInfo,
};
use super::voice::select_voice;

/// Zero-based index of the word being spoken at `char_index`.
///
/// Counts the whitespace-delimited, non-empty words in the first
/// `char_index` characters of `text`.  Offsets past the end count the whole
/// text.
///
/// ```
/// use voice_chat::playback::word_index_at;
///
/// assert_eq!(word_index_at("find cats", 0), 0);
/// assert_eq!(word_index_at("find cats", 5), 1);
/// assert_eq!(word_index_at("find cats", 500), 2);
/// ```
pub fn word_index_at(text: &str, char_index: usize) -> usize {
    let end = text
        .char_indices()
        .nth(char_index)
        .map_or(text.len(), |(byte, _)| byte);
    text[..end].split_whitespace().count()
}

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Utterance {
    id: UtteranceId,
    text: String,
    /// Chat message whose tokens follow playback; `None` when the spoken text
    /// has no rendered words.
    target: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// SpeechPlaybackSynchronizer
// ---------------------------------------------------------------------------

pub struct SpeechPlaybackSynchronizer {
    /// `None` when the capability check failed.
    engine: Option<Box<dyn PlaybackEngine>>,
    config: PlaybackConfig,
    state: SharedState,
    voice: Option<VoiceInfo>,
    current: Option<Utterance>,
    next_id: u64,
}

impl SpeechPlaybackSynchronizer {
    /// Build a synchronizer around `engine`, probing its capability once.
    pub fn new(engine: Box<dyn PlaybackEngine>, config: PlaybackConfig, state: SharedState) -> Self {
        let engine = if engine.is_available() {
            Some(engine)
        } else {
            log::info!("playback: speech synthesis not supported on this host");
            None
        };

        let mut sync = Self {
            engine,
            config,
            state,
            voice: None,
            current: None,
            next_id: 0,
        };
        sync.refresh_voices();
        sync
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    pub fn voice(&self) -> Option<&VoiceInfo> {
        self.voice.as_ref()
    }

    /// Re-run voice selection against the engine's current voice list.
    ///
    /// Returns `true` when a voice is selected afterwards.
    pub fn refresh_voices(&mut self) -> bool {
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };

        let voices = engine.voices();
        match select_voice(&voices, &self.config) {
            Some(voice) => {
                if self.voice.as_ref() != Some(voice) {
                    log::info!("playback: using voice {:?} ({})", voice.name, voice.lang);
                }
                self.voice = Some(voice.clone());
            }
            None => log::debug!("playback: no voices reported yet"),
        }
        self.voice.is_some()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Speak `text`, highlighting the words of message `target` as they are
    /// spoken.
    ///
    /// Returns the id of the new utterance, or `None` when nothing was
    /// started (empty text, playback disabled or unavailable, engine refusal).
    pub fn speak(&mut self, text: &str, target: Option<MessageId>) -> Option<UtteranceId> {
        self.cancel();
        lock_state(&self.state).clear_highlights();

        if text.trim().is_empty() || !self.config.enabled {
            return None;
        }
        let engine = self.engine.as_mut()?;

        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        let request = SpeechRequest {
            id,
            text: text.to_string(),
            rate: self.config.rate,
            voice: self.voice.as_ref().map(|v| v.name.clone()),
        };

        if let Err(e) = engine.speak(request) {
            log::warn!("playback: {e}");
            return None;
        }

        log::debug!("playback: utterance {} queued ({} chars)", id.0, text.len());
        self.current = Some(Utterance {
            id,
            text: text.to_string(),
            target,
        });
        Some(id)
    }

    /// Stop the current utterance.  No-op when nothing is playing.
    pub fn cancel(&mut self) {
        let Some(utterance) = self.current.take() else {
            return;
        };

        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
        }
        log::debug!("playback: utterance {} cancelled", utterance.id.0);
        self.release();
    }

    // -----------------------------------------------------------------------
    // Engine events
    // -----------------------------------------------------------------------

    /// Apply one engine event.  Events for any utterance other than the
    /// current one are ignored.
    ///
    /// Returns `true` for [`PlaybackEvent::VoicesChanged`] when a voice is
    /// selected afterwards.
    pub fn handle_event(&mut self, event: PlaybackEvent) -> bool {
        match event {
            PlaybackEvent::VoicesChanged => return self.refresh_voices(),

            PlaybackEvent::Started { utterance } => {
                if self.is_current(utterance) {
                    lock_state(&self.state).set_stop_speaking_enabled(true);
                }
            }

            PlaybackEvent::Boundary {
                utterance,
                char_index,
                kind,
            } => {
                if self.is_current(utterance) && kind == BoundaryKind::Word {
                    self.highlight_at(char_index);
                }
            }

            PlaybackEvent::Ended { utterance } => {
                if self.is_current(utterance) {
                    self.current = None;
                    self.release();
                }
            }

            PlaybackEvent::Failed { utterance, message } => {
                if self.is_current(utterance) {
                    log::warn!("playback: synthesis error: {message}");
                    self.current = None;
                    self.release();
                } else {
                    log::debug!("playback: error from finished utterance {}: {message}", utterance.0);
                }
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn is_current(&self, id: UtteranceId) -> bool {
        self.current.as_ref().is_some_and(|u| u.id == id)
    }

    fn highlight_at(&self, char_index: usize) {
        let Some(utterance) = self.current.as_ref() else {
            return;
        };
        let Some(target) = utterance.target else {
            return;
        };

        let mut st = lock_state(&self.state);
        let count = st.chat().token_count(target);
        if count == 0 {
            return;
        }

        let index = word_index_at(&utterance.text, char_index).min(count - 1);
        st.clear_highlights();
        st.chat_mut().highlight(target, index);
    }

    /// Clear highlights and disable the affordance.
    fn release(&self) {
        let mut st = lock_state(&self.state);
        st.clear_highlights();
        st.set_stop_speaking_enabled(false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{new_shared_state, Sender};
    use crate::playback::PlaybackError;
    use std::sync::{Arc, Mutex};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Speak(SpeechRequest),
        Cancel,
    }

    /// Synthesizer that records calls; events are injected by the test.
    struct FakeEngine {
        available: bool,
        voices: Arc<Mutex<Vec<VoiceInfo>>>,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl PlaybackEngine for FakeEngine {
        fn is_available(&self) -> bool {
            self.available
        }

        fn voices(&self) -> Vec<VoiceInfo> {
            self.voices.lock().unwrap().clone()
        }

        fn speak(&mut self, request: SpeechRequest) -> Result<(), PlaybackError> {
            self.calls.lock().unwrap().push(Call::Speak(request));
            Ok(())
        }

        fn cancel(&mut self) {
            self.calls.lock().unwrap().push(Call::Cancel);
        }
    }

    struct Harness {
        sync: SpeechPlaybackSynchronizer,
        state: SharedState,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    fn harness_with(available: bool, config: PlaybackConfig) -> Harness {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = FakeEngine {
            available,
            voices: Arc::new(Mutex::new(vec![VoiceInfo::new("Samantha", "en-US")])),
            calls: Arc::clone(&calls),
        };
        let state = new_shared_state();
        let sync = SpeechPlaybackSynchronizer::new(Box::new(engine), config, Arc::clone(&state));
        Harness { sync, state, calls }
    }

    fn harness() -> Harness {
        harness_with(true, PlaybackConfig::default())
    }

    fn add_message(h: &Harness, text: &str) -> MessageId {
        lock_state(&h.state).chat_mut().push(Sender::Assistant, text, None)
    }

    fn highlighted(h: &Harness) -> Option<(MessageId, usize)> {
        lock_state(&h.state).chat().highlighted()
    }

    fn stop_enabled(h: &Harness) -> bool {
        lock_state(&h.state).stop_speaking_enabled()
    }

    fn word(utterance: UtteranceId, char_index: usize) -> PlaybackEvent {
        PlaybackEvent::Boundary {
            utterance,
            char_index,
            kind: BoundaryKind::Word,
        }
    }

    // -----------------------------------------------------------------------
    // word_index_at
    // -----------------------------------------------------------------------

    #[test]
    fn word_index_counts_prefix_words() {
        assert_eq!(word_index_at("find cats", 0), 0);
        assert_eq!(word_index_at("find cats", 4), 1);
        assert_eq!(word_index_at("find cats", 5), 1);
        assert_eq!(word_index_at("find  many   cats", 11), 2);
    }

    #[test]
    fn word_index_ignores_leading_whitespace() {
        assert_eq!(word_index_at("   hello world", 3), 0);
        assert_eq!(word_index_at("   hello world", 9), 1);
    }

    #[test]
    fn word_index_counts_characters_not_bytes() {
        // "café" is 4 chars but 5 bytes.
        assert_eq!(word_index_at("café noir", 5), 1);
        assert_eq!(word_index_at("日本 語", 3), 1);
    }

    #[test]
    fn word_index_past_end_counts_all_words() {
        assert_eq!(word_index_at("a b c", 99), 3);
        assert_eq!(word_index_at("", 3), 0);
    }

    // -----------------------------------------------------------------------
    // Synchronizer
    // -----------------------------------------------------------------------

    #[test]
    fn boundary_at_second_word_highlights_token_one() {
        let mut h = harness();
        let msg = add_message(&h, "find cats");
        let id = h.sync.speak("find cats", Some(msg)).unwrap();

        h.sync.handle_event(word(id, 5));
        assert_eq!(highlighted(&h), Some((msg, 1)));
    }

    #[test]
    fn repeated_boundary_keeps_single_highlight() {
        let mut h = harness();
        let msg = add_message(&h, "one two three four");
        let id = h.sync.speak("one two three four", Some(msg)).unwrap();

        for _ in 0..3 {
            h.sync.handle_event(word(id, 8));
            assert_eq!(highlighted(&h), Some((msg, 2)));
        }
    }

    #[test]
    fn out_of_order_boundaries_follow_the_offset() {
        let mut h = harness();
        let msg = add_message(&h, "one two three four");
        let id = h.sync.speak("one two three four", Some(msg)).unwrap();

        h.sync.handle_event(word(id, 14));
        assert_eq!(highlighted(&h), Some((msg, 3)));
        h.sync.handle_event(word(id, 4));
        assert_eq!(highlighted(&h), Some((msg, 1)));
    }

    #[test]
    fn index_is_clamped_to_last_token() {
        let mut h = harness();
        // Spoken text longer than the rendered tokens.
        let msg = add_message(&h, "two words");
        let id = h.sync.speak("two words and then some", Some(msg)).unwrap();

        h.sync.handle_event(word(id, 19));
        assert_eq!(highlighted(&h), Some((msg, 1)));
    }

    #[test]
    fn sentence_boundaries_do_not_move_highlight() {
        let mut h = harness();
        let msg = add_message(&h, "Hi. There.");
        let id = h.sync.speak("Hi. There.", Some(msg)).unwrap();

        h.sync.handle_event(PlaybackEvent::Boundary {
            utterance: id,
            char_index: 4,
            kind: BoundaryKind::Sentence,
        });
        assert!(highlighted(&h).is_none());
    }

    #[test]
    fn utterance_without_tokens_highlights_nothing() {
        let mut h = harness();
        let id = h.sync.speak("nothing rendered", None).unwrap();
        h.sync.handle_event(word(id, 8));
        assert!(highlighted(&h).is_none());

        let user_msg = lock_state(&h.state).chat_mut().push(Sender::User, "raw", None);
        let id = h.sync.speak("raw", Some(user_msg)).unwrap();
        h.sync.handle_event(word(id, 0));
        assert!(highlighted(&h).is_none());
    }

    #[test]
    fn start_enables_and_end_releases() {
        let mut h = harness();
        let msg = add_message(&h, "hello there");
        let id = h.sync.speak("hello there", Some(msg)).unwrap();
        assert!(!stop_enabled(&h));

        h.sync.handle_event(PlaybackEvent::Started { utterance: id });
        assert!(stop_enabled(&h));
        h.sync.handle_event(word(id, 6));

        h.sync.handle_event(PlaybackEvent::Ended { utterance: id });
        assert!(!stop_enabled(&h));
        assert!(highlighted(&h).is_none());
        assert!(!h.sync.is_speaking());
    }

    #[test]
    fn failure_releases_slot() {
        let mut h = harness();
        let msg = add_message(&h, "hello there");
        let id = h.sync.speak("hello there", Some(msg)).unwrap();
        h.sync.handle_event(PlaybackEvent::Started { utterance: id });
        h.sync.handle_event(word(id, 0));

        h.sync.handle_event(PlaybackEvent::Failed {
            utterance: id,
            message: "synthesis-failed".into(),
        });
        assert!(!stop_enabled(&h));
        assert!(highlighted(&h).is_none());
        assert!(!h.sync.is_speaking());
    }

    #[test]
    fn second_speak_replaces_first_without_leaks() {
        let mut h = harness();
        let first_msg = add_message(&h, "first message here");
        let second_msg = add_message(&h, "second one");

        let first = h.sync.speak("first message here", Some(first_msg)).unwrap();
        h.sync.handle_event(PlaybackEvent::Started { utterance: first });
        h.sync.handle_event(word(first, 6));

        let second = h.sync.speak("second one", Some(second_msg)).unwrap();
        assert!(highlighted(&h).is_none());
        assert!(!stop_enabled(&h));

        // Late events from the cancelled utterance change nothing.
        h.sync.handle_event(PlaybackEvent::Started { utterance: first });
        h.sync.handle_event(word(first, 8));
        assert!(!stop_enabled(&h));
        assert!(highlighted(&h).is_none());

        h.sync.handle_event(PlaybackEvent::Started { utterance: second });
        h.sync.handle_event(word(second, 7));
        h.sync.handle_event(PlaybackEvent::Failed {
            utterance: first,
            message: "interrupted".into(),
        });

        assert!(stop_enabled(&h));
        assert_eq!(highlighted(&h), Some((second_msg, 1)));

        let calls = h.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| **c == Call::Cancel).count(), 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut h = harness();
        h.sync.cancel();
        assert!(h.calls.lock().unwrap().is_empty());

        let msg = add_message(&h, "hello there");
        let id = h.sync.speak("hello there", Some(msg)).unwrap();
        h.sync.handle_event(PlaybackEvent::Started { utterance: id });
        h.sync.handle_event(word(id, 6));

        h.sync.cancel();
        h.sync.cancel();
        assert!(!stop_enabled(&h));
        assert!(highlighted(&h).is_none());
        let cancels = h
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == Call::Cancel)
            .count();
        assert_eq!(cancels, 1);
    }

    #[test]
    fn empty_text_starts_nothing_but_still_clears() {
        let mut h = harness();
        let msg = add_message(&h, "hello there");
        let id = h.sync.speak("hello there", Some(msg)).unwrap();
        h.sync.handle_event(word(id, 0));

        assert_eq!(h.sync.speak("   ", Some(msg)), None);
        assert!(highlighted(&h).is_none());
        assert!(!h.sync.is_speaking());
    }

    #[test]
    fn unavailable_engine_never_speaks() {
        let mut h = harness_with(false, PlaybackConfig::default());
        assert!(!h.sync.is_available());
        assert_eq!(h.sync.speak("hello", None), None);
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn disabled_playback_never_speaks() {
        let config = PlaybackConfig {
            enabled: false,
            ..PlaybackConfig::default()
        };
        let mut h = harness_with(true, config);
        assert_eq!(h.sync.speak("hello", None), None);
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn request_carries_rate_and_selected_voice() {
        let mut h = harness();
        h.sync.speak("hello", None).unwrap();

        let calls = h.calls.lock().unwrap();
        match &calls[0] {
            Call::Speak(req) => {
                assert_eq!(req.text, "hello");
                assert!((req.rate - 1.2).abs() < f32::EPSILON);
                assert_eq!(req.voice.as_deref(), Some("Samantha"));
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn late_voices_are_picked_up() {
        let voices = Arc::new(Mutex::new(Vec::new()));
        let engine = FakeEngine {
            available: true,
            voices: Arc::clone(&voices),
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let mut sync = SpeechPlaybackSynchronizer::new(
            Box::new(engine),
            PlaybackConfig::default(),
            new_shared_state(),
        );
        assert!(sync.voice().is_none());
        assert!(!sync.handle_event(PlaybackEvent::VoicesChanged));

        voices
            .lock()
            .unwrap()
            .push(VoiceInfo::new("Microsoft Zira", "en-US"));
        assert!(sync.handle_event(PlaybackEvent::VoicesChanged));
        assert_eq!(sync.voice().unwrap().name, "Microsoft Zira");
    }
}

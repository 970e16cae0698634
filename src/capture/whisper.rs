//! Local speech recognition: microphone recording transcribed by Whisper.
//!
//! [`LocalRecognizer`] is the [`CaptureEngine`] the desktop widget runs with
//! when a Whisper model is installed.  Each session gets its own recording
//! thread:
//!
//! ```text
//! start() ──spawn──▶ open microphone ─▶ Started
//!                        │ record until stop(), end of speech or MAX_RECORDING
//!                        ▼
//!                    16 kHz mono ─▶ Transcriber ─▶ Result | Error ─▶ End
//! ```
//!
//! `start` returns once the microphone is open, so a missing or busy device
//! is reported synchronously.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::CaptureConfig;

use super::audio::{Clip, Endpointer, Microphone, WHISPER_RATE};
use super::engine::{CaptureEngine, CaptureError, CaptureErrorKind, CaptureEvent};

/// Recordings are cut off after this long.
pub const MAX_RECORDING: Duration = Duration::from_secs(60);

/// How often the recording thread checks for a stop request and end of
/// speech.
const POLL: Duration = Duration::from_millis(50);
/// Input level (RMS) that counts as speech.
const SPEECH_LEVEL: f32 = 0.02;
/// Quiet after speech that ends the utterance.
const TRAILING_SILENCE: Duration = Duration::from_millis(700);

/// Shorter recordings are treated as "no speech" without running the model.
const MIN_SAMPLES: usize = WHISPER_RATE as usize / 2;
const MAX_SAMPLES: usize = WHISPER_RATE as usize * 60;

/// Whisper's language code for a BCP-47 tag: the primary subtag, lower
/// case.  `None` (auto-detect) for an empty tag or `"auto"`.
///
/// ```
/// use voice_chat::capture::whisper_language;
///
/// assert_eq!(whisper_language("en-US").as_deref(), Some("en"));
/// assert_eq!(whisper_language("auto"), None);
/// ```
pub fn whisper_language(tag: &str) -> Option<String> {
    let primary = tag.split(['-', '_']).next().unwrap_or("").trim();
    if primary.is_empty() || primary.eq_ignore_ascii_case("auto") {
        None
    } else {
        Some(primary.to_ascii_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Transcriber
// ---------------------------------------------------------------------------

/// Speech-to-text over 16 kHz mono samples.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, pcm: &[f32], language: Option<&str>) -> Result<String, CaptureError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Arc<dyn Transcriber>) {}
};

/// Whisper GGML model loaded with `whisper-rs`.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl WhisperTranscriber {
    pub fn load(model: &Path) -> Result<Self, CaptureError> {
        if !model.exists() {
            return Err(CaptureError::Engine(format!(
                "model not found: {}",
                model.display()
            )));
        }
        let path = model.to_str().ok_or_else(|| {
            CaptureError::Engine(format!("model path is not UTF-8: {}", model.display()))
        })?;

        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| CaptureError::Engine(format!("loading {}: {e}", model.display())))?;

        let threads = thread::available_parallelism()
            .map(|n| n.get().min(8) as i32)
            .unwrap_or(4);
        log::info!("capture: whisper model {} loaded", model.display());
        Ok(Self { ctx, threads })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, pcm: &[f32], language: Option<&str>) -> Result<String, CaptureError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_n_threads(self.threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| CaptureError::Engine(e.to_string()))?;
        state
            .full(params, pcm)
            .map_err(|e| CaptureError::Engine(e.to_string()))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| CaptureError::Engine(e.to_string()))?;
        let mut text = String::new();
        for i in 0..segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| CaptureError::Engine(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }
        Ok(text)
    }
}

/// Strip the non-speech annotations Whisper emits for silence and noise,
/// e.g. `[BLANK_AUDIO]` or `(wind blowing)`.
fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The event that ends a recorded session, before its `End`.
pub fn recognize(transcriber: &dyn Transcriber, clip: &Clip, language: Option<&str>) -> CaptureEvent {
    let pcm = clip.to_whisper_pcm();
    if pcm.len() < MIN_SAMPLES {
        log::debug!("capture: {:.2}s recorded, too short to transcribe", clip.seconds());
        return CaptureEvent::Error(CaptureErrorKind::NoSpeech);
    }

    let pcm = &pcm[..pcm.len().min(MAX_SAMPLES)];
    match transcriber.transcribe(pcm, language) {
        Ok(text) => {
            let transcript = strip_annotations(&text);
            if transcript.is_empty() {
                CaptureEvent::Error(CaptureErrorKind::NoSpeech)
            } else {
                CaptureEvent::Result { transcript }
            }
        }
        Err(e) => {
            log::warn!("capture: transcription failed: {e}");
            CaptureEvent::Error(CaptureErrorKind::Other(e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// LocalRecognizer
// ---------------------------------------------------------------------------

struct Recording {
    stop: std_mpsc::Sender<()>,
    worker: thread::JoinHandle<()>,
}

/// [`CaptureEngine`] recording from a [`Microphone`] and transcribing
/// locally.
pub struct LocalRecognizer {
    microphone: Arc<dyn Microphone>,
    transcriber: Arc<dyn Transcriber>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    recording: Option<Recording>,
}

impl LocalRecognizer {
    pub fn new(
        microphone: Arc<dyn Microphone>,
        transcriber: Arc<dyn Transcriber>,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        Self {
            microphone,
            transcriber,
            events,
            recording: None,
        }
    }

    /// Body of the recording thread.
    fn record(
        microphone: &dyn Microphone,
        transcriber: &dyn Transcriber,
        language: Option<&str>,
        stop: std_mpsc::Receiver<()>,
        ready: std_mpsc::Sender<Result<(), CaptureError>>,
        events: &mpsc::UnboundedSender<CaptureEvent>,
    ) {
        let mut input = match microphone.open() {
            Ok(input) => input,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));
        let _ = events.send(CaptureEvent::Started);

        let mut endpointer = Endpointer::new(SPEECH_LEVEL, TRAILING_SILENCE);
        let mut recorded = Duration::ZERO;
        loop {
            match stop.recv_timeout(POLL) {
                // Stop requested, or the recognizer was dropped.
                Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            }
            recorded += POLL;
            if endpointer.observe(input.level(), POLL) {
                log::debug!("capture: end of speech after {}ms", recorded.as_millis());
                break;
            }
            if recorded >= MAX_RECORDING {
                log::info!("capture: recording reached {}s, stopping", MAX_RECORDING.as_secs());
                break;
            }
        }

        let outcome = match input.finish() {
            Ok(clip) => recognize(transcriber, &clip, language),
            Err(kind) => CaptureEvent::Error(kind),
        };
        let _ = events.send(outcome);
        let _ = events.send(CaptureEvent::End);
    }
}

impl CaptureEngine for LocalRecognizer {
    fn is_available(&self) -> bool {
        self.microphone.is_present()
    }

    fn start(&mut self, settings: &CaptureConfig) -> Result<(), CaptureError> {
        if self
            .recording
            .as_ref()
            .is_some_and(|r| !r.worker.is_finished())
        {
            return Err(CaptureError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let microphone = Arc::clone(&self.microphone);
        let transcriber = Arc::clone(&self.transcriber);
        let events = self.events.clone();
        let language = whisper_language(&settings.language);

        let worker = thread::Builder::new()
            .name("voice-capture".into())
            .spawn(move || {
                Self::record(
                    microphone.as_ref(),
                    transcriber.as_ref(),
                    language.as_deref(),
                    stop_rx,
                    ready_tx,
                    &events,
                );
            })
            .map_err(|e| CaptureError::Engine(format!("recording thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| CaptureError::Engine("recording thread exited".into()))??;

        self.recording = Some(Recording {
            stop: stop_tx,
            worker,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(recording) = &self.recording {
            // The worker may already be transcribing.
            let _ = recording.stop.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

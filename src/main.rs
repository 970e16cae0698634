//! Application entry point: voice chat widget.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the capture controller (local Whisper recognizer when a model is
//!    installed), the playback synchronizer and the HTTP command client.
//! 5. Spawn the assistant event loop on the runtime.
//! 6. Run [`eframe::run_native`], which blocks the main thread until the
//!    window is closed.

use std::sync::Arc;

use tokio::sync::mpsc;
use voice_chat::{
    app::{native_options, VoiceChatApp},
    assistant::{Assistant, UiCommand},
    capture::{
        CaptureEngine, CaptureEvent, CpalMicrophone, LocalRecognizer, UnavailableCapture,
        VoiceCaptureController, WhisperTranscriber,
    },
    chat::new_shared_state,
    client::{CommandClient, HttpCommandClient},
    config::{AppConfig, AppPaths, CaptureConfig},
    playback::{PacedPlayback, PlaybackEvent, SpeechPlaybackSynchronizer},
};

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice chat starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to create tokio runtime: {e}");
            return Err(eframe::Error::AppCreation(Box::new(e)));
        }
    };

    // 4. Channels, controllers and client
    let state = new_shared_state();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiCommand>();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel::<CaptureEvent>();
    let (playback_tx, playback_rx) = mpsc::unbounded_channel::<PlaybackEvent>();

    let capture = VoiceCaptureController::new(
        recognizer(&config.capture, capture_tx.clone()),
        config.capture.clone(),
        state.clone(),
        capture_tx,
    );

    let playback = SpeechPlaybackSynchronizer::new(
        Box::new(PacedPlayback::new(config.playback.words_per_minute, playback_tx)),
        config.playback.clone(),
        state.clone(),
    );

    let http = HttpCommandClient::from_config(&config.endpoint);
    log::info!("commands go to {}", http.url());
    let client: Arc<dyn CommandClient> = Arc::new(http);

    // 5. Assistant event loop
    let assistant = Assistant::new(&config, state.clone(), capture, playback, client);
    rt.spawn(assistant.run(ui_rx, capture_rx, playback_rx));

    // 6. UI (blocks until the window is closed)
    let app = VoiceChatApp::new(state, ui_tx);
    let options = native_options(&config);

    eframe::run_native(
        "Voice Chat",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}

/// Local Whisper recognizer, or [`UnavailableCapture`] when the model cannot
/// be loaded.
fn recognizer(
    config: &CaptureConfig,
    events: mpsc::UnboundedSender<CaptureEvent>,
) -> Box<dyn CaptureEngine> {
    let model = config.model_path(&AppPaths::new());
    match WhisperTranscriber::load(&model) {
        Ok(transcriber) => Box::new(LocalRecognizer::new(
            Arc::new(CpalMicrophone),
            Arc::new(transcriber),
            events,
        )),
        Err(e) => {
            log::warn!("voice input disabled: {e}");
            Box::new(UnavailableCapture)
        }
    }
}

//! Microphone input for the local recognizer.
//!
//! [`Microphone::open`] is always called on the recording thread: the `cpal`
//! stream behind [`CpalMicrophone`] is `!Send` on some hosts and never leaves
//! the thread that built it.  Samples are collected as delivered and turned
//! into Whisper input (16 kHz mono) only when the recording is finished.
//!
//! While recording, [`Endpointer`] watches the input level so a session can
//! end by itself once the speaker has finished, the way a browser
//! recognizer does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::engine::{CaptureError, CaptureErrorKind};

/// Sample rate Whisper expects.
pub const WHISPER_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

/// Everything recorded during one session, in the device's own format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clip {
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Clip {
    /// Average the channels of every frame and resample linearly to
    /// [`WHISPER_RATE`].
    pub fn to_whisper_pcm(&self) -> Vec<f32> {
        let mono: Vec<f32> = match self.channels {
            0 => return Vec::new(),
            1 => self.samples.clone(),
            n => self
                .samples
                .chunks_exact(usize::from(n))
                .map(|frame| frame.iter().sum::<f32>() / f32::from(n))
                .collect(),
        };

        if self.sample_rate == WHISPER_RATE || self.sample_rate == 0 || mono.is_empty() {
            return mono;
        }

        let step = f64::from(self.sample_rate) / f64::from(WHISPER_RATE);
        let out_len = (mono.len() as f64 / step).ceil() as usize;
        (0..out_len)
            .map(|i| {
                let pos = i as f64 * step;
                let at = pos as usize;
                let frac = (pos - at as f64) as f32;
                match (mono.get(at), mono.get(at + 1)) {
                    (Some(a), Some(b)) => a + (b - a) * frac,
                    (Some(a), None) => *a,
                    _ => 0.0,
                }
            })
            .collect()
    }

    /// Length in seconds at the device rate.
    pub fn seconds(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * f32::from(self.channels))
    }
}

/// Root mean square of `samples`; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

// ---------------------------------------------------------------------------
// Endpointer
// ---------------------------------------------------------------------------

/// Energy-based end-of-utterance detection.
///
/// Fed one input level per poll.  Fires once speech (a level at or above
/// the threshold) has been heard and then followed by `trailing` worth of
/// quieter polls.
#[derive(Debug, Clone)]
pub struct Endpointer {
    threshold: f32,
    trailing: Duration,
    heard_speech: bool,
    quiet: Duration,
}

impl Endpointer {
    pub fn new(threshold: f32, trailing: Duration) -> Self {
        Self {
            threshold,
            trailing,
            heard_speech: false,
            quiet: Duration::ZERO,
        }
    }

    /// Record `level` for the last `elapsed`.  Returns `true` when the
    /// utterance is over.
    pub fn observe(&mut self, level: f32, elapsed: Duration) -> bool {
        if level >= self.threshold {
            self.heard_speech = true;
            self.quiet = Duration::ZERO;
            return false;
        }
        if !self.heard_speech {
            return false;
        }
        self.quiet += elapsed;
        self.quiet >= self.trailing
    }
}

// ---------------------------------------------------------------------------
// Microphone seam
// ---------------------------------------------------------------------------

/// A running input.  Dropping it without [`finish`](Self::finish) discards
/// the recording.
pub trait ActiveInput {
    /// [`rms`] of the samples captured since the previous call.
    fn level(&mut self) -> f32;

    /// Stop recording and hand over what was captured.
    ///
    /// Fails with [`CaptureErrorKind::AudioCapture`] when the device
    /// reported an error while recording.
    fn finish(self: Box<Self>) -> Result<Clip, CaptureErrorKind>;
}

/// Opens an input device for one recording.
pub trait Microphone: Send + Sync {
    /// `false` when the host has no input device at all.
    fn is_present(&self) -> bool;

    fn open(&self) -> Result<Box<dyn ActiveInput>, CaptureError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Microphone>, _: Box<dyn ActiveInput>) {}
};

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// The default input device of the default `cpal` host.
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl Microphone for CpalMicrophone {
    fn is_present(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn open(&self) -> Result<Box<dyn ActiveInput>, CaptureError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(CaptureError::Unavailable)?;
        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::Engine(format!("input config: {e}")))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config: cpal::StreamConfig = supported.into();

        let samples = Arc::new(Mutex::new(Vec::new()));
        let failed = Arc::new(AtomicBool::new(false));

        let sink = Arc::clone(&samples);
        let flag = Arc::clone(&failed);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(data);
                },
                move |err: cpal::StreamError| {
                    log::error!("capture: input stream error: {err}");
                    flag.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| CaptureError::Engine(format!("input stream: {e}")))?;
        stream
            .play()
            .map_err(|e| CaptureError::Engine(format!("starting input stream: {e}")))?;

        log::debug!("capture: microphone open at {sample_rate} Hz, {channels} channel(s)");
        Ok(Box::new(CpalInput {
            stream,
            samples,
            failed,
            sample_rate,
            channels,
            measured: 0,
        }))
    }
}

struct CpalInput {
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    failed: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    /// Samples already covered by `level`.
    measured: usize,
}

impl ActiveInput for CpalInput {
    fn level(&mut self) -> f32 {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = samples.get(self.measured..).unwrap_or(&[]);
        let level = rms(fresh);
        self.measured = samples.len();
        level
    }

    fn finish(self: Box<Self>) -> Result<Clip, CaptureErrorKind> {
        let CpalInput {
            stream,
            samples,
            failed,
            sample_rate,
            channels,
            ..
        } = *self;
        drop(stream);

        if failed.load(Ordering::Relaxed) {
            return Err(CaptureErrorKind::AudioCapture);
        }
        let samples = std::mem::take(&mut *samples.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(Clip {
            samples,
            sample_rate,
            channels,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Clip {
        Clip {
            samples,
            sample_rate,
            channels,
        }
    }

    #[test]
    fn mono_16k_passes_through() {
        let input: Vec<f32> = (0..32).map(|i| i as f32 / 32.0).collect();
        assert_eq!(clip(input.clone(), 16_000, 1).to_whisper_pcm(), input);
    }

    #[test]
    fn stereo_frames_are_averaged() {
        let pcm = clip(vec![1.0, -1.0, 0.25, 0.75], 16_000, 2).to_whisper_pcm();
        assert_eq!(pcm, vec![0.0, 0.5]);
    }

    #[test]
    fn one_second_at_48k_becomes_16k_samples() {
        let pcm = clip(vec![0.3; 96_000], 48_000, 2).to_whisper_pcm();
        assert_eq!(pcm.len(), 16_000);
        assert!(pcm.iter().all(|s| (s - 0.3).abs() < 1e-5));
    }

    #[test]
    fn odd_rates_land_within_one_sample() {
        let pcm = clip(vec![0.0; 44_100], 44_100, 1).to_whisper_pcm();
        assert!(pcm.len().abs_diff(16_000) <= 1, "got {}", pcm.len());
    }

    #[test]
    fn degenerate_clips_are_empty() {
        assert!(clip(vec![0.1; 10], 48_000, 0).to_whisper_pcm().is_empty());
        assert!(Clip::default().to_whisper_pcm().is_empty());
        assert_eq!(Clip::default().seconds(), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn endpointer_waits_for_speech_then_silence() {
        let poll = Duration::from_millis(100);
        let mut ep = Endpointer::new(0.02, Duration::from_millis(300));

        // Leading silence never ends the utterance.
        for _ in 0..20 {
            assert!(!ep.observe(0.0, poll));
        }

        assert!(!ep.observe(0.2, poll));
        assert!(!ep.observe(0.0, poll));
        assert!(!ep.observe(0.0, poll));
        // A new word resets the trailing silence.
        assert!(!ep.observe(0.1, poll));
        assert!(!ep.observe(0.0, poll));
        assert!(!ep.observe(0.0, poll));
        assert!(ep.observe(0.0, poll));
    }

    #[test]
    fn seconds_counts_frames() {
        assert!((clip(vec![0.0; 48_000], 24_000, 2).seconds() - 1.0).abs() < 1e-6);
    }
}

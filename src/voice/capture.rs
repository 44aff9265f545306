//! Microphone capture with ambient-noise calibration
//!
//! [`MicrophoneSource`] records from the default input device and segments
//! one utterance per capture using energy endpointing: wait for a frame
//! above the threshold, accumulate until trailing silence, hand back the
//! speech. [`Endpointer`] holds the segmentation state machine and is pure,
//! so it is testable without hardware.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::capabilities::{AudioClip, AudioError, AudioSource, rms_level};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Energy threshold used before any calibration
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.03;

/// Lowest threshold calibration may set
const THRESHOLD_FLOOR: f32 = 0.01;

/// Calibration scales the ambient level by this factor
const AMBIENT_HEADROOM: f32 = 1.5;

/// How much ambient audio calibration samples
const CALIBRATION_WINDOW: Duration = Duration::from_secs(1);

/// Minimum speech before an utterance can complete (samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Trailing silence that ends an utterance (samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Quiet audio kept ahead of the detected speech start (samples)
const LEAD_IN_SAMPLES: usize = 3200; // 0.2 seconds

/// Longest utterance a single capture returns (samples)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// How long [`MicrophoneSource::capture`] waits for speech to start
const START_TIMEOUT: Duration = Duration::from_secs(15);

/// Poll interval while draining the input buffer
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// State of the endpointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointerState {
    /// Waiting for a frame above the threshold
    Idle,
    /// Accumulating an utterance
    Capturing,
}

/// Segments one utterance out of a live sample stream.
///
/// Feed it chunks of samples with [`push`](Self::push); it starts
/// accumulating at the first chunk above the energy threshold (keeping a
/// little quiet lead-in for context) and reports completion after enough
/// trailing silence, or once the utterance cap is hit.
#[derive(Debug)]
pub struct Endpointer {
    threshold: f32,
    state: EndpointerState,
    lead_in: Vec<f32>,
    speech: Vec<f32>,
    voiced: usize,
    silence_run: usize,
}

impl Endpointer {
    /// New endpointer using the given energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: EndpointerState::Idle,
            lead_in: Vec::new(),
            speech: Vec::new(),
            voiced: 0,
            silence_run: 0,
        }
    }

    /// Processes one chunk of samples. Returns `true` once the utterance is
    /// complete; the samples are then available via
    /// [`take_utterance`](Self::take_utterance).
    pub fn push(&mut self, samples: &[f32]) -> bool {
        let is_speech = rms_level(samples) > self.threshold;

        match self.state {
            EndpointerState::Idle => {
                if is_speech {
                    self.state = EndpointerState::Capturing;
                    self.speech = std::mem::take(&mut self.lead_in);
                    self.speech.extend_from_slice(samples);
                    self.voiced = samples.len();
                    self.silence_run = 0;
                    tracing::trace!(samples = samples.len(), "speech started");
                } else {
                    self.lead_in.extend_from_slice(samples);
                    let excess = self.lead_in.len().saturating_sub(LEAD_IN_SAMPLES);
                    if excess > 0 {
                        self.lead_in.drain(..excess);
                    }
                }
            }
            EndpointerState::Capturing => {
                self.speech.extend_from_slice(samples);

                if is_speech {
                    self.voiced += samples.len();
                    self.silence_run = 0;
                } else {
                    self.silence_run += samples.len();
                }

                if self.speech.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(samples = self.speech.len(), "utterance cap reached");
                    return true;
                }

                if self.silence_run > SILENCE_SAMPLES && self.voiced > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = self.speech.len(), "utterance complete");
                    return true;
                }

                // A short burst (door slam, cough) with no speech after it:
                // go back to waiting instead of completing.
                if self.silence_run > SILENCE_SAMPLES * 2 {
                    tracing::trace!("false trigger, resetting");
                    self.reset();
                }
            }
        }

        false
    }

    /// Whether an utterance is currently accumulating
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state == EndpointerState::Capturing
    }

    /// The accumulated utterance, clearing the endpointer for reuse
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.speech);
        self.reset();
        utterance
    }

    /// Discards any accumulated state and goes back to waiting for speech
    pub fn reset(&mut self) {
        self.state = EndpointerState::Idle;
        self.lead_in.clear();
        self.speech.clear();
        self.voiced = 0;
        self.silence_run = 0;
    }
}

/// Captures utterances from the default input device.
///
/// Call [`calibrate`](AudioSource::calibrate) once before the first capture
/// so the endpointing threshold matches the room; an uncalibrated source
/// uses [`DEFAULT_ENERGY_THRESHOLD`].
pub struct MicrophoneSource {
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
    threshold: f32,
}

impl MicrophoneSource {
    /// Opens the default input device at 16kHz mono.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Audio`] when no input device is available or
    /// none supports the capture format.
    pub fn new() -> crate::Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| AudioError(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| AudioError("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "microphone source initialized"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            threshold: DEFAULT_ENERGY_THRESHOLD,
        })
    }

    /// Starts streaming into the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the input stream cannot be built.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| AudioError(e.to_string()))?;

        stream.play().map_err(|e| AudioError(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stops streaming
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Samples captured since the last call, clearing the buffer
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Samples captured so far, without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Discards buffered samples
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Whether the input stream is running
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Energy threshold endpointing currently uses
    #[must_use]
    pub const fn energy_threshold(&self) -> f32 {
        self.threshold
    }

    /// Records for a fixed duration, ignoring endpointing.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the input stream cannot be started.
    pub fn record_for(&mut self, duration: Duration) -> Result<AudioClip, AudioError> {
        let was_capturing = self.is_capturing();
        self.start()?;
        self.clear_buffer();

        std::thread::sleep(duration);

        let samples = self.take_buffer();
        if !was_capturing {
            self.stop();
        }
        Ok(AudioClip::new(samples, SAMPLE_RATE))
    }
}

impl AudioSource for MicrophoneSource {
    fn calibrate(&mut self) -> Result<(), AudioError> {
        let ambient = self.record_for(CALIBRATION_WINDOW)?;
        self.threshold = (ambient.rms() * AMBIENT_HEADROOM).max(THRESHOLD_FLOOR);
        tracing::debug!(
            ambient_rms = ambient.rms(),
            threshold = self.threshold,
            "calibrated for ambient noise"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<AudioClip, AudioError> {
        self.start()?;
        self.clear_buffer();

        let mut endpointer = Endpointer::new(self.threshold);
        let started = Instant::now();

        loop {
            std::thread::sleep(POLL_INTERVAL);

            let chunk = self.take_buffer();
            if !chunk.is_empty() && endpointer.push(&chunk) {
                break;
            }

            if !endpointer.is_capturing() && started.elapsed() > START_TIMEOUT {
                self.stop();
                return Err(AudioError(format!(
                    "no speech within {}s",
                    START_TIMEOUT.as_secs()
                )));
            }
        }

        self.stop();
        let clip = AudioClip::new(endpointer.take_utterance(), SAMPLE_RATE);
        tracing::debug!(seconds = clip.duration_secs(), "utterance captured");
        Ok(clip)
    }
}

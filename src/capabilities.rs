//! Capability seams for speech processing
//!
//! The assistant is generic over three traits so audio capture,
//! transcription, and synthesis can be swapped out (and mocked in tests)
//! without touching session code. The shipped implementations live in
//! [`crate::voice`].

use thiserror::Error;

/// Audio capture or device fault
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AudioError(pub String);

/// Why transcription failed, as reported by a [`Transcriber`]
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The audio contained no recognisable speech
    #[error("no recognisable speech")]
    Unintelligible,

    /// The transcription service could not be reached or refused
    #[error("service failure: {0}")]
    Service(String),

    /// Anything else the engine reported
    #[error("{0}")]
    Other(String),
}

/// Speech synthesis fault
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SynthesisError(pub String);

/// Mono audio captured from an [`AudioSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
}

impl AudioClip {
    /// Wraps raw samples at the given rate
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Clip length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }

    /// Root-mean-square level of the clip
    #[must_use]
    pub fn rms(&self) -> f32 {
        rms_level(&self.samples)
    }

    /// Raw little-endian PCM16, the layout speech APIs expect
    #[must_use]
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            bytes.extend_from_slice(&sample_i16.to_le_bytes());
        }
        bytes
    }

    /// WAV-encoded copy of the clip (mono, 16-bit)
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when encoding fails.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| AudioError(e.to_string()))?;

            for &sample in &self.samples {
                #[allow(clippy::cast_possible_truncation)]
                let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(sample_i16)
                    .map_err(|e| AudioError(e.to_string()))?;
            }

            writer.finalize().map_err(|e| AudioError(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

/// Root-mean-square level of a sample window
#[must_use]
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    #[allow(clippy::cast_precision_loss)]
    {
        (sum_squares / samples.len() as f32).sqrt()
    }
}

/// Source of captured utterances (a microphone in production)
pub trait AudioSource {
    /// Samples ambient noise so capture can tell speech from background.
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the device cannot be read.
    fn calibrate(&mut self) -> Result<(), AudioError>;

    /// Blocks until one utterance has been captured.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the device cannot be read.
    fn capture(&mut self) -> Result<AudioClip, AudioError>;
}

/// Speech-to-text engine
pub trait Transcriber {
    /// Transcribes `clip`, expecting speech in `language` (an IETF-style
    /// code such as `en-US`).
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError::Unintelligible`] when no words could be
    /// made out and [`TranscribeError::Service`] when the engine could not
    /// be reached.
    fn recognize(&mut self, clip: &AudioClip, language: &str) -> Result<String, TranscribeError>;
}

/// Text-to-speech engine
pub trait Synthesizer {
    /// Speaks `text` aloud in `language`, blocking until playback is done.
    ///
    /// # Errors
    ///
    /// Returns [`SynthesisError`] when synthesis or playback fails.
    fn speak(&mut self, text: &str, language: &str) -> Result<(), SynthesisError>;
}

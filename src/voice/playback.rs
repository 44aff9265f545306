//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::capabilities::AudioError;

/// Sample rate for playback (matches the synthesis service's MP3 output)
const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Plays audio on the default output device, blocking until it drains
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Audio`] when no output device is available
    /// or none supports the playback format.
    pub fn new() -> crate::Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| AudioError(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| AudioError("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Decodes MP3 bytes and plays them, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when decoding or playback fails.
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<(), AudioError> {
        let samples = decode_mp3(mp3_data)?;
        self.play(samples)
    }

    /// Plays mono f32 samples, blocking until done.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError`] when the output stream cannot be built.
    pub fn play(&self, samples: Vec<f32>) -> Result<(), AudioError> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError("no output device".to_string()))?;

        let channels = self.config.channels as usize;
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position_cb.load(Ordering::Relaxed);
                        let sample = if pos < samples_cb.len() {
                            position_cb.store(pos + 1, Ordering::Relaxed);
                            samples_cb[pos]
                        } else {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| AudioError(e.to_string()))?;

        stream.play().map_err(|e| AudioError(e.to_string()))?;

        // Wait for the stream to drain, bounded by the clip length plus
        // some slack for device latency.
        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = std::time::Duration::from_millis(duration_ms + 500);
        let started = std::time::Instant::now();

        while !finished.load(Ordering::Relaxed) {
            if started.elapsed() > timeout {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        std::thread::sleep(std::time::Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>, AudioError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => samples.extend(pcm_to_mono_f32(&frame.data, frame.channels)),
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(AudioError(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Convert interleaved i16 PCM to mono f32, averaging stereo pairs
fn pcm_to_mono_f32(data: &[i16], channels: usize) -> Vec<f32> {
    if channels == 2 {
        data.chunks(2)
            .map(|chunk| {
                let left = f32::from(chunk[0]) / 32768.0;
                let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                f32::midpoint(left, right)
            })
            .collect()
    } else {
        data.iter().map(|&s| f32::from(s) / 32768.0).collect()
    }
}

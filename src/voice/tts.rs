//! Speech synthesis over the Google Translate voice endpoint
//!
//! The endpoint returns MP3 audio for short text snippets. Longer text is
//! cut into segments at whitespace, fetched one request per segment, and
//! played back in order so sentences never stop mid-word.

use std::time::Duration;

use crate::capabilities::{SynthesisError, Synthesizer};
use crate::error::Error;
use crate::voice::playback::AudioPlayback;

/// Synthesis endpoint
const SYNTH_URL: &str = "https://translate.google.com/translate_tts";

/// The endpoint rejects queries beyond this many characters
const MAX_SEGMENT_CHARS: usize = 200;

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Speaks text aloud via the Google Translate voice endpoint
pub struct GoogleSynthesizer {
    client: reqwest::blocking::Client,
    playback: AudioPlayback,
}

impl GoogleSynthesizer {
    /// New synthesizer bound to the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the HTTP client cannot be built and
    /// [`crate::Error::Audio`] when no output device is available.
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            playback: AudioPlayback::new()?,
        })
    }

    fn fetch_segment(
        &self,
        segment: &str,
        language: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, SynthesisError> {
        let total_param = total.to_string();
        let idx_param = idx.to_string();
        let textlen_param = segment.chars().count().to_string();

        let response = self
            .client
            .get(SYNTH_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", segment),
                ("total", total_param.as_str()),
                ("idx", idx_param.as_str()),
                ("textlen", textlen_param.as_str()),
            ])
            .send()
            .map_err(|e| SynthesisError(format!("failed to reach synthesis API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "synthesis API error");
            return Err(SynthesisError(format!(
                "synthesis API error {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| SynthesisError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Synthesizer for GoogleSynthesizer {
    fn speak(&mut self, text: &str, language: &str) -> Result<(), SynthesisError> {
        let segments = segment_text(text, MAX_SEGMENT_CHARS);
        if segments.is_empty() {
            return Ok(());
        }

        let total = segments.len();
        tracing::debug!(segments = total, language, "synthesizing speech");

        for (idx, segment) in segments.iter().enumerate() {
            let mp3 = self.fetch_segment(segment, language, idx, total)?;
            self.playback
                .play_mp3(&mp3)
                .map_err(|e| SynthesisError(e.to_string()))?;
        }

        Ok(())
    }
}

/// Packs whitespace-delimited words into segments of at most `max_chars`
/// characters. A single word longer than the limit is cut at character
/// boundaries instead of being dropped.
fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();

        if word_chars > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars) {
                segments.push(chunk.iter().collect());
            }
            continue;
        }

        // +1 for the joining space
        if !current.is_empty() && current_chars + 1 + word_chars > max_chars {
            segments.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

//! Assistant session
//!
//! Ties the three speech capabilities to the session store: speak and
//! listen with durable conversation logs, multi-valued keyword memory, and
//! the last recognised utterance for quick intent checks.

use crate::capabilities::{AudioSource, Synthesizer, Transcriber};
use crate::config::AssistantConfig;
use crate::error::RecognitionError;
use crate::store::{LogKind, SessionStore, open_backend};
use crate::{Error, Result};

/// Per-call options for [`Assistant::speak_with`]
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    /// Language override for this utterance (`None` uses the session's
    /// speak language)
    pub language: Option<String>,
    /// Whether the spoken text is appended to the speak log
    pub remember: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            language: None,
            remember: true,
        }
    }
}

/// A voice assistant session.
///
/// Generic over audio capture, transcription, and synthesis so session
/// logic stays testable without hardware. Everything the assistant carries
/// between runs lives in the session store; `last_recognised` is the only
/// in-memory conversational state.
pub struct Assistant<A, T, S> {
    audio: A,
    transcriber: T,
    synthesizer: S,
    store: SessionStore,
    speak_language: String,
    listen_language: String,
    last_recognised: String,
}

impl<A: AudioSource, T: Transcriber, S: Synthesizer> Assistant<A, T, S> {
    /// Opens the configured store (creating session tables as needed) and
    /// wires the capabilities. Does not calibrate; call
    /// [`calibrate`](Self::calibrate) before the first listen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the store cannot be opened or its
    /// tables cannot be created.
    pub fn new(config: AssistantConfig, audio: A, transcriber: T, synthesizer: S) -> Result<Self> {
        let backend = open_backend(config.backend, &config.store_path)?;
        let store = SessionStore::open(backend, config.tables)?;
        Ok(Self::with_store(
            store,
            config.language,
            audio,
            transcriber,
            synthesizer,
        ))
    }

    /// Builds a session over an already-open store
    pub fn with_store(
        store: SessionStore,
        language: impl Into<String>,
        audio: A,
        transcriber: T,
        synthesizer: S,
    ) -> Self {
        let language = language.into();
        Self {
            audio,
            transcriber,
            synthesizer,
            store,
            speak_language: language.clone(),
            listen_language: language,
            last_recognised: String::new(),
        }
    }

    /// Samples ambient noise once so capture can separate speech from
    /// background. Call before the first [`listen`](Self::listen); safe to
    /// call again when the environment changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] when the device cannot be read.
    pub fn calibrate(&mut self) -> Result<()> {
        self.audio.calibrate()?;
        tracing::debug!("ambient noise calibrated");
        Ok(())
    }

    /// Speaks `text` in the session language and appends it to the speak
    /// log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] when synthesis or playback fails and
    /// [`Error::Storage`] when the log cannot be written.
    pub fn speak(&mut self, text: &str) -> Result<()> {
        self.speak_with(text, SpeakOptions::default())
    }

    /// Speaks `text` with per-call options. On success the text is
    /// appended to the speak log, unless `remember` is off or the text is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] when synthesis or playback fails and
    /// [`Error::Storage`] when the log cannot be written.
    pub fn speak_with(&mut self, text: &str, options: SpeakOptions) -> Result<()> {
        let language = options.language.as_deref().unwrap_or(&self.speak_language);
        tracing::debug!(language, chars = text.len(), "speaking");
        self.synthesizer.speak(text, language)?;
        if options.remember && !text.is_empty() {
            self.store.append_log(LogKind::Speak, text)?;
        }
        Ok(())
    }

    /// Blocks for one utterance in the session language. See
    /// [`listen_in`](Self::listen_in).
    ///
    /// # Errors
    ///
    /// Same as [`listen_in`](Self::listen_in).
    pub fn listen(&mut self) -> Result<String> {
        let language = self.listen_language.clone();
        self.listen_in(&language)
    }

    /// Blocks until one utterance is captured, transcribes it, appends the
    /// transcript to the listen log, and returns it.
    ///
    /// `last_recognised` is updated on every path: it equals the returned
    /// transcript after `Ok` and is empty after any `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] when capture fails, [`Error::Recognition`]
    /// when transcription fails (the [`RecognitionError`] inside tells
    /// unintelligible speech from an unreachable service), and
    /// [`Error::Storage`] when the transcript cannot be logged.
    pub fn listen_in(&mut self, language: &str) -> Result<String> {
        self.last_recognised.clear();

        let clip = self.audio.capture()?;
        tracing::debug!(seconds = clip.duration_secs(), language, "utterance captured");

        let transcript = self
            .transcriber
            .recognize(&clip, language)
            .map_err(RecognitionError::from)?;

        self.store.append_log(LogKind::Listen, &transcript)?;
        tracing::info!(transcript = %transcript, "utterance recognised");

        self.last_recognised.clone_from(&transcript);
        Ok(transcript)
    }

    /// The most recent transcript: empty before the first successful
    /// listen and after a failed one
    #[must_use]
    pub fn last_recognised(&self) -> &str {
        &self.last_recognised
    }

    /// Case-insensitive substring check against the last transcript.
    /// `has_heard("YES")` is true after hearing "yes please".
    #[must_use]
    pub fn has_heard(&self, fragment: &str) -> bool {
        self.last_recognised
            .to_lowercase()
            .contains(&fragment.to_lowercase())
    }

    /// True when any of `fragments` occurs in the last transcript; an
    /// empty collection matches nothing.
    #[must_use]
    pub fn has_heard_any<I>(&self, fragments: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let heard = self.last_recognised.to_lowercase();
        fragments
            .into_iter()
            .any(|fragment| heard.contains(&fragment.as_ref().to_lowercase()))
    }

    /// Stores `value` under `keyword`. Repeating a keyword accumulates
    /// values; nothing is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the row cannot be written.
    pub fn memorize(&self, keyword: &str, value: &str) -> Result<()> {
        self.store.memorize(keyword, value)?;
        Ok(())
    }

    /// Every value memorized under `keyword`, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the memory table cannot be read.
    pub fn remember(&self, keyword: &str) -> Result<Vec<String>> {
        Ok(self.store.remember(keyword)?)
    }

    /// The most recent value memorized under `keyword`, or the empty
    /// string when the keyword was never memorized
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the memory table cannot be read.
    pub fn remember_last(&self, keyword: &str) -> Result<String> {
        Ok(self.store.remember(keyword)?.pop().unwrap_or_default())
    }

    /// Everything the assistant has heard, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be read.
    pub fn listened_sentences(&self) -> Result<Vec<String>> {
        Ok(self.store.all_log_entries(LogKind::Listen)?)
    }

    /// The most recent listen-log entry, or the empty string when the log
    /// is empty. Unlike [`last_recognised`](Self::last_recognised) this
    /// reads the durable log, so it survives restarts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be read.
    pub fn last_listened_sentence(&self) -> Result<String> {
        Ok(self
            .store
            .all_log_entries(LogKind::Listen)?
            .pop()
            .unwrap_or_default())
    }

    /// Empties the listen log; the session stays usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be cleared.
    pub fn forget_listened_sentences(&self) -> Result<()> {
        self.store.clear_log(LogKind::Listen)?;
        Ok(())
    }

    /// Everything the assistant has said, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be read.
    pub fn spoken_sentences(&self) -> Result<Vec<String>> {
        Ok(self.store.all_log_entries(LogKind::Speak)?)
    }

    /// The most recent speak-log entry, or the empty string when the log
    /// is empty
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be read.
    pub fn last_spoken_sentence(&self) -> Result<String> {
        Ok(self
            .store
            .all_log_entries(LogKind::Speak)?
            .pop()
            .unwrap_or_default())
    }

    /// Empties the speak log; the session stays usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] when the log cannot be cleared.
    pub fn forget_spoken_sentences(&self) -> Result<()> {
        self.store.clear_log(LogKind::Speak)?;
        Ok(())
    }

    /// Language used by [`speak`](Self::speak)
    #[must_use]
    pub fn speak_language(&self) -> &str {
        &self.speak_language
    }

    /// Language used by [`listen`](Self::listen)
    #[must_use]
    pub fn listen_language(&self) -> &str {
        &self.listen_language
    }

    /// Changes the session's speak language
    pub fn set_speak_language(&mut self, language: impl Into<String>) {
        self.speak_language = language.into();
    }

    /// Changes the session's listen language
    pub fn set_listen_language(&mut self, language: impl Into<String>) {
        self.listen_language = language.into();
    }
}

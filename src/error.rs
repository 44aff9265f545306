//! Error types for parlance

use thiserror::Error;

use crate::capabilities::{AudioError, SynthesisError, TranscribeError};
use crate::store::StorageError;

/// Result type alias for parlance operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in a parlance session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Audio capture/device error
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a `listen()` produced no transcript.
///
/// Capability-level [`TranscribeError`]s are normalised into this taxonomy
/// at the listen boundary so callers can branch on the outcome without
/// knowing which transcriber is wired in.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Audio was captured but no words could be made out
    #[error("speech was unintelligible")]
    Unintelligible,

    /// The recognition service could not be reached or refused the request
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything else the transcriber reported
    #[error("unexpected recognition failure: {0}")]
    Unknown(String),
}

impl From<TranscribeError> for RecognitionError {
    fn from(err: TranscribeError) -> Self {
        match err {
            TranscribeError::Unintelligible => Self::Unintelligible,
            TranscribeError::Service(reason) => Self::ServiceUnavailable(reason),
            TranscribeError::Other(reason) => Self::Unknown(reason),
        }
    }
}

//! Parlance - Voice assistant sessions with durable memory
//!
//! This library provides the pieces of a spoken session:
//! - An [`Assistant`] that speaks, listens, and remembers across runs
//! - Capability traits so capture, transcription, and synthesis stay
//!   swappable (and mockable in tests)
//! - A table-oriented storage layer with a `SQLite` backend
//! - Shipped microphone and Google speech implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Assistant                      │
//! │    speak  │  listen  │  remember  │  has_heard      │
//! └──────────┬───────────────────────────────┬──────────┘
//!            │                               │
//! ┌──────────▼──────────────┐   ┌────────────▼─────────┐
//! │      Capabilities       │   │     SessionStore     │
//! │  AudioSource            │   │  keyword memory      │
//! │  Transcriber            │   │  listen / speak logs │
//! │  Synthesizer            │   │                      │
//! └──────────┬──────────────┘   └────────────┬─────────┘
//!            │                               │
//! ┌──────────▼──────────────┐   ┌────────────▼─────────┐
//! │  voice: cpal capture,   │   │  StorageBackend      │
//! │  Google STT / TTS       │   │  (SQLite)            │
//! └─────────────────────────┘   └──────────────────────┘
//! ```

pub mod assistant;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod store;
pub mod voice;

pub use assistant::{Assistant, SpeakOptions};
pub use capabilities::{
    AudioClip, AudioError, AudioSource, SynthesisError, Synthesizer, TranscribeError, Transcriber,
};
pub use config::AssistantConfig;
pub use error::{Error, RecognitionError, Result};
pub use store::{BackendKind, SessionStore, SqliteBackend, StorageBackend, TableNames};

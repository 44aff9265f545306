//! Microphone capture, speech endpointing, and the Google speech services
//!
//! Everything here implements a capability trait from
//! [`crate::capabilities`], so the assistant never depends on these types
//! directly.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{DEFAULT_ENERGY_THRESHOLD, Endpointer, MicrophoneSource, SAMPLE_RATE};
pub use playback::AudioPlayback;
pub use stt::GoogleTranscriber;
pub use tts::GoogleSynthesizer;

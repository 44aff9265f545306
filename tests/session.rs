//! Assistant session integration tests
//!
//! Exercises the speak/listen/remember lifecycle over a real store file,
//! with scripted capabilities standing in for the audio hardware and the
//! speech services.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use parlance::capabilities::{
    AudioClip, AudioError, AudioSource, SynthesisError, Synthesizer, TranscribeError, Transcriber,
};
use parlance::{Assistant, AssistantConfig, Error, SpeakOptions};

mod common;
use common::{open_session_store, temp_store};

/// Audio source that hands out a fixed clip instead of touching hardware
struct ScriptedAudio;

impl AudioSource for ScriptedAudio {
    fn calibrate(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn capture(&mut self) -> Result<AudioClip, AudioError> {
        Ok(AudioClip::new(vec![0.1; 1600], 16_000))
    }
}

/// Yields scripted transcripts, one per listen, or echoes the language it
/// was asked to recognise
enum ScriptedTranscriber {
    Script(VecDeque<Result<String, TranscribeError>>),
    EchoLanguage,
}

impl ScriptedTranscriber {
    fn hearing(sentences: &[&str]) -> Self {
        Self::Script(sentences.iter().map(|s| Ok((*s).to_string())).collect())
    }

    fn echoing_language() -> Self {
        Self::EchoLanguage
    }
}

impl Transcriber for ScriptedTranscriber {
    fn recognize(&mut self, _clip: &AudioClip, language: &str) -> Result<String, TranscribeError> {
        match self {
            Self::Script(script) => script.pop_front().expect("transcript script exhausted"),
            Self::EchoLanguage => Ok(format!("heard in {language}")),
        }
    }
}

/// Synthesizer that records what it was asked to say
#[derive(Default, Clone)]
struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSynthesizer {
    fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Synthesizer for RecordingSynthesizer {
    fn speak(&mut self, text: &str, language: &str) -> Result<(), SynthesisError> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        Ok(())
    }
}

type TestAssistant = Assistant<ScriptedAudio, ScriptedTranscriber, RecordingSynthesizer>;

/// Session over the store file at `path`, plus a handle on everything the
/// synthesizer is asked to say
fn assistant_at(
    path: &Path,
    transcriber: ScriptedTranscriber,
) -> (TestAssistant, RecordingSynthesizer) {
    let synthesizer = RecordingSynthesizer::default();
    let config = AssistantConfig {
        store_path: path.to_path_buf(),
        ..AssistantConfig::default()
    };
    let assistant = Assistant::new(
        config,
        ScriptedAudio,
        transcriber,
        synthesizer.clone(),
    )
    .expect("failed to open assistant");
    (assistant, synthesizer)
}

#[test]
fn test_conversation_survives_reopen() {
    let (_dir, path) = temp_store();

    let (mut first, _) = assistant_at(&path, ScriptedTranscriber::hearing(&["turn on the lights"]));
    first.listen().unwrap();
    first.speak("done").unwrap();
    assert_eq!(first.last_recognised(), "turn on the lights");
    drop(first);

    let (second, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));

    // In-memory state is gone, the durable logs are not.
    assert_eq!(second.last_recognised(), "");
    assert!(!second.has_heard("lights"));
    assert_eq!(
        second.listened_sentences().unwrap(),
        vec!["turn on the lights".to_string()]
    );
    assert_eq!(
        second.last_listened_sentence().unwrap(),
        "turn on the lights"
    );
    assert_eq!(second.spoken_sentences().unwrap(), vec!["done".to_string()]);
}

#[test]
fn test_memory_accumulates_across_sessions() {
    let (_dir, path) = temp_store();

    let (first, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    first.memorize("coffee", "black").unwrap();
    drop(first);

    let (second, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    second.memorize("coffee", "two sugars").unwrap();

    assert_eq!(
        second.remember("coffee").unwrap(),
        vec!["black".to_string(), "two sugars".to_string()]
    );
    assert_eq!(second.remember_last("coffee").unwrap(), "two sugars");
    drop(second);

    // The same rows are visible to a bare session store over the file.
    let store = open_session_store(&path);
    assert_eq!(
        store.remember("coffee").unwrap(),
        vec!["black".to_string(), "two sugars".to_string()]
    );
}

#[test]
fn test_storage_failure_leaves_last_recognised_empty() {
    let (_dir, path) = temp_store();

    let (mut assistant, _) =
        assistant_at(&path, ScriptedTranscriber::hearing(&["first", "second"]));
    assistant.listen().unwrap();
    assert_eq!(assistant.last_recognised(), "first");

    // Pull the listen log out from under the session.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("DROP TABLE listen_log", []).unwrap();
    drop(conn);

    // Transcription succeeds but logging fails; the transcript is not kept.
    let err = assistant.listen().unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(assistant.last_recognised(), "");
}

#[test]
fn test_speak_records_language_and_log_rules() {
    let (_dir, path) = temp_store();

    let (mut assistant, synthesizer) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    assistant.speak("hello").unwrap();
    assistant
        .speak_with(
            "hola",
            SpeakOptions {
                language: Some("es".to_string()),
                remember: true,
            },
        )
        .unwrap();
    assistant
        .speak_with(
            "off the record",
            SpeakOptions {
                language: None,
                remember: false,
            },
        )
        .unwrap();

    // Everything reached the synthesizer, in the right language.
    assert_eq!(
        synthesizer.spoken(),
        vec![
            ("hello".to_string(), "en".to_string()),
            ("hola".to_string(), "es".to_string()),
            ("off the record".to_string(), "en".to_string()),
        ]
    );
    drop(assistant);

    // Only the remembered utterances made it into the durable log.
    let (reopened, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    assert_eq!(
        reopened.spoken_sentences().unwrap(),
        vec!["hello".to_string(), "hola".to_string()]
    );
}

#[test]
fn listen_in_passes_the_language_through() {
    let (_dir, path) = temp_store();

    let (mut assistant, _) = assistant_at(&path, ScriptedTranscriber::echoing_language());

    assert_eq!(assistant.listen_in("fr-FR").unwrap(), "heard in fr-FR");

    assistant.set_listen_language("de");
    assert_eq!(assistant.listen().unwrap(), "heard in de");

    assert_eq!(
        assistant.listened_sentences().unwrap(),
        vec!["heard in fr-FR".to_string(), "heard in de".to_string()]
    );
}

#[test]
fn awkward_text_round_trips_through_the_store() {
    let (_dir, path) = temp_store();

    let heard = "it's \"quoted\"; semicolons and all";
    let (mut assistant, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[heard]));

    assistant.listen().unwrap();
    assistant
        .memorize("note", "Robert'); DROP TABLE memory;--")
        .unwrap();
    drop(assistant);

    let (reopened, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    assert_eq!(
        reopened.listened_sentences().unwrap(),
        vec![heard.to_string()]
    );
    assert_eq!(
        reopened.remember("note").unwrap(),
        vec!["Robert'); DROP TABLE memory;--".to_string()]
    );
}

#[test]
fn forget_clears_only_the_chosen_log() {
    let (_dir, path) = temp_store();

    let (mut assistant, _) =
        assistant_at(&path, ScriptedTranscriber::hearing(&["remember me", "again"]));
    assistant.listen().unwrap();
    assistant.speak("noted").unwrap();

    assistant.forget_listened_sentences().unwrap();
    assert!(assistant.listened_sentences().unwrap().is_empty());
    assert_eq!(
        assistant.spoken_sentences().unwrap(),
        vec!["noted".to_string()]
    );

    // The cleared log keeps working.
    assistant.listen().unwrap();
    assert_eq!(
        assistant.listened_sentences().unwrap(),
        vec!["again".to_string()]
    );
    drop(assistant);

    let (reopened, _) = assistant_at(&path, ScriptedTranscriber::hearing(&[]));
    assert_eq!(
        reopened.listened_sentences().unwrap(),
        vec!["again".to_string()]
    );
    assert_eq!(
        reopened.spoken_sentences().unwrap(),
        vec!["noted".to_string()]
    );
}

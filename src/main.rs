use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use parlance::capabilities::rms_level;
use parlance::store::{LogKind, SessionStore, StorageBackend, open_backend};
use parlance::voice::{GoogleSynthesizer, GoogleTranscriber, MicrophoneSource};
use parlance::{Assistant, AssistantConfig, Error, SpeakOptions};

/// Parlance - Voice assistant sessions with durable memory
#[derive(Parser)]
#[command(name = "parlance", version, about)]
struct Cli {
    /// Store file to use instead of the configured one
    #[arg(long, env = "PARLANCE_STORE")]
    store: Option<PathBuf>,

    /// Language code (IETF-style, e.g. "en" or "en-US")
    #[arg(short, long, env = "PARLANCE_LANGUAGE")]
    language: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for one utterance and print the transcript
    Listen {
        /// Language override for this utterance
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Speak text aloud
    Speak {
        /// Text to speak
        text: String,
        /// Language override for this utterance
        #[arg(short, long)]
        language: Option<String>,
        /// Skip the speak log
        #[arg(long)]
        no_remember: bool,
    },
    /// Store a value under a keyword, or print what it holds
    Remember {
        /// Keyword to file the value under
        keyword: String,
        /// Value to store; omit to print the stored values
        value: Option<String>,
    },
    /// Print conversation logs
    History {
        /// Which log to print; omit for both
        log: Option<LogArg>,
    },
    /// Clear a conversation log
    Forget {
        /// Which log to clear
        log: LogArg,
    },
    /// List tables in the store
    Tables,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Record microphone audio to a WAV file
    Record {
        /// Output file
        output: PathBuf,
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
}

/// Conversation log selector
#[derive(Clone, Copy, ValueEnum)]
enum LogArg {
    /// Sentences the assistant heard
    Listen,
    /// Sentences the assistant spoke
    Speak,
}

impl From<LogArg> for LogKind {
    fn from(arg: LogArg) -> Self {
        match arg {
            LogArg::Listen => Self::Listen,
            LogArg::Speak => Self::Speak,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parlance=info",
        1 => "info,parlance=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AssistantConfig::load(cli.store, cli.language)?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Listen { language } => cmd_listen(config, language),
        Command::Speak {
            text,
            language,
            no_remember,
        } => cmd_speak(config, &text, language, no_remember),
        Command::Remember { keyword, value } => cmd_remember(&config, &keyword, value.as_deref()),
        Command::History { log } => cmd_history(&config, log),
        Command::Forget { log } => cmd_forget(&config, log),
        Command::Tables => cmd_tables(&config),
        Command::TestMic { duration } => test_mic(duration),
        Command::Record { output, seconds } => cmd_record(&output, seconds),
    }
}

/// Wires the microphone and the Google speech services into a session
fn build_assistant(
    config: AssistantConfig,
) -> anyhow::Result<Assistant<MicrophoneSource, GoogleTranscriber, GoogleSynthesizer>> {
    let audio = MicrophoneSource::new()?;
    let transcriber = GoogleTranscriber::new(config.stt_api_key.clone())?;
    let synthesizer = GoogleSynthesizer::new()?;
    Ok(Assistant::new(config, audio, transcriber, synthesizer)?)
}

/// Opens the session store without wiring any audio hardware
fn open_store(config: &AssistantConfig) -> anyhow::Result<SessionStore> {
    let backend = open_backend(config.backend, &config.store_path)?;
    Ok(SessionStore::open(backend, config.tables.clone())?)
}

/// Listen for one utterance and print the transcript
fn cmd_listen(config: AssistantConfig, language: Option<String>) -> anyhow::Result<()> {
    let mut assistant = build_assistant(config)?;

    println!("Calibrating for ambient noise...");
    assistant.calibrate()?;
    println!("Listening...");

    let result = match language {
        Some(lang) => assistant.listen_in(&lang),
        None => assistant.listen(),
    };

    match result {
        Ok(transcript) => println!("\"{transcript}\""),
        Err(Error::Recognition(e)) => println!("(nothing recognised: {e})"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Speak text aloud
fn cmd_speak(
    config: AssistantConfig,
    text: &str,
    language: Option<String>,
    no_remember: bool,
) -> anyhow::Result<()> {
    let mut assistant = build_assistant(config)?;
    assistant.speak_with(
        text,
        SpeakOptions {
            language,
            remember: !no_remember,
        },
    )?;
    Ok(())
}

/// Store a value under a keyword, or print what it holds
fn cmd_remember(
    config: &AssistantConfig,
    keyword: &str,
    value: Option<&str>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match value {
        Some(value) => {
            store.memorize(keyword, value)?;
            println!("Remembered {keyword} = {value}");
        }
        None => {
            let values = store.remember(keyword)?;
            if values.is_empty() {
                println!("Nothing remembered under \"{keyword}\"");
            }
            for value in values {
                println!("{value}");
            }
        }
    }

    Ok(())
}

/// Print conversation logs
fn cmd_history(config: &AssistantConfig, log: Option<LogArg>) -> anyhow::Result<()> {
    let store = open_store(config)?;

    match log {
        Some(arg) => print_log(&store, arg.into())?,
        None => {
            println!("Heard:");
            print_log(&store, LogKind::Listen)?;
            println!("\nSpoken:");
            print_log(&store, LogKind::Speak)?;
        }
    }

    Ok(())
}

fn print_log(store: &SessionStore, kind: LogKind) -> anyhow::Result<()> {
    let entries = store.all_log_entries(kind)?;
    if entries.is_empty() {
        println!("(empty)");
    }
    for entry in entries {
        println!("{entry}");
    }
    Ok(())
}

/// Clear a conversation log
fn cmd_forget(config: &AssistantConfig, log: LogArg) -> anyhow::Result<()> {
    let store = open_store(config)?;
    store.clear_log(log.into())?;

    match log {
        LogArg::Listen => println!("Cleared the listen log"),
        LogArg::Speak => println!("Cleared the speak log"),
    }

    Ok(())
}

/// List tables in the store
fn cmd_tables(config: &AssistantConfig) -> anyhow::Result<()> {
    let backend = open_backend(config.backend, &config.store_path)?;
    let tables = backend.list_tables()?;

    if tables.is_empty() {
        println!("(no tables)");
    }
    for table in tables {
        println!("{table}");
    }

    Ok(())
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut mic = MicrophoneSource::new()?;
    mic.start()?;

    let sample_rate = mic.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        std::thread::sleep(Duration::from_secs(1));

        let samples = mic.peek_buffer();
        let energy = rms_level(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        mic.clear_buffer();
    }

    mic.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Record microphone audio to a WAV file
fn cmd_record(output: &Path, seconds: u64) -> anyhow::Result<()> {
    println!("Recording for {seconds} seconds...");
    println!("Speak into your microphone!");

    let mut mic = MicrophoneSource::new()?;
    let clip = mic.record_for(Duration::from_secs(seconds))?;

    let wav = clip.to_wav_bytes()?;
    std::fs::write(output, wav)?;

    println!(
        "Wrote {} ({:.1}s at {} Hz)",
        output.display(),
        clip.duration_secs(),
        clip.sample_rate
    );

    Ok(())
}

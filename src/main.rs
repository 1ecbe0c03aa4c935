use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iris_assistant::config::file;
use iris_assistant::config::{AudioConfig, ConversationConfig};
use iris_assistant::conversation::Session;
use iris_assistant::voice::{
    AudioPlayback, CpalMicrophone, Cue, CueSet, EnergyWakeDetector, FRAME_SAMPLES, Microphone,
    PLAYBACK_SAMPLE_RATE, SAMPLE_RATE, Synthesizer, WakeWordDetector, rms_energy,
};
use iris_assistant::{Assistant, Config, assistant};

/// Iris - a wake-word gated voice assistant
#[derive(Parser)]
#[command(name = "iris", version, about)]
struct Cli {
    /// Config file (default: ~/.config/iris/config.toml)
    #[arg(short, long, env = "IRIS_CONFIG")]
    config: Option<PathBuf>,

    /// Number of conversation turns remembered
    #[arg(long)]
    history: Option<usize>,

    /// Directory holding cue MP3 files
    #[arg(long)]
    cues_dir: Option<PathBuf>,

    /// Rustpotter wake word model (needs the wake-word feature)
    #[arg(long)]
    wake_model: Option<PathBuf>,

    /// Speech-to-text provider ("whisper" or "deepgram")
    #[arg(long)]
    stt_provider: Option<String>,

    /// Text-to-speech provider ("google", "openai", or "elevenlabs")
    #[arg(long)]
    tts_provider: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    /// Flags expressed as the environment variables they override
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(history) = self.history {
            overrides.insert("IRIS_HISTORY_CAPACITY", history.to_string());
        }
        if let Some(dir) = &self.cues_dir {
            overrides.insert("IRIS_CUES_DIR", dir.display().to_string());
        }
        if let Some(model) = &self.wake_model {
            overrides.insert("IRIS_WAKE_MODEL", model.display().to_string());
        }
        if let Some(provider) = &self.stt_provider {
            overrides.insert("IRIS_STT_PROVIDER", provider.clone());
        }
        if let Some(provider) = &self.tts_provider {
            overrides.insert("IRIS_TTS_PROVIDER", provider.clone());
        }
        overrides
    }

    /// Lookup with CLI flags layered over the process environment
    fn env(&self) -> impl Fn(&str) -> Option<String> {
        let overrides = self.overrides();
        move |key: &str| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        }
    }

    fn load_config(&self) -> iris_assistant::Result<Config> {
        Config::load_with(self.config.as_deref(), self.env())
    }

    fn load_file(&self) -> file::IrisConfigFile {
        self.config
            .as_deref()
            .map_or_else(file::load_config_file, file::load_config_file_from)
    }
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Show microphone levels and wake detections
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Play a tone on the speakers
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Play every status cue
    TestCues,
    /// Print the prompt that would be sent for an utterance
    Prompt {
        /// What the user said
        utterance: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,iris_assistant=info",
        1 => "info,iris_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr; stdout carries the dialogue
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = &cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(&cli, *duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&cli, text).await,
            Command::TestCues => test_cues(&cli),
            Command::Prompt { utterance } => print_prompt(&cli, utterance),
        };
    }

    let config = cli.load_config()?;
    tracing::debug!(?config, "loaded configuration");

    let mut iris = Assistant::from_config(&config).await?;
    tracing::info!("iris ready");

    iris.run().await;

    Ok(())
}

/// Show per-second microphone levels and run the speech-burst wake detector
#[allow(clippy::future_not_send)]
async fn test_mic(cli: &Cli, duration: u64) -> anyhow::Result<()> {
    let audio = AudioConfig::resolve(cli.load_file().audio, cli.env());
    let threshold = audio.endpoint.energy_threshold;

    let mut microphone = CpalMicrophone::open(audio.endpoint)?;
    let mut detector = EnergyWakeDetector::new(threshold);

    println!(
        "Listening for {duration}s at {} Hz (speech threshold: RMS {threshold})",
        microphone.sample_rate()
    );
    println!("Pause, then say a short phrase; each phrase should wake the detector.\n");

    let frames_per_second = SAMPLE_RATE as usize / FRAME_SAMPLES;
    let mut wakes = 0_u32;

    for second in 1..=duration {
        let mut loudest = 0.0_f32;
        for _ in 0..frames_per_second {
            let frame = microphone.read_frame().await?;
            loudest = loudest.max(rms_energy(&frame));

            if detector.poll(&frame)? {
                wakes += 1;
                detector.reset();
            }
        }
        println!("[{second:2}s] {} wakes: {wakes}", level_meter(loudest, threshold));
    }

    if wakes == 0 {
        println!("\nNo wake. Speak louder or lower audio.energy_threshold in config.toml.");
    }

    Ok(())
}

/// Loudest frame `energy` as a bar, with `threshold` marked by `|`
fn level_meter(energy: f32, threshold: f32) -> String {
    const WIDTH: usize = 40;

    // Full scale is four times the threshold
    let mark = WIDTH / 4;
    let full_scale = (threshold * 4.0).max(f32::EPSILON);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((energy / full_scale) * WIDTH as f32).clamp(0.0, WIDTH as f32) as usize;
    let bar: String = (0..WIDTH)
        .map(|i| match i {
            _ if i == mark => '|',
            _ if i < filled => '#',
            _ => ' ',
        })
        .collect();

    format!("{energy:.4} [{bar}]")
}

/// Play the generated loading tone through the default output device
fn test_speaker() -> anyhow::Result<()> {
    let tone = CueSet::tones().get(Cue::Loading).to_vec();
    let millis = tone.len() * 1000 / PLAYBACK_SAMPLE_RATE as usize;
    println!("Playing a {millis}ms tone at {PLAYBACK_SAMPLE_RATE} Hz...");

    AudioPlayback::new()?.play_blocking(tone)?;

    println!("No sound? Check the default output device and its volume.");
    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(cli: &Cli, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = cli.load_config()?;
    let tts = assistant::build_synthesizer(&config)?;

    println!("Synthesizing speech with {:?}...", tts.provider());
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if let [a, b, c, d, ..] = mp3_data[..] {
        println!("First 4 bytes: {a:02x} {b:02x} {c:02x} {d:02x}");
    }

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Play every cue once
fn test_cues(cli: &Cli) -> anyhow::Result<()> {
    let audio = AudioConfig::resolve(cli.load_file().audio, cli.env());
    match &audio.cues_dir {
        Some(dir) => println!("Cue directory: {}", dir.display()),
        None => println!("No cue directory configured, using generated tones"),
    }

    let cues = CueSet::load(audio.cues_dir.as_deref());
    let mut playback = AudioPlayback::new()?;

    for cue in Cue::ALL {
        println!("{cue:?} ({})", cue.file_name());
        playback.play_blocking(cues.get(cue).to_vec())?;
        std::thread::sleep(Duration::from_millis(300));
    }

    Ok(())
}

/// Print the prompt for `utterance` against the seeded history
fn print_prompt(cli: &Cli, utterance: &str) -> anyhow::Result<()> {
    let conversation = ConversationConfig::resolve(cli.load_file().conversation, cli.env())?;
    let session = Session::new(conversation.history_capacity, conversation.template)?;

    println!("{}", session.prompt_for(utterance));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_meter_marks_threshold() {
        let quiet = level_meter(0.0, 0.03);
        assert_eq!(quiet, format!("0.0000 [{}|{}]", " ".repeat(10), " ".repeat(29)));

        let loud = level_meter(1.0, 0.03);
        assert_eq!(loud, format!("1.0000 [{}|{}]", "#".repeat(10), "#".repeat(29)));
    }

    #[test]
    fn test_level_meter_zero_threshold() {
        let meter = level_meter(0.5, 0.0);
        assert!(meter.starts_with("0.5000 ["));
        assert_eq!(meter.chars().filter(|&c| c == '|').count(), 1);
    }

    #[test]
    fn test_cli_flags_override_env() {
        let cli = Cli::parse_from(["iris", "--history", "3", "--tts-provider", "openai"]);
        let env = cli.env();

        assert_eq!(env("IRIS_HISTORY_CAPACITY").as_deref(), Some("3"));
        assert_eq!(env("IRIS_TTS_PROVIDER").as_deref(), Some("openai"));
    }
}

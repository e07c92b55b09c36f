use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use pivizion::config::file::data_dir;
use pivizion::vision::GoogleVision;
use pivizion::voice::{AudioPlayback, TextToSpeech};
use pivizion::{Config, ConfigPolicy, Platform, RunOptions, RunOutcome, Visualizer, Voice};

/// Pivizion - take a photo, describe it, say it out loud
#[derive(Parser)]
#[command(name = "pivizion", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/pivizion/config.toml)
    #[arg(long, env = "PIVIZION_CONFIG")]
    config: Option<PathBuf>,

    /// Test mode: capture only, skip analysis and speech
    #[arg(short, long)]
    test: bool,

    /// Write logs to a file instead of the console
    #[arg(short, long)]
    log: bool,

    /// Log file used with --log (defaults to ~/.local/share/pivizion/pivizion.log)
    #[arg(long, requires = "log")]
    log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Fall back to defaults when the config file cannot be parsed
    #[arg(long)]
    lenient_config: bool,

    /// Key for the vision and speech services
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test speaker output with a tone
    TestSpeaker,
    /// Speak the given text with the configured voice
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("failed to set up logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Set up logging based on verbosity, to the console or a log file
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "info",
            1 => "info,pivizion=debug",
            2 => "debug",
            _ => "trace",
        })
    });

    let Some(log_file) = log_destination(cli, data_dir())? else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(());
    };
    if let Some(dir) = log_file.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    tracing::info!(path = %log_file.display(), "logging to file");
    Ok(())
}

/// Where `--log` sends output: `--log-file`, else `pivizion.log` in `data_dir`
///
/// `None` means log to the console.
fn log_destination(cli: &Cli, data_dir: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    if !cli.log {
        return Ok(None);
    }

    match (&cli.log_file, data_dir) {
        (Some(path), _) => Ok(Some(path.clone())),
        (None, Some(dir)) => Ok(Some(dir.join("pivizion.log"))),
        (None, None) => anyhow::bail!("could not determine data directory"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let policy = if cli.lenient_config {
        ConfigPolicy::Lenient
    } else {
        ConfigPolicy::Strict
    };

    let config = Config::load_with_options(cli.config.as_deref(), cli.test, policy)?
        .with_api_key(cli.api_key);
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestSpeaker => test_speaker(),
            Command::Say { text } => say(&config, &text).await,
            Command::ShowConfig => {
                show_config(&config, cli.config.as_deref());
                Ok(())
            }
        };
    }

    let platform = Platform::detect();
    let camera = pivizion::camera::from_config(&config.camera, platform)?;

    let mut visualizer = Visualizer::new(camera, RunOptions::from(&config));
    if !config.test_mode {
        visualizer = visualizer.with_voice(build_voice(&config)?);
    }

    tracing::info!(?platform, test_mode = config.test_mode, "starting visualize run");

    match visualizer.visualize().await? {
        RunOutcome::Captured { image } => {
            tracing::info!(path = %image.display(), "capture complete");
        }
        RunOutcome::Spoken { text, .. } => {
            tracing::info!(text = %text.replace('\n', " / "), "run complete");
        }
    }

    Ok(())
}

/// Build the analysis, synthesis and playback components
fn build_voice(config: &Config) -> anyhow::Result<Voice> {
    Ok(Voice {
        analyzer: Box::new(GoogleVision::from_config(&config.api)?),
        synthesizer: Box::new(TextToSpeech::from_config(
            &config.api,
            std::env::temp_dir(),
        )?),
        sink: Box::new(AudioPlayback::new()?),
    })
}

/// Speak text through the configured voice
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Speaking: \"{text}\"");

    let voice = build_voice(config)?;
    let options = RunOptions::from(config);
    if let Some(path) = voice.speak(text, &options).await? {
        println!("Audio kept at {}", path.display());
    }

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;
    println!("Output device: {}", playback.device_name());

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2;
    let num_samples = sample_rate * duration_secs;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    playback.play_samples(samples, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: aplay -l (to list devices)");
    println!("  2. Run: raspi-config > System Options > Audio");
    println!("  3. Try: alsamixer (to check output levels)");

    Ok(())
}

/// Print the effective configuration
fn show_config(config: &Config, path: Option<&Path>) {
    let path = path
        .map(Path::to_path_buf)
        .or_else(pivizion::config::file::config_file_path);
    let key = if config.api.key.is_some() { "(set)" } else { "(not set)" };

    let path = path.map_or_else(|| "(none)".to_string(), |p| p.display().to_string());

    println!("config file:       {path}");
    println!("text_recognition:  {}", config.text_recognition);
    println!("label_recognition: {}", config.label_recognition);
    println!("voice_gender:      {}", config.voice_gender);
    println!("voice_lang:        {}", config.voice_language);
    println!("is_test:           {}", config.test_mode);
    println!("keep_audio:        {}", config.keep_audio);
    println!("camera:            {:?}", config.camera.kind);
    println!("platform:          {:?}", Platform::detect());
    println!("image_dir:         {}", config.camera.image_dir.display());
    println!("api_key:           {key}");
}

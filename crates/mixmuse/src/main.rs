//! mixmuse - music assistant command line
//!
//! Every subcommand prints exactly one line of JSON on stdout and exits 0,
//! whether it succeeded or not. Failures carry an `"error"` key. Logs go to
//! stderr.

use clap::{Parser, Subcommand};
use museconf::MuseConfig;
use std::path::PathBuf;

mod commands;
mod telemetry;

use commands::Session;

#[derive(Parser)]
#[command(name = "mixmuse")]
#[command(about = "Audio features, mix advice, local text generation and MIDI generation")]
#[command(version)]
struct Cli {
    /// Config file, used in place of ./mixmuse.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory generated MIDI files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Seed for the generation RNG (reproducible output)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tempo, key and mood for a JSON array of audio file paths
    Features {
        /// e.g. '["a.wav", "b.mp3"]'
        files: Option<String>,
    },

    /// Compare a mix against a reference track
    Mix {
        /// e.g. '{"refPath": "ref.wav", "myPath": "mine.wav"}'
        request: Option<String>,
    },

    /// Ask the local assistant model
    Ask { prompt: Option<String> },

    /// Greedy reply from the local model
    Reply { prompt: Option<String> },

    /// Generate a MIDI file
    Midi {
        #[command(subcommand)]
        variant: MidiVariant,
    },

    /// Learn a style from a MIDI library (`analyze`) or generate in it (`generate`)
    Style {
        command: Option<String>,
        argument: Option<String>,
    },

    /// Show the effective configuration and where it came from
    Config {
        /// Render the config as TOML inside the JSON output
        #[arg(long)]
        toml: bool,
    },
}

#[derive(Subcommand)]
enum MidiVariant {
    /// Thirty seconds from the melody model at temperature 1.0
    Basic { prompt: Option<String> },

    /// Melody plus chords, planned from keywords in the prompt
    Advanced { prompt: Option<String> },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let loaded = MuseConfig::load_with_sources_from(cli.config.as_deref());
    let log_level = match &loaded {
        Ok((config, _)) => config.telemetry.log_level.clone(),
        Err(_) => "warn".to_string(),
    };
    telemetry::init(&log_level);

    let output = match loaded {
        Ok((mut config, sources)) => {
            if let Some(dir) = cli.output_dir {
                config.paths.output_dir = dir;
            }
            let session = Session::new(config, cli.seed);
            run(cli.command, session, sources).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "configuration unusable");
            commands::error_json(e)
        }
    };

    println!("{output}");
}

async fn run(
    command: Commands,
    session: Session,
    sources: museconf::ConfigSources,
) -> serde_json::Value {
    tracing::debug!(output_dir = %session.config.paths.output_dir.display(), "session ready");
    match command {
        Commands::Features { files } => commands::features(files.as_deref()),
        Commands::Mix { request } => commands::mix(request.as_deref()),
        Commands::Ask { prompt } => commands::ask(&session, prompt.as_deref()).await,
        Commands::Reply { prompt } => commands::reply(&session, prompt.as_deref()).await,
        Commands::Midi { variant } => match variant {
            MidiVariant::Basic { prompt } => commands::midi_basic(&session, prompt.as_deref()),
            MidiVariant::Advanced { prompt } => {
                commands::midi_advanced(&session, prompt.as_deref())
            }
        },
        Commands::Style { command, argument } => {
            commands::style(&session, command.as_deref(), argument.as_deref())
        }
        Commands::Config { toml } => commands::show_config(&session, &sources, toml),
    }
}

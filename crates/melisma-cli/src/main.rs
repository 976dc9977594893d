//! Melisma CLI - sing text, train voices, manage jobs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use melisma_engine::{EngineConfig, SingingEngine};
use tracing_subscriber::EnvFilter;

mod commands;

/// Melisma - singing voice synthesis and conversion
#[derive(Parser)]
#[command(name = "melisma")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Root directory for voices, models, and job records
    #[arg(long, global = true, default_value = "./melisma-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render sung text to a WAV file
    Sing {
        /// Lyrics to sing
        #[arg(short, long)]
        text: String,

        /// Voice to sing with
        #[arg(long, default_value = "default")]
        voice: String,

        /// Comma-separated note names (C4,E4,G4); empty derives a melody
        #[arg(long, value_delimiter = ',')]
        notes: Vec<String>,

        /// Phrase length in seconds (default: estimated from syllables)
        #[arg(long)]
        duration: Option<f64>,

        /// Informational chord label, logged but not rendered
        #[arg(long)]
        chord: Option<String>,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        output: PathBuf,
    },

    /// Train a custom voice from WAV recordings
    Train {
        /// Name of the new voice
        #[arg(long)]
        name: String,

        /// Training WAV files
        files: Vec<PathBuf>,

        /// Directory to scan recursively for .wav files
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Poll the job with a progress line until it finishes
        #[arg(long)]
        wait: bool,
    },

    /// List registered voices
    Voices {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// List training jobs
    Jobs {
        /// Machine-readable JSON output
        #[arg(long)]
        json: bool,
    },

    /// Cancel a running training job
    Cancel {
        /// Job id as printed by `train`
        job_id: String,
    },

    /// Delete a custom voice and its files
    DeleteVoice {
        /// Voice id as printed by `voices`
        voice_id: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let engine = match SingingEngine::new(&EngineConfig::new(&cli.data_dir)) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Sing {
            text,
            voice,
            notes,
            duration,
            chord,
            output,
        } => commands::sing::run(&engine, &text, &voice, notes, duration, chord, &output),
        Commands::Train {
            name,
            files,
            dir,
            wait,
        } => commands::train::run(&engine, &name, files, dir.as_deref(), wait),
        Commands::Voices { json } => commands::voices::run(&engine, json),
        Commands::Jobs { json } => commands::jobs::run(&engine, json),
        Commands::Cancel { job_id } => commands::cancel::run(&engine, &job_id),
        Commands::DeleteVoice { voice_id } => commands::delete_voice::run(&engine, &voice_id),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

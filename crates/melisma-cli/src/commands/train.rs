//! Train command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use walkdir::WalkDir;

use melisma_engine::SingingEngine;
use melisma_voice::JobStatus;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(
    engine: &SingingEngine,
    name: &str,
    mut files: Vec<PathBuf>,
    dir: Option<&Path>,
    wait: bool,
) -> Result<ExitCode> {
    if let Some(dir) = dir {
        files.extend(collect_wavs(dir)?);
    }
    if files.is_empty() {
        bail!("no training files given (pass files or --dir)");
    }

    let handle = engine
        .train_voice(name, files)
        .context("starting training job")?;
    println!(
        "{} {} ({})",
        "Started".green().bold(),
        handle.job_id,
        name.cyan()
    );

    if !wait {
        println!("  follow with: melisma jobs");
        return Ok(ExitCode::SUCCESS);
    }

    loop {
        let Some(job) = engine.get_training_status(&handle.job_id)? else {
            bail!("job record vanished");
        };
        print!(
            "\r  {:>3}%  {}        ",
            job.progress,
            format!("{:?}", job.status).dimmed()
        );
        std::io::stdout().flush().ok();

        if job.is_terminal() {
            println!();
            return match job.status {
                JobStatus::Completed => {
                    let voice_id = job.voice_id.unwrap_or_default();
                    println!("{} voice id: {}", "Trained".green().bold(), voice_id.cyan());
                    Ok(ExitCode::SUCCESS)
                }
                JobStatus::Cancelled => {
                    println!("{}", "Cancelled".yellow().bold());
                    Ok(ExitCode::from(1))
                }
                _ => {
                    println!(
                        "{} {}",
                        "Failed:".red().bold(),
                        job.error.unwrap_or_else(|| "unknown error".into())
                    );
                    Ok(ExitCode::from(1))
                }
            };
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Recursively collects .wav files under a directory, sorted for
/// reproducible ingestion order.
fn collect_wavs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("scanning {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        {
            found.push(entry.into_path());
        }
    }
    found.sort();
    if found.is_empty() {
        bail!("no .wav files under {}", dir.display());
    }
    Ok(found)
}

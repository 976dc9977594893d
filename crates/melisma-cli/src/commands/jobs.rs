//! Jobs command implementation.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use melisma_engine::SingingEngine;
use melisma_voice::JobStatus;

pub fn run(engine: &SingingEngine, json: bool) -> Result<ExitCode> {
    let jobs = engine.list_jobs()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(ExitCode::SUCCESS);
    }

    if jobs.is_empty() {
        println!("no training jobs");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Training jobs".bold());
    for job in &jobs {
        let status = match job.status {
            JobStatus::Completed => format!("{:?}", job.status).green(),
            JobStatus::Failed => format!("{:?}", job.status).red(),
            JobStatus::Cancelled => format!("{:?}", job.status).yellow(),
            _ => format!("{:?}", job.status).cyan(),
        };
        println!(
            "  {:<18} {:<12} {:>3}%  {:<20} {}",
            job.job_id,
            status,
            job.progress,
            job.voice_name,
            job.voice_id.as_deref().unwrap_or("-").dimmed()
        );
        if let Some(error) = &job.error {
            println!("    {} {error}", "error:".red());
        }
    }
    Ok(ExitCode::SUCCESS)
}

//! Cancel command implementation.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use melisma_engine::SingingEngine;

pub fn run(engine: &SingingEngine, job_id: &str) -> Result<ExitCode> {
    if engine.cancel_training(job_id)? {
        println!("{} {job_id}", "Cancelling".yellow().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("job {job_id} is unknown or already finished");
        Ok(ExitCode::from(1))
    }
}

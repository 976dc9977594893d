//! Delete-voice command implementation.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use melisma_engine::SingingEngine;

pub fn run(engine: &SingingEngine, voice_id: &str) -> Result<ExitCode> {
    if engine.delete_voice(voice_id)? {
        println!("{} {voice_id}", "Deleted".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("voice {voice_id} not found");
        Ok(ExitCode::from(1))
    }
}

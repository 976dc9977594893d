//! Voices command implementation.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use melisma_engine::SingingEngine;

pub fn run(engine: &SingingEngine, json: bool) -> Result<ExitCode> {
    let voices = engine.list_voices()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&voices)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Voices".bold());
    for voice in &voices {
        let kind = if voice.is_builtin() {
            "builtin".dimmed()
        } else {
            "custom".cyan()
        };
        println!(
            "  {:<28} {:<8} {:>7.1} Hz  {}",
            voice.voice_id.as_str().green(),
            kind,
            voice.characteristics.fundamental_hz,
            voice.name
        );
    }
    Ok(ExitCode::SUCCESS)
}

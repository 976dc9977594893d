//! Sing command implementation.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use std::process::ExitCode;

use melisma_engine::SingingEngine;
use melisma_voice::SingingRequest;

pub fn run(
    engine: &SingingEngine,
    text: &str,
    voice: &str,
    notes: Vec<String>,
    duration: Option<f64>,
    chord: Option<String>,
    output: &Path,
) -> Result<ExitCode> {
    let start = Instant::now();

    let request = SingingRequest {
        text: text.to_string(),
        voice_id: voice.to_string(),
        notes,
        duration_seconds: duration,
        chord,
    };
    let song = engine.synthesize(&request).context("synthesis failed")?;

    fs::write(output, &song.wav.wav_data)
        .with_context(|| format!("writing {}", output.display()))?;

    let peak = song.samples.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    println!(
        "{} {} ({})",
        "Wrote".green().bold(),
        output.display(),
        format!("{:.2}s @ {} Hz", song.duration_seconds, song.sample_rate).dimmed()
    );
    println!(
        "  tier: {}  peak: {:.3}  elapsed: {:.2}s",
        song.tier.to_string().cyan(),
        peak,
        start.elapsed().as_secs_f64()
    );

    println!("  {}", "segments:".bold());
    for segment in &song.segments {
        println!(
            "    {:>6.2}s  {:>7.2} Hz  {:<12} {}",
            segment.start_seconds,
            segment.frequency_hz,
            format!("{:?}", segment.position).dimmed(),
            segment.text
        );
    }
    Ok(ExitCode::SUCCESS)
}

mod args;

use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::Args;
use podcastgen::{ConversationPipeline, PipelineOptions, Settings, VoiceTable, default_output_path};

fn read_source_text(args: &Args) -> anyhow::Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.input {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()));
    }
    info!("Reading source text from stdin");
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    Ok(text)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting podcast conversation pipeline");

    let settings = Settings::from_env()?.with_timeout(Duration::from_secs(args.timeout_secs));
    let voices = VoiceTable::new(
        &args.host_a,
        &args.host_a_voice,
        &args.host_b,
        &args.host_b_voice,
    )?;
    info!(
        "Hosts: {} ({}) and {} ({})",
        voices.inquisitive().name,
        voices.inquisitive().voice,
        voices.expert().name,
        voices.expert().voice
    );

    let options = PipelineOptions {
        silence_ms: args.silence_ms,
        synthesis_workers: args.workers,
        request_delay: Duration::from_millis(args.request_delay_ms),
        temp_root: args.temp_dir.clone(),
    };
    let pipeline = ConversationPipeline::from_settings(&settings, voices, options)?;

    let text = read_source_text(&args)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&args.output_dir, &text));

    let result = pipeline.run(&text, &out).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(path) = &result.output_path {
        println!("{}: {}", result.message, path.display());
    } else {
        println!("Error: {}", result.message);
    }

    if !result.success {
        error!("Podcast generation failed");
        std::process::exit(1);
    }
    info!("Process complete.");
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;

/// Turn a block of text into a two-host podcast WAV.
#[derive(Parser, Debug)]
pub struct Args {
    /// Text to convert. Falls back to --input, then stdin.
    #[clap(long, conflicts_with = "input")]
    pub text: Option<String>,

    /// File to read the source text from.
    #[clap(long)]
    pub input: Option<PathBuf>,

    /// Output WAV path. Defaults to a name derived from the text inside --output-dir.
    #[clap(long)]
    pub out: Option<PathBuf>,

    #[clap(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[clap(long, default_value = "temp")]
    pub temp_dir: PathBuf,

    #[clap(long, default_value_t = 500)]
    pub silence_ms: u32,

    /// Concurrent speech requests; 1 keeps them sequential.
    #[clap(long, default_value_t = 1)]
    pub workers: usize,

    #[clap(long, default_value_t = 100)]
    pub request_delay_ms: u64,

    #[clap(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[clap(long, default_value = "Alex")]
    pub host_a: String,

    #[clap(long, default_value = "en-US-GuyNeural")]
    pub host_a_voice: String,

    #[clap(long, default_value = "Sarah")]
    pub host_b: String,

    #[clap(long, default_value = "en-US-JennyNeural")]
    pub host_b_voice: String,

    /// Print the result as JSON instead of plain text.
    #[clap(long)]
    pub json: bool,
}

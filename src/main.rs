use anyhow::{Context, Result};
use clap::Parser;
use soundbank_ripper::extract::{EntropyConfig, SignatureConfig};
use soundbank_ripper::{BatchConfig, BatchPipeline, ExternalDecoder};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "soundbank-ripper")]
#[command(about = "Extract and convert embedded audio from sound bank containers", long_about = None)]
struct Args {
    /// Directory searched recursively for containers
    #[arg(short = 'i', long, default_value = "input")]
    input: String,

    /// Output directory for waveforms and leftover raw sub-streams
    #[arg(short = 'o', long, default_value = "output")]
    output: String,

    /// Container tool (QuickBMS) tried before the built-in strategies
    #[arg(short = 'q', long)]
    quickbms: Option<String>,

    /// Waveform decoder executable
    #[arg(short = 'v', long, default_value = "vgmstream-cli")]
    vgmstream: String,

    /// Only extract raw sub-streams
    #[arg(long)]
    no_convert: bool,

    /// Keep raw sub-streams after successful conversion
    #[arg(short = 'k', long)]
    keep_wem: bool,

    /// Prefix for every output file name
    #[arg(short = 'p', long, default_value = "")]
    prefix: String,

    /// Worker threads (0 = one per core)
    #[arg(short = 'w', long, default_value = "0")]
    workers: usize,

    /// Skip index and marker parsing, classify by entropy only
    #[arg(long)]
    heuristic_only: bool,

    /// Timeout for each external tool run, in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,

    /// Container file extension
    #[arg(long, default_value = "wsb")]
    extension: String,

    /// Error ledger path
    #[arg(long, default_value = "extraction_errors.log")]
    ledger: String,

    /// Write the final report as JSON
    #[arg(long)]
    summary_json: Option<String>,

    /// Entropy window size in bytes
    #[arg(long, default_value = "65536")]
    window_size: usize,

    /// Lower entropy bound (bits per byte)
    #[arg(long, default_value = "5.5")]
    min_entropy: f64,

    /// Upper entropy bound (bits per byte)
    #[arg(long, default_value = "7.99")]
    max_entropy: f64,

    /// Only carve RIFF chunks of an audio form (WAVE, XWMA, OggS)
    #[arg(long)]
    riff_audio_only: bool,

    /// Verbose logging
    #[arg(long)]
    verbose: bool,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("Soundbank Ripper");
    log::info!("===========================================");

    let timeout = Duration::from_secs(args.timeout);
    let defaults = EntropyConfig::default();
    let entropy = EntropyConfig {
        window_size: args.window_size,
        min_window: defaults.min_window.min(args.window_size),
        min_entropy: args.min_entropy,
        max_entropy: args.max_entropy,
        ..defaults
    };

    let mut config = BatchConfig::new(expand(&args.input), expand(&args.output))
        .with_extension(args.extension)
        .with_ledger(expand(&args.ledger))
        .with_workers(args.workers)
        .with_prefix(args.prefix)
        .with_keep_raw(args.keep_wem)
        .with_heuristic_only(args.heuristic_only)
        .with_conversion(!args.no_convert)
        .with_entropy(entropy)
        .with_signature(SignatureConfig {
            riff_audio_only: args.riff_audio_only,
            ..SignatureConfig::default()
        });

    if let Some(tool) = &args.quickbms {
        log::info!("Container tool: {}", tool);
        config = config.with_container_tool(expand(tool), timeout);
    }

    let decoder = ExternalDecoder::new(expand(&args.vgmstream)).with_timeout(timeout);
    let pipeline = BatchPipeline::new(config, decoder)?;
    let report = pipeline.run()?;

    report.log_summary();

    if let Some(path) = &args.summary_json {
        let path = expand(path);
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        fs::write(&path, json).with_context(|| format!("Failed to write summary: {:?}", path))?;
        log::info!("Summary written to {:?}", path);
    }

    log::info!("Done. Output in {:?}", pipeline.config().output_dir);
    Ok(())
}

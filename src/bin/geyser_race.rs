//! Geyser node race benchmark
//!
//! Usage:
//!   cargo run --release --bin geyser_race -- [--config config.json] [--json]
//!
//! Environment variables:
//!   X_TOKEN - auth token sent to every node (optional)
//!   COMMITMENT_LEVEL - processed | confirmed | finalized (default: processed)
//!   DETECTION_CHANNEL_BUFFER - observation channel size (default: 10000)
//!   CONNECT_TIMEOUT_SECS - per-node connect timeout (default: 10)

use dotenv::dotenv;
use geyser_race::{
    streamer_core::{build_subscribe_request, GeyserUpdateSource, RuntimeConfig},
    Benchmark, BenchmarkConfig, BenchmarkReport, CliArgs, Progress,
};
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        log::error!("❌ {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let runtime_config = RuntimeConfig::from_env();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&runtime_config.rust_log),
    )
    .target(env_logger::Target::Stderr)
    .init();

    // NOTE: Workaround for rustls issue
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::warn!("A rustls crypto provider was already installed");
    }

    let args = CliArgs::from_env_args()?;
    let config = BenchmarkConfig::load(&args.config_path)?;

    log::info!("🚀 Starting Geyser race benchmark");
    log::info!("📊 Configuration:");
    log::info!("   Config file: {}", args.config_path.display());
    for (idx, node) in config.nodes.iter().enumerate() {
        log::info!("     {}. {}", idx + 1, node);
    }
    log::info!("   Duration: {}s", config.benchmark_duration);
    log::info!("   Detection address: {}", config.detection_address);
    log::info!("   Commitment: {:?}", runtime_config.commitment_level);

    let request = build_subscribe_request(&config.detection_address, &runtime_config);
    let updates = Arc::new(GeyserUpdateSource::new(&runtime_config));
    let benchmark = Benchmark::new(&config, request, updates, runtime_config.channel_buffer);

    println!(
        "Starting benchmark, duration {} seconds...",
        config.benchmark_duration
    );

    let board = benchmark
        .run(|progress: Progress| {
            print!(
                "\rTime left: {}s, {} transactions detected",
                progress.remaining_secs, progress.detected
            );
            let _ = std::io::stdout().flush();
        })
        .await?;

    println!("\rBenchmark completed, calculating results...");

    let report = BenchmarkReport::from_scoreboard(&board);

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    Ok(())
}

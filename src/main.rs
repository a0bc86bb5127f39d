//! Jitter Entropy CLI
//!
//! Command-line interface for testing and demonstrating the jitter
//! entropy collection system.

use clap::Parser;
use jitter_entropy::{CollectorConfig, FileConfig, JitterCollector, SEED_BITS};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "jitter-entropy", version, about = "Prefetching jitter entropy demo")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of standard-size requests to issue.
    #[arg(short = 'n', long, default_value_t = 16)]
    requests: u32,

    /// Keep harvesting until interrupted.
    #[arg(long)]
    continuous: bool,

    /// Disable background prefetching for this run.
    #[arg(long)]
    no_async: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(file) => file.collector,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => CollectorConfig::default(),
    };
    if cli.no_async {
        config.async_enabled = false;
    }

    info!("Jitter Entropy Collector v{}", jitter_entropy::VERSION);

    let collector = match JitterCollector::with_reseed_hook(config, || {
        info!("Consumer notified: full reseed justified");
    }) {
        Ok(collector) => collector,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = collector.init() {
        eprintln!("Failed to initialize jitter noise source: {}", e);
        std::process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    if cli.continuous {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            warn!("Failed to install signal handler: {}", e);
        }
    }

    info!("Issuing standard-size entropy requests...");

    let mut issued = 0u32;
    let mut credited_total = 0u64;
    let mut last_batch = None;

    while running.load(Ordering::SeqCst) && (cli.continuous || issued < cli.requests) {
        let batch = collector.get_entropy(SEED_BITS);
        issued += 1;
        credited_total += u64::from(batch.credited_bits());
        info!(
            "Request {}: {} bytes, {} bits credited",
            issued,
            batch.data().len(),
            batch.credited_bits()
        );
        last_batch = Some(batch);

        if cli.continuous {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
    }

    if let Some(batch) = &last_batch {
        println!(
            "Last batch: {}",
            batch
                .data()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>()
        );
    }

    println!("{}", collector.status());
    info!(
        "Issued {} requests, {} total bits credited",
        issued, credited_total
    );
}

//! Zigsentry - passive Zigbee capture analysis
//!
//! Consumes a stream of decoded attribute records (offline JSONL or a live
//! feed), maintains the device knowledge base and emits detection events
//! and periodic snapshots.

mod logic;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser};

use logic::config::EngineConfig;
use logic::error::{EngineError, EngineResult};
use logic::location::NoLocation;
use logic::pipeline::Engine;
use logic::reporter;
use logic::store::DeviceStore;

#[derive(Parser, Debug)]
#[command(
    name = "zigsentry",
    version,
    about = "Passive Zigbee capture analysis - device knowledge base & state-change detection"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["records", "live"])))]
struct Cli {
    /// Process a JSONL attribute-record stream dissected from a pcap
    #[arg(short, long, value_name = "FILE")]
    records: Option<PathBuf>,

    /// Consume the live record feed configured in the config file
    #[arg(short, long)]
    live: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, default_value = "zigsentry_config.json")]
    config: PathBuf,

    /// Override the configured work directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the configured capture channel (11-26)
    #[arg(long)]
    channel: Option<i64>,

    /// Attach best-effort GPS coordinates to device observations
    #[arg(short, long)]
    gps: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> EngineResult<()> {
    let mut config = EngineConfig::load(&cli.config)?;
    if let Some(output) = cli.output {
        config.work_dir = output;
    }
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    if cli.gps {
        config.gps_enabled = true;
    }
    if !(11..=26).contains(&config.channel) {
        return Err(EngineError::Config(format!(
            "channel {} outside 11-26",
            config.channel
        )));
    }
    std::fs::create_dir_all(&config.work_dir)?;

    log::info!(
        "starting zigsentry v{} (channel {}, work dir {})",
        env!("CARGO_PKG_VERSION"),
        config.channel,
        config.work_dir.display()
    );

    let store = Arc::new(DeviceStore::open(&config.work_dir.join("devices.db"))?);
    reporter::start(
        Arc::clone(&store),
        config.work_dir.clone(),
        config.report_period_secs,
    );

    let (reader, capture_source, live): (Box<dyn BufRead>, String, bool) =
        if let Some(path) = &cli.records {
            log::info!("offline processing of {}", path.display());
            (
                Box::new(BufReader::new(File::open(path)?)),
                path.display().to_string(),
                false,
            )
        } else {
            log::info!("live capture: reading records from {}", config.feed_path.display());
            let feed = File::open(&config.feed_path)?;
            (Box::new(BufReader::new(feed)), "live".to_string(), true)
        };

    let engine = Engine::new(config, Arc::clone(&store), Box::new(NoLocation), &capture_source, live);
    let stats = engine.run(reader)?;

    log::info!(
        "ingestion finished: {} records, {} events emitted, {} lines skipped, {} devices known",
        stats.records,
        stats.events,
        stats.skipped,
        store.device_count()?
    );
    Ok(())
}

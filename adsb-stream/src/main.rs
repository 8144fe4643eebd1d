//! adsb-stream: decode a live ADS-B frame feed and publish aircraft state.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use adsb_core::config::{self, Config};
use adsb_core::*;

mod archive;
mod feed;
mod publisher;

use archive::JsonLinesArchive;
use publisher::Publisher;

#[derive(Parser)]
#[command(name = "adsb-stream", version, about = "ADS-B feed decoder and publisher")]
struct Cli {
    /// Config file (default: ~/.adsb-stream/config.json)
    #[arg(short, long, global = true, env = "ADSB_STREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a feed and print published packets as JSON lines
    Stream {
        /// Feed host, overrides source.host
        #[arg(long)]
        host: Option<String>,

        /// Feed port, overrides source.port
        #[arg(long)]
        port: Option<u16>,

        /// Append accepted messages to this JSON-lines file
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Decode a file of `*<hex>;` frames and print an aircraft table
    Decode {
        /// Path to frame file, or `-` for stdin
        file: PathBuf,

        /// Print final packets as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Re-decode archived messages within a time window
    Query {
        /// JSON-lines archive written by `stream --archive`
        archive: PathBuf,

        /// Earliest timestamp (ms since epoch, inclusive)
        #[arg(long)]
        start: Option<u64>,

        /// Latest timestamp (ms since epoch, inclusive)
        #[arg(long)]
        end: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load(cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Stream {
            host,
            port,
            archive,
        } => cmd_stream(config, host, port, archive).await,
        Commands::Decode { file, json } => cmd_decode(&config, file, json),
        Commands::Query {
            archive,
            start,
            end,
        } => cmd_query(&config, archive, start, end),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(config::config_file);
    let config = config::load_config(&path)?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

async fn cmd_stream(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    archive: Option<PathBuf>,
) -> Result<()> {
    if let Some(host) = host {
        config.source.host = host;
    }
    if let Some(port) = port {
        config.source.port = port;
    }
    if archive.is_some() {
        config.archive.path = archive;
    }

    let mut pipeline = Pipeline::from_config(&config, StateStore::new());
    if let Some(path) = &config.archive.path {
        pipeline = pipeline.with_sink(Box::new(JsonLinesArchive::open(path)?));
        info!(path = %path.display(), "archiving accepted messages");
    }

    info!(
        address = %config.source.address(),
        receiver = %config.receiver.name,
        "connecting"
    );
    let stream = feed::connect(&config.source)?;
    let feed = feed::spawn(stream, pipeline, Arc::new(SystemClock))?;

    let closer = feed.closer();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, closing feed");
            closer.close();
        }
    });

    let publisher = Publisher::new(feed.store().clone(), &config.publisher);
    let mut subscriber = publisher.subscribe();
    while let Some(packet) = subscriber.next().await {
        match serde_json::to_string(&packet) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "packet serialization failed"),
        }
    }

    let stats = tokio::task::spawn_blocking(move || feed.join())
        .await
        .map_err(|e| AdsbError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))??;
    info!(%stats, "feed finished");
    Ok(())
}

fn cmd_decode(config: &Config, file: PathBuf, json: bool) -> Result<()> {
    let mut reader: Box<dyn Read> = if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = File::open(&file)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", file.display())))?;
        Box::new(BufReader::new(f))
    };

    let store = StateStore::new();
    let mut pipeline = Pipeline::from_config(config, store.clone());
    let stats = pipeline.run(&mut reader, &SystemClock)?;
    let aircraft = store.all();

    if json {
        for ac in &aircraft {
            println!("{}", serde_json::to_string(&ac.packet())?);
        }
    } else {
        print_summary(&aircraft, &stats);
    }
    Ok(())
}

fn cmd_query(config: &Config, archive: PathBuf, start: Option<u64>, end: Option<u64>) -> Result<()> {
    let records = archive::read_records(&archive, start, end)?;
    let mut pipeline = Pipeline::from_config(config, StateStore::new());

    for record in &records {
        let msg = match DecodedMessage::from_hex(&record.message) {
            Ok(m) => m,
            Err(e) => {
                warn!(timestamp = record.timestamp, error = %e, "skipping archived message");
                continue;
            }
        };
        match pipeline.process_message(&msg, record.timestamp) {
            Ok(Outcome::Published(packet)) => println!("{}", serde_json::to_string(&packet)?),
            Ok(Outcome::Ignored { .. }) => {}
            Err(e) => debug!(message = %record.message, error = %e, "archived message dropped"),
        }
    }

    info!(records = records.len(), stats = %pipeline.stats(), "query complete");
    Ok(())
}

fn print_summary(aircraft: &[AircraftState], stats: &PipelineStats) {
    println!();
    println!(
        "Frames: {} parsed, {} decoded, {} positions, {} aircraft",
        stats.frames,
        stats.decoded,
        stats.positions,
        aircraft.len()
    );
    println!();

    if aircraft.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO", "Callsign", "Squawk", "Alt (ft)", "Speed (kts)", "Hdg", "VRate", "Lat", "Lon",
        "Msgs",
    ]);

    let mut sorted: Vec<&AircraftState> = aircraft.iter().collect();
    sorted.sort_by_key(|a| std::cmp::Reverse(a.message_count));

    for ac in sorted {
        table.add_row(vec![
            Cell::new(icao_to_string(&ac.icao)),
            Cell::new(ac.callsign.as_deref().unwrap_or("-")),
            Cell::new(ac.squawk.as_deref().unwrap_or("-")),
            Cell::new(dash(ac.altitude_ft.map(|a| a.to_string()))),
            Cell::new(dash(ac.speed_kts.map(|s| format!("{s:.0}")))),
            Cell::new(dash(ac.heading_deg.map(|h| format!("{h:.1}")))),
            Cell::new(dash(ac.vertical_rate_fpm.map(|v| format!("{v:+}")))),
            Cell::new(dash(ac.lat.map(|l| format!("{l:.4}")))),
            Cell::new(dash(ac.lon.map(|l| format!("{l:.4}")))),
            Cell::new(ac.message_count),
        ]);
    }

    println!("{table}");
}

fn dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".into())
}

use chrono::{DateTime, Utc};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use staybook::config::BookingConfig;
use staybook::domain::ports::BookingStoreRef;
use staybook::infrastructure::in_memory::InMemoryBookingStore;
#[cfg(feature = "storage-rocksdb")]
use staybook::infrastructure::rocksdb::RocksDBStore;
use staybook::interfaces::csv::booking_writer::BookingWriter;
use staybook::interfaces::csv::command_reader::CommandReader;
use staybook::interfaces::script::ScriptRunner;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input command script (CSV)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Minutes a pending booking holds its room
    #[arg(long, env = "STAYBOOK_HOLD_MINUTES", value_parser = clap::value_parser!(i64).range(1..))]
    hold_minutes: Option<i64>,

    /// Hours before arrival after which guests can no longer cancel
    #[arg(long, env = "STAYBOOK_CANCELLATION_CUTOFF_HOURS", value_parser = clap::value_parser!(i64).range(0..))]
    cutoff_hours: Option<i64>,

    /// Currency code sent to the payment gateway
    #[arg(long, env = "STAYBOOK_CURRENCY")]
    currency: Option<String>,

    /// Script clock start (RFC 3339). Defaults to the current time.
    #[arg(long)]
    start: Option<DateTime<Utc>>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("staybook=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<BookingStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryBookingStore::new()))
        }
        None => Ok(Arc::new(InMemoryBookingStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = BookingConfig::from_env();
    if let Some(minutes) = cli.hold_minutes {
        config.hold_minutes = minutes;
    }
    if let Some(hours) = cli.cutoff_hours {
        config.cancellation_cutoff_hours = hours;
    }
    if let Some(currency) = cli.currency {
        config.currency = currency;
    }

    let store = open_store(cli.db_path)?;
    let runner = ScriptRunner::new(&config, store, cli.start.unwrap_or_else(Utc::now));

    // Process commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for cmd_result in reader.commands() {
        match cmd_result {
            Ok(cmd) => {
                if let Err(e) = runner.execute(cmd).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let bookings = runner.bookings().await.into_diagnostic()?;

    // Output final state
    let stdout = io::stdout();
    let mut writer = BookingWriter::new(stdout.lock());
    writer.write_bookings(&bookings).into_diagnostic()?;

    Ok(())
}

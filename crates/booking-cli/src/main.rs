//! `booking` CLI: list slots and commit bookings against a JSON store snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Bookable starts for one day (provider-local date)
//! booking --store store.json slots --provider studio --appointment-type cut --date 2030-03-18
//!
//! # Book a slot; the snapshot file is updated in place
//! booking --store store.json book --provider studio --appointment-type cut \
//!   --start 2030-03-18T09:00:00Z --name "Ada Lovelace" --email ada@example.com
//!
//! # Move or cancel a booking
//! booking --store store.json reschedule --provider studio --booking <id> --start 2030-03-18T11:00:00Z
//! booking --store store.json cancel --provider studio --booking <id>
//!
//! # Engine tunables from a JSON file
//! booking --store store.json --config engine.json slots ...
//! ```
//!
//! Results go to stdout as JSON, logs to stderr. Exit status is 0 on success,
//! 2 when a booking is rejected by a conflict, and 1 for any other error.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use booking_engine::{
    tz, BookingEngine, BookingError, Customer, EngineConfig, InMemoryStore, StoreSnapshot,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "booking",
    version,
    about = "Slot availability and conflict-checked bookings over a JSON store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store snapshot (JSON)
    #[arg(long, global = true, env = "BOOKING_STORE", default_value = "store.json")]
    store: String,

    /// Write the updated snapshot here instead of back to --store
    #[arg(long, global = true)]
    output: Option<String>,

    /// Engine configuration (JSON)
    #[arg(long, global = true, env = "BOOKING_CONFIG")]
    config: Option<String>,

    /// Accept starts in the past (overrides the config file)
    #[arg(long, global = true)]
    allow_past: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookable starts for one provider-local day
    Slots {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        appointment_type: String,
        /// YYYY-MM-DD in the provider's timezone
        #[arg(long)]
        date: String,
    },
    /// Commit a booking
    Book {
        #[arg(long)]
        provider: String,
        /// Omit for an internal booking
        #[arg(long)]
        appointment_type: Option<String>,
        /// RFC 3339 instant
        #[arg(long)]
        start: String,
        /// Internal bookings only
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Move a booking to a new start
    Reschedule {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        booking: String,
        /// RFC 3339 instant
        #[arg(long)]
        start: String,
    },
    /// Cancel a booking
    Cancel {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        booking: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let conflict = err
                .downcast_ref::<BookingError>()
                .is_some_and(BookingError::is_conflict);
            if conflict {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.allow_past {
        config.allow_past_bookings = true;
    }

    let snapshot = read_snapshot(&cli.store)?;
    let store = Arc::new(InMemoryStore::from_snapshot(snapshot));
    let engine = BookingEngine::new(Arc::clone(&store), config);
    let output = cli.output.as_deref().unwrap_or(&cli.store);

    match cli.command {
        Commands::Slots {
            provider,
            appointment_type,
            date,
        } => {
            let slots = engine
                .available_slots_on(&provider, &appointment_type, &date)
                .await?;
            let starts: Vec<String> = slots.iter().map(|s| s.to_rfc3339()).collect();
            print_json(&json!({
                "provider": provider,
                "appointment_type": appointment_type,
                "date": date,
                "slots": starts,
            }))?;
        }
        Commands::Book {
            provider,
            appointment_type,
            start,
            duration,
            name,
            email,
        } => {
            let start = tz::parse_instant(&start)?;
            let customer = Customer::new(name, email);
            let booking = match appointment_type {
                Some(t) => engine.book(&provider, &t, start, &customer).await?,
                None => {
                    engine
                        .book_internal(&provider, start, duration, &customer)
                        .await?
                }
            };
            write_snapshot(output, &store.snapshot()?)?;
            print_json(&serde_json::to_value(&booking)?)?;
        }
        Commands::Reschedule {
            provider,
            booking,
            start,
        } => {
            let start = tz::parse_instant(&start)?;
            let booking = engine.reschedule(&provider, &booking, start).await?;
            write_snapshot(output, &store.snapshot()?)?;
            print_json(&serde_json::to_value(&booking)?)?;
        }
        Commands::Cancel { provider, booking } => {
            let booking = engine.cancel(&provider, &booking).await?;
            write_snapshot(output, &store.snapshot()?)?;
            print_json(&serde_json::to_value(&booking)?)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid config JSON: {}", path))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn read_snapshot(path: &str) -> Result<StoreSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read store: {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid store JSON: {}", path))
}

fn write_snapshot(path: &str, snapshot: &StoreSnapshot) -> Result<()> {
    let pretty = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, pretty).with_context(|| format!("Failed to write store: {}", path))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! `booking` CLI: compute free slots, expand session series and book
//! appointments against a JSON store snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Free slots for one day
//! booking slots --store store.json --date 2025-01-06 --appointment-type <UUID>
//!
//! # First free slot on or after a date
//! booking next --store store.json --date 2025-01-04 --appointment-type <UUID>
//!
//! # Expand a template into its weekly instances
//! booking expand --template session.json --recurrence weekly --until 2025-03-31
//!
//! # Book a slot (the snapshot file is not rewritten)
//! booking book --store store.json --appointment-type <UUID> --staff <UUID> \
//!     --start 2025-01-06T09:30:00Z
//!
//! # Engine settings from a TOML file, debug logs on stderr
//! booking --config engine.toml -vv slots ...
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use booking_engine::model::{BookingRequest, RecurrenceType, SessionTemplate, SlotRequest};
use booking_engine::store::records::SessionRow;
use booking_engine::{
    expand_recurrence, BookingService, EngineConfig, InMemoryStore, LogNotifier,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "booking", version, about = "Appointment availability and session recurrence")]
struct Cli {
    /// Engine settings (TOML); `BOOKING_*` environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the slots of one day with their availability
    Slots {
        /// JSON store snapshot
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        appointment_type: Uuid,
        #[arg(long)]
        doctor: Option<Uuid>,
        #[arg(long)]
        location: Option<Uuid>,
        /// Only print slots that can still be booked
        #[arg(long)]
        available_only: bool,
    },
    /// Find the first available slot on or after a date
    Next {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        appointment_type: Uuid,
        #[arg(long)]
        doctor: Option<Uuid>,
        #[arg(long)]
        location: Option<Uuid>,
    },
    /// Expand a session template into its recurring instances
    Expand {
        /// Session template as a JSON row
        #[arg(long)]
        template: PathBuf,
        /// Override the template's recurrence type
        #[arg(long)]
        recurrence: Option<RecurrenceType>,
        /// Override the template's series end date (inclusive)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Store snapshot to persist into (an empty store if omitted)
        #[arg(long, requires = "persist")]
        store: Option<PathBuf>,
        /// Write the instances and staff links through the store
        #[arg(long)]
        persist: bool,
    },
    /// Book an appointment at an exact slot start
    Book {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        appointment_type: Uuid,
        #[arg(long)]
        staff: Uuid,
        /// Slot start, RFC 3339
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        patient: Option<Uuid>,
        #[arg(long)]
        location: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load engine config")?;

    match cli.command {
        Commands::Slots {
            store,
            date,
            appointment_type,
            doctor,
            location,
            available_only,
        } => {
            let service = open_service(&store, config)?;
            let request = SlotRequest {
                date,
                appointment_type_id: appointment_type,
                doctor_id: doctor,
                location_id: location,
            };
            let mut slots = service
                .available_slots(&request)
                .await
                .with_context(|| format!("Failed to compute slots for {date}"))?;
            if available_only {
                slots.retain(|s| s.available);
            }
            print_json(&slots)?;
        }
        Commands::Next {
            store,
            date,
            appointment_type,
            doctor,
            location,
        } => {
            let service = open_service(&store, config)?;
            let request = SlotRequest {
                date,
                appointment_type_id: appointment_type,
                doctor_id: doctor,
                location_id: location,
            };
            let slot = service
                .next_available_slot(&request)
                .await
                .with_context(|| format!("Failed to search slots from {date}"))?;
            print_json(&slot)?;
        }
        Commands::Expand {
            template,
            recurrence,
            until,
            store,
            persist,
        } => {
            let mut template = read_template(&template)?;
            if let Some(recurrence) = recurrence {
                template.recurrence_type = recurrence;
            }
            if until.is_some() {
                template.recurrence_end_date = until;
            }

            let instances = if persist {
                let store = match store {
                    Some(path) => load_store(&path)?,
                    None => InMemoryStore::new(),
                };
                let service = BookingService::new(Arc::new(store), Arc::new(LogNotifier), config)
                    .context("Invalid engine config")?;
                service
                    .create_recurring_series(&template)
                    .await
                    .context("Failed to create session series")?
            } else {
                let options = config.expansion_options().context("Invalid engine config")?;
                expand_recurrence(
                    &template,
                    template.recurrence_type,
                    template.recurrence_end_date,
                    &options,
                )
                .context("Failed to expand session series")?
            };
            print_json(&instances)?;
        }
        Commands::Book {
            store,
            appointment_type,
            staff,
            start,
            patient,
            location,
        } => {
            let service = open_service(&store, config)?;
            let request = BookingRequest {
                appointment_type_id: appointment_type,
                staff_id: staff,
                start,
                patient_id: patient,
                location_id: location,
            };
            let booked = service
                .book_appointment(&request)
                .await
                .with_context(|| format!("Failed to book {start} for staff {staff}"))?;
            print_json(&booked)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` flags pick the level. Logs go to stderr so
/// stdout stays valid JSON.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_store(path: &Path) -> Result<InMemoryStore> {
    InMemoryStore::from_json_file(path)
        .with_context(|| format!("Failed to load store snapshot: {}", path.display()))
}

fn open_service(path: &Path, config: EngineConfig) -> Result<BookingService> {
    let store = load_store(path)?;
    BookingService::new(Arc::new(store), Arc::new(LogNotifier), config)
        .context("Invalid engine config")
}

fn read_template(path: &Path) -> Result<SessionTemplate> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let row: SessionRow = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse session template: {}", path.display()))?;
    SessionTemplate::try_from(row).context("Invalid session template")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{pretty}");
    Ok(())
}

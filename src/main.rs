use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use ticket_ingest::config::{IngestConfig, LOGGED_ENV_KEYS};
use ticket_ingest::database_ops::memory::{MemoryRunStore, MemoryTicketStore};
use ticket_ingest::database_ops::postgres::{PgRunStore, PgTicketStore};
use ticket_ingest::database_ops::store::{RunStore, TicketStore};
use ticket_ingest::ingest::{IngestPipeline, IngestReport, IngestSettings, Upload};
use ticket_ingest::util::{db::Db, env};

#[derive(Parser, Debug)]
#[command(name = "ticket-ingest", version, about = "Ticket export ingestion CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Import a semicolon-delimited ticket export (.csv) into the ticket store
    Import {
        /// Path to the export file
        file: PathBuf,
        /// Tickets per upsert call (default: INGEST_CHUNK_SIZE or 100)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Delay between chunk writes in milliseconds (default: INGEST_PACE_MS or 100)
        #[arg(long)]
        pace_ms: Option<u64>,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Run against in-memory stores and print the tickets as JSON lines
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show the most recent import runs
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 5)]
        limit: i64,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Print runs as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

async fn connect(db_url: Option<String>, cfg: &IngestConfig) -> Result<Db> {
    let url = match db_url {
        Some(url) => url,
        None => env::db_url_prefer_session().context(
            "Database URL not configured; set SUPABASE_DB_SESSION_URL / DATABASE_URL / DB_HOST",
        )?,
    };
    Db::connect(&url, cfg.max_connections).await
}

async fn run_import<T, R>(
    tickets: &T,
    runs: &R,
    settings: IngestSettings,
    upload: &Upload,
) -> Result<IngestReport>
where
    T: TicketStore + ?Sized,
    R: RunStore + ?Sized,
{
    let pipeline = IngestPipeline::new(tickets, runs, settings);
    let report = pipeline
        .ingest(upload, |pct| info!(target: "pipeline", pct, "progress"))
        .await?;
    Ok(report)
}

fn print_report(report: &IngestReport) {
    println!("{}: {}", report.status, report.message);
    println!(
        "run={} records={} duplicates={} without_id={} chunks={}",
        report.run_id, report.records_count, report.duplicates, report.missing_id, report.chunks
    );
    if let Some(e) = &report.finalize_error {
        warn!(target: "run_tracker", error = %e, "tickets written but run status not saved");
        println!("warning: run status could not be saved: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env::init_env();
    ticket_ingest::tracing::init_tracing("info")?;
    env::preflight_check("ticket-ingest", &[], LOGGED_ENV_KEYS)?;
    let cfg = IngestConfig::from_env();

    match cli.command {
        Commands::Import {
            file,
            chunk_size,
            pace_ms,
            db_url,
            dry_run,
        } => {
            let cfg = cfg.with_overrides(chunk_size, pace_ms);
            let settings = cfg.ingest_settings()?;
            let upload = Upload::from_path(&file)?;

            if dry_run {
                let tickets = MemoryTicketStore::new();
                let runs = MemoryRunStore::new();
                let report = run_import(&tickets, &runs, settings, &upload).await?;
                for ticket in tickets.tickets() {
                    println!("{}", serde_json::to_string(&ticket)?);
                }
                print_report(&report);
            } else {
                let db = connect(db_url, &cfg).await?;
                let tickets = PgTicketStore::new(db.clone(), &cfg.tickets_table)?;
                let runs = PgRunStore::new(db, &cfg.runs_table)?;
                let report = run_import(&tickets, &runs, settings, &upload).await?;
                print_report(&report);
            }
        }
        Commands::History {
            limit,
            db_url,
            json,
        } => {
            cfg.validate()?;
            let db = connect(db_url, &cfg).await?;
            let runs = PgRunStore::new(db, &cfg.runs_table)?;
            for run in runs.recent(limit).await? {
                if json {
                    println!("{}", serde_json::to_string(&run)?);
                } else {
                    println!(
                        "{}  {:<12} {:>8}  {}  {}",
                        run.created_at.format("%Y-%m-%d %H:%M"),
                        run.status.as_str(),
                        run.records_count,
                        run.filename,
                        run.error_message.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

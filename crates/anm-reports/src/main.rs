//! ANM reports CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use anm_reports::{
    AnmReports, AnnualTarget, FixedClock, MetricsMonitor, ReportingData, ReportingService,
    ReportsConfig, ReportsDb, RuleRegistry, SubmitOutcome,
};

#[derive(Parser)]
#[command(name = "anm-reports")]
#[command(about = "Field worker indicator reports")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record indicator activity for a field worker
    Save {
        #[arg(long)]
        anm: String,

        #[arg(long)]
        external_id: String,

        #[arg(long)]
        indicator: String,

        /// Report date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Number of units (default 1)
        #[arg(long)]
        quantity: Option<String>,
    },

    /// Print a field worker's summary for the current reporting year
    Summary {
        #[arg(long)]
        anm: String,
    },

    /// Print summaries for every field worker
    ReportAll,

    /// Store an annual target
    Target {
        #[arg(long)]
        anm: String,

        #[arg(long)]
        indicator: String,

        #[arg(long)]
        target: u32,

        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,
    },

    /// Submit a JSON reporting payload from a file
    Submit {
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => ReportsConfig::load(path)?,
        None => ReportsConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let db = Arc::new(ReportsDb::open(&config.db_path).with_context(|| {
        format!("failed to open reports database {}", config.db_path.display())
    })?);
    let mut reports = AnmReports::from_db(db.clone(), Arc::new(MetricsMonitor::new()), &config)?;
    if let Some(today) = cli.today {
        reports = reports.with_clock(Arc::new(FixedClock(today)));
    }

    match cli.command {
        Commands::Save {
            anm,
            external_id,
            indicator,
            date,
            quantity,
        } => {
            let outcome = reports.save(&anm, &external_id, &indicator, &date, quantity.as_deref())?;
            println!(
                "saved {} of {} row(s) ({} failed)",
                outcome.written, outcome.requested, outcome.failed
            );
        }
        Commands::Summary { anm } => {
            let summaries = reports.fetch_anm_summary(&anm)?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::ReportAll => {
            let all = reports.fetch_all_anms_report()?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        Commands::Target {
            anm,
            indicator,
            target,
            start,
            end,
        } => {
            let target = AnnualTarget::new(anm, indicator, target, start, end);
            let saved = db.save_annual_target(&target)?;
            println!(
                "stored target {} for {} / {} ({}..={})",
                saved.target,
                saved.anm_identifier,
                saved.indicator,
                saved.start_date,
                saved.end_date
            );
        }
        Commands::Submit { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let payload = ReportingData::from_json(&json)?;
            let service =
                ReportingService::new(Arc::new(reports), RuleRegistry::with_default_rules());
            match service.submit(&payload)? {
                SubmitOutcome::Saved(outcome) => println!(
                    "saved {} of {} row(s) ({} failed)",
                    outcome.written, outcome.requested, outcome.failed
                ),
                SubmitOutcome::Skipped { reason } => println!("skipped: {}", reason),
            }
        }
    }

    Ok(())
}

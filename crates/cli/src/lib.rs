pub mod commands;

use clap::{Parser, Subcommand};
use shutterbook_core::config::{AppConfig, LoadOptions};
use std::process::ExitCode;

use crate::commands::book::BookArgs;
use crate::commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "shutterbook",
    about = "Shutterbook booking CLI",
    long_about = "Price real-estate photography packages and submit bookings to the configured endpoint.",
    after_help = "Examples:\n  shutterbook catalog\n  shutterbook quote --size 2000-3000 --service hdr_photos --service drone\n  shutterbook book --size <1000 --service hdr_photos --street '48 Ocean Ave' --city Kennebunkport --state ME --zip 04046 --date 2026-11-02 --dry-run"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List services, per-size prices, discount tiers, and bundles")]
    Catalog,
    #[command(about = "Price a selection of services for a property size")]
    Quote {
        #[arg(long, help = "Property size bucket, e.g. 1000-2000")]
        size: Option<String>,
        #[arg(long = "service", help = "Service id or name, optionally `=qty`; repeatable")]
        services: Vec<String>,
    },
    #[command(about = "Validate an order and submit it to the booking endpoint")]
    Book {
        #[arg(long)]
        size: Option<String>,
        #[arg(long = "service")]
        services: Vec<String>,
        #[arg(long)]
        street: Option<String>,
        #[arg(long)]
        street2: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long = "zip")]
        zip_code: Option<String>,
        #[arg(long, help = "Preferred shoot date (YYYY-MM-DD)")]
        date: Option<String>,
        #[arg(long, help = "vacant | occupied | tenant-occupied")]
        occupancy: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, help = "Submit to an in-memory gateway instead of the configured endpoint")]
        dry_run: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

/// Installs the tracing subscriber on stderr so stdout stays machine-readable.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use shutterbook_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("failed to install log subscriber: {error}"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Commands report config errors themselves.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("{error:#}");
        }
    }

    let result = match cli.command {
        Command::Catalog => commands::catalog::run(),
        Command::Quote { size, services } => commands::quote::run(QuoteArgs { size, services }),
        Command::Book {
            size,
            services,
            street,
            street2,
            city,
            state,
            zip_code,
            date,
            occupancy,
            notes,
            dry_run,
        } => commands::book::run(BookArgs {
            size,
            services,
            street,
            street2,
            city,
            state,
            zip_code,
            date,
            occupancy,
            notes,
            dry_run,
        }),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

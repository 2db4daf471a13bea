pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use renoquote_core::config::{AppConfig, LoadOptions, LogFormat};
use rust_decimal::Decimal;

use crate::commands::quote::CreateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "renoquote",
    about = "Renovation quote engine operator CLI",
    long_about = "Compose priced renovation quotes from floor-plan analyses, edit them, and manage their version history.",
    after_help = "Examples:\n  renoquote migrate\n  renoquote seed\n  renoquote estimate --analysis plan.json --grade 중급\n  renoquote quote create --analysis plan.json --number Q-2026-0001 --customer 김민지\n  renoquote quote upgrade Q-2026-0001 --grade 고급"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the default labor, material and composite price catalog")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Price a floor-plan analysis without saving a quote")]
    Estimate {
        #[arg(long, help = "Analyzer response recorded as JSON")]
        analysis: PathBuf,
        #[arg(long, default_value = "일반", help = "일반 | 중급 | 고급")]
        grade: String,
        #[arg(long, help = "Leave VAT out of the totals")]
        no_vat: bool,
    },
    #[command(subcommand, about = "Create, edit and version persisted quotes")]
    Quote(QuoteCommand),
}

#[derive(Debug, Subcommand)]
enum QuoteCommand {
    #[command(about = "Compose a quote from an analysis and save it as a draft")]
    Create(CreateArgs),
    #[command(about = "Show a quote with its items")]
    Show { number: String },
    #[command(about = "List quotes, newest first")]
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    #[command(about = "List saved versions of a quote")]
    Versions { number: String },
    #[command(about = "Save the current state of a quote as a new version")]
    Snapshot {
        number: String,
        #[arg(long)]
        reason: String,
    },
    #[command(about = "Restore a saved version; the replaced state is backed up first")]
    Rollback {
        number: String,
        #[arg(long, help = "Version number to restore")]
        version: u32,
    },
    #[command(about = "Re-price a quote at another grade into its -중급/-고급 sibling")]
    Upgrade {
        number: String,
        #[arg(long)]
        grade: String,
    },
    #[command(about = "Move a quote through its lifecycle")]
    Status { number: String, status: String },
    #[command(about = "Set the discount and recompute totals")]
    Discount {
        number: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reason: Option<String>,
    },
    #[command(about = "Turn VAT on or off and recompute totals")]
    Vat {
        number: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    #[command(about = "Delete a quote and its items; saved versions are kept")]
    Delete { number: String },
}

/// Installs the global subscriber. Logs go to stderr; stdout carries results.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow::anyhow!("failed to install tracing subscriber: {error}"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // A broken config is reported by the command itself.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = init_logging(&config) {
            eprintln!("{error}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Estimate { analysis, grade, no_vat } => {
            commands::estimate::run(&analysis, &grade, !no_vat)
        }
        Command::Quote(command) => run_quote(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn run_quote(command: QuoteCommand) -> commands::CommandResult {
    use commands::quote;

    match command {
        QuoteCommand::Create(args) => quote::create(args),
        QuoteCommand::Show { number } => quote::show(&number),
        QuoteCommand::List { status, limit } => quote::list(status.as_deref(), limit),
        QuoteCommand::Versions { number } => quote::versions(&number),
        QuoteCommand::Snapshot { number, reason } => quote::snapshot(&number, &reason),
        QuoteCommand::Rollback { number, version } => quote::rollback(&number, version),
        QuoteCommand::Upgrade { number, grade } => quote::upgrade(&number, &grade),
        QuoteCommand::Status { number, status } => quote::set_status(&number, &status),
        QuoteCommand::Discount { number, amount, reason } => {
            quote::set_discount(&number, amount, reason)
        }
        QuoteCommand::Vat { number, enabled } => quote::set_vat(&number, enabled),
        QuoteCommand::Delete { number } => quote::delete(&number),
    }
}

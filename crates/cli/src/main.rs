// shipmatch - batch order-to-shipment reconciliation

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use exit_codes::{EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "shipmatch")]
#[command(about = "Reconcile customer order books against shipment logs")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log detail (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match shipments to orders for every configured customer
    #[command(after_help = "\
Examples:
  shipmatch run apparel.recon.toml --orders orders.csv --shipments shipments.csv
  shipmatch run apparel.recon.toml --orders orders.csv --shipments shipments.csv --customer Northwind
  shipmatch run apparel.recon.toml --orders orders.csv --shipments shipments.csv --po 4755 --json
  shipmatch run apparel.recon.toml --orders orders.csv --shipments shipments.csv \\
      --from 2024-03-01 --to 2024-03-31 --output result.json")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Order book CSV
        #[arg(long, env = "SHIPMATCH_ORDERS")]
        orders: PathBuf,

        /// Shipment log CSV
        #[arg(long, env = "SHIPMATCH_SHIPMENTS")]
        shipments: PathBuf,

        /// Only run these customers (any configured spelling; repeatable)
        #[arg(long = "customer")]
        customers: Vec<String>,

        /// Only reconcile this PO number
        #[arg(long)]
        po: Option<String>,

        /// First ship date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last ship date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  shipmatch validate apparel.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  shipmatch-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if std::env::var("RUST_LOG").is_err() {
        let level = match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        builder
            .filter_module("shipmatch_recon", level)
            .filter_module("shipmatch", level);
    }
    let _ = builder.format_timestamp_millis().try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            orders,
            shipments,
            customers,
            po,
            from,
            to,
            json,
            output,
        } => recon::cmd_run(recon::RunArgs {
            config,
            orders,
            shipments,
            customers,
            po,
            from,
            to,
            json,
            output,
        }),
        Commands::Validate { config } => recon::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// otd - purchase-order delivery reconciliation from ERP exports

mod associate;
mod exit_codes;
mod run;
mod summary;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use otd_recon::{Dimension, Granularity, ReconError};
use tracing_subscriber::EnvFilter;

use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

/// Environment variable holding a log filter (`warn`, `otd_recon=debug`, ...).
pub const LOG_ENV: &str = "OTD_LOG";

#[derive(Parser)]
#[command(name = "otd")]
#[command(about = "On-time delivery analysis for purchase-order exports")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). Overridden by OTD_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Year / supplier selection shared by `run` and `associate`.
#[derive(clap::Args, Debug, Default)]
pub struct SelectionArgs {
    /// Keep only orders placed in this year (repeatable)
    #[arg(long = "year", value_name = "YEAR")]
    pub years: Vec<i32>,

    /// Keep only lines from this supplier (repeatable)
    #[arg(long = "supplier", value_name = "NAME")]
    pub suppliers: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify order lines and orders, compute metrics and the association test
    #[command(after_help = "\
Examples:
  otd run inkoop.otd.toml
  otd run inkoop.otd.toml --year 2023 --year 2024
  otd run inkoop.otd.toml --supplier Acme --json
  otd run inkoop.otd.toml --output result.json --strict")]
    Run {
        /// Path to the .otd.toml config file
        config: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output JSON to stdout; the human summary still goes to stderr
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit 6 when the run reports data-quality issues
        #[arg(long)]
        strict: bool,
    },

    /// Validate a config without loading any data
    #[command(after_help = "\
Examples:
  otd validate inkoop.otd.toml")]
    Validate {
        /// Path to the .otd.toml config file
        config: PathBuf,
    },

    /// Run only the contingency analysis, overriding the configured dimensions
    #[command(after_help = "\
Examples:
  otd associate inkoop.otd.toml
  otd associate inkoop.otd.toml --rows supplier --columns delay_category --top-n 10
  otd associate inkoop.otd.toml --granularity line --year 2024 --json")]
    Associate {
        /// Path to the .otd.toml config file
        config: PathBuf,

        /// Row dimension
        #[arg(long)]
        rows: Option<Dimension>,

        /// Column dimension
        #[arg(long)]
        columns: Option<Dimension>,

        /// Keep only the N most frequent row categories
        #[arg(long)]
        top_n: Option<usize>,

        /// Count lines or orders
        #[arg(long, value_enum)]
        granularity: Option<GranularityArg>,

        /// Apply Yates' continuity correction to 2x2 tables
        #[arg(long)]
        yates: bool,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output JSON to stdout instead of the table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Line,
    Order,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Line => Granularity::Line,
            GranularityArg::Order => Granularity::Order,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // Also installs the `log` bridge, so engine records reach the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            selection,
            json,
            output,
            strict,
        } => run::cmd_run(config, selection, json, output, strict),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Associate {
            config,
            rows,
            columns,
            top_n,
            granularity,
            yates,
            selection,
            json,
        } => associate::cmd_associate(
            config,
            associate::Overrides {
                rows,
                columns,
                top_n,
                granularity: granularity.map(Into::into),
                yates,
            },
            selection,
            json,
        ),
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

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::MissingColumn { .. } => {
                Some("check the [orders.columns] / [receipts.columns] mapping against the export headers".to_string())
            }
            ReconError::InsufficientData(_) => Some("widen the --year / --supplier selection or the [filters]".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

// stockrecon CLI - reconcile on-hand inventory detail against counted totals

mod exit_codes;
mod recon;
mod sheet;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;
use recon::RunArgs;
use sheet::SheetOptions;

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  stockrecon-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  stockrecon-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

#[derive(Parser)]
#[command(name = "stockrecon")]
#[command(about = "Reconcile on-hand inventory detail against counted or scanned totals")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log engine decisions to stderr (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a detail table against an external count
    #[command(after_help = "\
Examples:
  stockrecon run --detail on-hand.xlsx --external scans.csv
  stockrecon run --detail on-hand.xlsx --external pivot.xlsx --external-skip-rows 1 --output
  stockrecon run --detail on-hand.csv --external scans.csv --config roles.toml --json
  stockrecon run --detail on-hand.csv --external scans.csv --fail-on-variance")]
    Run {
        /// Internal detail table (.csv, .xlsx, .xlsm, .xlsb, .xls, .ods)
        #[arg(long)]
        detail: PathBuf,

        /// External table: raw scan/count events or a per-key pivot
        #[arg(long)]
        external: PathBuf,

        /// Column-role TOML file (defaults to the built-in role table)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worksheet to read from the detail workbook (default: first)
        #[arg(long)]
        detail_sheet: Option<String>,

        /// Rows above the detail header to skip
        #[arg(long, default_value_t = 0)]
        detail_skip_rows: usize,

        /// Worksheet to read from the external workbook (default: first)
        #[arg(long)]
        external_sheet: Option<String>,

        /// Rows above the external header to skip
        #[arg(long, default_value_t = 0)]
        external_skip_rows: usize,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (bare flag: Reconciled_YYYYMMDD_HHMMSS.json)
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        output: Option<String>,

        /// Exit 63 when any key carries variance or demand is unmatched
        #[arg(long)]
        fail_on_variance: bool,
    },

    /// Validate a column-role config without running
    #[command(after_help = "\
Examples:
  stockrecon validate roles.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Print the built-in column-role table as TOML
    #[command(after_help = "\
Examples:
  stockrecon roles > roles.toml")]
    Roles,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            detail,
            external,
            config,
            detail_sheet,
            detail_skip_rows,
            external_sheet,
            external_skip_rows,
            json,
            output,
            fail_on_variance,
        } => recon::cmd_run(RunArgs {
            detail,
            external,
            config,
            detail_sheet: SheetOptions { sheet: detail_sheet, skip_rows: detail_skip_rows },
            external_sheet: SheetOptions { sheet: external_sheet, skip_rows: external_skip_rows },
            json,
            output: output.map(PathBuf::from),
            fail_on_variance,
        }),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Roles => recon::cmd_roles(),
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

/// Stderr level for a `-v` count: warnings by default, `-v` debug, `-vv` trace.
fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Logs go to stderr so stdout stays clean for `--json` and `roles`.
/// `RUST_LOG` overrides the `-v` level when set.
fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level_for(verbosity).into()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
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

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

//! Ratus CLI - command line interface for the Ratus language.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::Options;

/// Main CLI structure.
#[derive(Parser)]
#[command(name = "ratus")]
#[command(author, version, about = "Ratus - a small language with structural subtyping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output and debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress status output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// How diagnostics are printed.
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Stop at the first syntax error instead of recovering.
    #[arg(long, global = true)]
    strict: bool,

    /// Give up after this many evaluation steps.
    #[arg(long, global = true)]
    max_steps: Option<u64>,

    /// Maximum nesting of function calls.
    #[arg(long, global = true)]
    max_call_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file, print its syntax tree and report syntax errors.
    Parse {
        /// The file to parse.
        file: String,
    },

    /// Type check a file.
    Check {
        /// The file to check.
        file: String,
    },

    /// Run a file and print its result.
    Run {
        /// The file to run.
        file: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Install the log subscriber. `RATUS_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("RATUS_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ratus::Config::new().with_max_steps(cli.max_steps);
    if cli.strict {
        config = config.with_parse_mode(ratus::ParseMode::Strict);
    }
    if let Some(depth) = cli.max_call_depth {
        config = config.with_max_call_depth(depth);
    }
    let options = Options {
        config,
        format: cli.format,
        quiet: cli.quiet,
    };

    let result = match &cli.command {
        Commands::Parse { file } => commands::parse::run(file, options),
        Commands::Check { file } => commands::check::run(file, options),
        Commands::Run { file } => commands::run::run(file, options),
    };

    if let Err(e) = result {
        if !cli.quiet {
            output::error(&e);
        }
        std::process::exit(1);
    }
}

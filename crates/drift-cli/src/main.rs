mod cmd_fill_dates;
mod cmd_list;
mod cmd_run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drift_runner::{RunConfig, CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "drift-tracker",
    version,
    about = "Track dependency drift and pulse across JavaScript repositories"
)]
struct Cli {
    /// Directory holding the repository list and the data directory (default: current directory)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Config file (default: <base-dir>/drift-tracker.json, optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure every repository of the list and persist the results
    Run {
        /// Maximum entries processed at once (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Leave cloned repositories on disk
        #[arg(long)]
        keep_workspaces: bool,
        /// Commit the data directory after the run
        #[arg(long)]
        commit: bool,
    },
    /// Fill missing dates in history files
    FillDates {
        /// Directory of history files (default: the configured data directory)
        dir: Option<PathBuf>,
    },
    /// Print every identifier of the repository list with its file name
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut config = load_config(&base_dir, cli.config.as_deref())?;

    match cli.cmd {
        Command::Run {
            concurrency,
            keep_workspaces,
            commit,
        } => {
            if let Some(n) = concurrency {
                config.concurrency = n;
            }
            config.keep_workspaces |= keep_workspaces;
            config.commit |= commit;
            config.validate()?;
            let ok = cmd_run::execute(&base_dir, &config)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::FillDates { dir } => {
            let dir = dir.unwrap_or_else(|| config.data_path(&base_dir));
            let report = cmd_fill_dates::execute(&dir)?;
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::List { json } => {
            cmd_list::execute(&config.repositories_path(&base_dir), json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// An explicit `--config` must exist; the default one is optional.
fn load_config(base_dir: &Path, explicit: Option<&Path>) -> Result<RunConfig> {
    match explicit {
        Some(path) => RunConfig::load(path),
        None => RunConfig::load_or_default(&base_dir.join(CONFIG_FILE)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

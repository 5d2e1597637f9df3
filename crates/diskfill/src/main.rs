//! A CLI app that fills the free space of a volume with preallocated files.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use diskfill::{
    size::SizeRequest,
    space::{self, Budget},
};
use diskfill_disk_space_allocation::Allocator;
use diskfill_distribution::{progress::TracingReporter, Job, Mode, Scheduler};
use diskfill_visibility::Concealer;
use tokio_util::sync::CancellationToken;

/// The distribution modes, as they are spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMode {
    /// A single file under the path.
    #[value(alias = "o")]
    Onefile,
    /// Extend every writable file under the path.
    #[value(alias = "a")]
    Append,
    /// Create a file in every writable directory under the path.
    #[value(alias = "s")]
    Splinters,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Onefile => Mode::Single,
            CliMode::Append => Mode::SequentialDecreasing,
            CliMode::Splinters => Mode::FragmentedDecreasing,
        }
    }
}

/// Fill the free space of a volume with preallocated files, fast.
///
/// Run as administrator (root) for the fastest allocation path.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The path on the volume to fill, created if missing.
    #[arg(short, long, env = "DISKFILL_PATH", default_value = "./test")]
    path: PathBuf,

    /// The amount of space to fill, like `10G` (K/M/G/T suffixes), or `full`.
    #[arg(long, env = "DISKFILL_SIZE", default_value = "10M")]
    size: SizeRequest,

    /// How to lay the files out.
    #[arg(short, long, value_enum, env = "DISKFILL_MODE", default_value_t = CliMode::Onefile)]
    mode: CliMode,

    /// Conceal every produced file; requires administrator (root) rights.
    #[arg(long, env = "DISKFILL_HIDE", value_parser = clap::builder::FalseyValueParser::new())]
    hide: bool,

    /// Do not ask for confirmations.
    #[arg(short, long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mode = Mode::from(cli.mode);

    if !cli.path.exists() {
        fs::create_dir_all(&cli.path)
            .with_context(|| format!("unable to create {}", cli.path.display()))?;
        tracing::info!(message = "created the directory", path = %cli.path.display());
    }
    let root = std::path::absolute(&cli.path)
        .with_context(|| format!("unable to resolve {}", cli.path.display()))?;

    let usage = space::usage(&root)
        .with_context(|| format!("unable to query the free space at {}", root.display()))?;
    let budget = Budget::resolve(cli.size, usage.free);
    if let Some(requested) = budget.clamped_from {
        tracing::warn!(
            message = "the requested size exceeds the free space, reduced",
            %requested,
            free = %usage.free,
            size = %budget.bytes
        );
    }
    tracing::info!(message = "Write size", size = %budget.bytes, free = %usage.free, total = %usage.total);

    if cli.hide {
        if !diskfill_disk_space_allocation::is_elevated() {
            bail!("concealing the files requires administrator (root) rights");
        }
        if mode == Mode::SequentialDecreasing && !cli.yes {
            let confirmed = tokio::task::block_in_place(|| {
                confirm("You are about to conceal existing files. Continue? (Y/N): ")
            })?;
            if !confirmed {
                tracing::info!(message = "aborted");
                return Ok(());
            }
        }
    }

    let targets = match mode.scope() {
        Some(scope) => {
            tracing::info!(message = "Scanning", root = %root.display());
            let targets = tokio::task::block_in_place(|| diskfill_targets::enumerate(&root, scope))
                .with_context(|| format!("unable to scan {}", root.display()))?;
            tracing::info!(message = "Targets found", count = targets.len());
            targets
        }
        None => Vec::new(),
    };

    let allocator = Allocator::new();
    if !allocator.fast_path_available() {
        tracing::warn!(
            message = "the fastest allocation path is unavailable, run as administrator (root) to enable it"
        );
    }

    let cancel = CancellationToken::new();
    let scheduler = Scheduler {
        allocator,
        concealer: cli.hide.then(Concealer::new),
        reporter: TracingReporter::from_static("diskfill"),
        cancel: cancel.clone(),
    };
    let job = Job {
        mode,
        root,
        targets,
        budget: budget.bytes,
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(message = "interrupt received, stopping after the current target");
            cancel.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || scheduler.run(&job)).await?;

    tracing::info!(
        message = "Done",
        targets = %report.targets,
        succeeded = %report.succeeded,
        failed = %report.failed,
        allocated = %report.allocated,
        forfeited = %report.forfeited,
        conceal_failures = %report.conceal_failures,
        interrupted = %report.interrupted
    );

    Ok(())
}

/// Ask the user a yes/no question on the terminal.
fn confirm(prompt: &str) -> Result<bool, io::Error> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "Y" | "y"))
}

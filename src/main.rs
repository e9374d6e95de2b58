//! # twinbin CLI Entry Point
//!
//! Parses arguments with clap, loads `twinbin.toml` and hands off to the
//! library. The process exits 0 when the requested command succeeded and 1
//! otherwise.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use twinbin::build::{self, BuildDriver, SourceSet};
use twinbin::config::{self, Config};
use twinbin::toolchain::{DryRunRunner, ProcessRunner};

#[derive(Parser)]
#[command(name = "twinbin")]
#[command(about = "Build a production binary and an entry-swapped test binary from one object set", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to ./twinbin.toml, or built-in defaults if absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every source and link the executables
    Build {
        /// Also derive the test executable by entry-symbol swapping
        #[arg(long)]
        tests: bool,
        /// Print the commands that would run without running them
        #[arg(long)]
        dry_run: bool,
        /// Echo each tool command before running it
        #[arg(short, long)]
        verbose: bool,
    },
    /// Re-link the production executable from already staged objects
    Link {
        /// Echo each tool command before running it
        #[arg(short, long)]
        verbose: bool,
    },
    /// List discovered sources and their roles
    Sources,
    /// Remove build artifacts
    Clean {
        /// Also remove both executables and compile_commands.json
        #[arg(long)]
        all: bool,
    },
}

fn runner(config: &Config, verbose: bool) -> ProcessRunner {
    ProcessRunner::new()
        .with_timeout(config.build.timeout_secs.map(Duration::from_secs))
        .verbose(verbose)
}

fn run_build(mut config: Config, tests: bool, dry_run: bool, verbose: bool) -> Result<()> {
    config.tests.enabled |= tests;
    let root = Path::new(".");

    if dry_run {
        let mut driver = BuildDriver::new(config, root, DryRunRunner::default()).dry_run(true);
        driver.run()?;
        return Ok(());
    }

    let runner = runner(&config, verbose);
    let report = BuildDriver::new(config, root, runner).run()?;
    println!(
        "{} {} ({} objects)",
        "→".dimmed(),
        report.production.display(),
        report.objects.len()
    );
    if let Some(test) = &report.test {
        println!("{} {}", "→".dimmed(), test.display());
    }
    Ok(())
}

fn relink(config: Config, verbose: bool) -> Result<()> {
    let runner = runner(&config, verbose);
    let output = BuildDriver::new(config, Path::new("."), runner).relink()?;
    println!("{} Linked {}", "✓".green(), output.display());
    Ok(())
}

fn list_sources(config: &Config) -> Result<()> {
    let set = SourceSet::discover(
        Path::new("."),
        &config.build.extension,
        &config.module.path,
        &config.tests.unit,
    )?;
    let width = set
        .all()
        .map(|s| s.path.to_string_lossy().chars().count())
        .max()
        .unwrap_or(0);
    for source in set.all() {
        println!(
            "{:<width$}  {:<4} {}",
            source.path.display().to_string(),
            source.extension,
            source.role.to_string().cyan(),
            width = width
        );
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        None => run_build(config, false, false, false),
        Some(Commands::Build {
            tests,
            dry_run,
            verbose,
        }) => run_build(config, tests, dry_run, verbose),
        Some(Commands::Link { verbose }) => relink(config, verbose),
        Some(Commands::Sources) => list_sources(&config),
        Some(Commands::Clean { all }) => build::clean(&config, Path::new("."), all).map(|_| ()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

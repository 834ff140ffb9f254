// Command-line entry point for Discover.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use discover::application::{InstrumentUsecase, TrimUsecase};
use discover::common::config::Config;
use discover::domain::profile::CoverageProfile;
use discover::infrastructure::{
    init_thread_pool, ConsoleSink, DirectorySink, JsonTreeLoader, SearchPathResolver, SourcePrinter,
};
use discover::ports::OutputSink;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./discover.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory; without one, results are printed to stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Worker threads (defaults to one per core)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Root searched for module directories; may be repeated
    #[arg(long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add block counters and trace-id plumbing to source files
    Instrument {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Trim sources down to the code a coverage profile reached
    Parse {
        /// Coverage profile written by the instrumented run
        profile: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::discover(cli.config.as_deref())?;
    if !cli.search_paths.is_empty() {
        config.search_paths = cli.search_paths.clone();
    }
    if cli.threads.is_some() {
        config.threads = cli.threads;
    }
    if cli.output.is_some() {
        config.output = cli.output.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_thread_pool(config.threads)?;

    let sink: Box<dyn OutputSink> = match &config.output {
        Some(dir) => Box::new(DirectorySink::new(dir)),
        None => Box::new(ConsoleSink::stdout()),
    };
    let loader = JsonTreeLoader::new(config.tree_suffix.clone());

    match cli.command {
        Command::Instrument { files } => {
            let usecase = InstrumentUsecase {
                loader: &loader,
                printer: &SourcePrinter,
                sink: sink.as_ref(),
                config: &config.instrument,
            };
            let summary = usecase.run(&files)?;
            if summary.overlaps > 0 {
                tracing::warn!(overlaps = summary.overlaps, "instrumentation self-check found overlapping blocks");
            }
        }
        Command::Parse { profile } => {
            let text = fs::read_to_string(&profile)
                .with_context(|| format!("Failed to read coverage profile {}", profile.display()))?;
            let parsed = CoverageProfile::parse(&text)
                .with_context(|| format!("Failed to parse coverage profile {}", profile.display()))?;
            tracing::debug!(files = parsed.files.len(), records = parsed.record_count(), "parsed profile");

            let resolver = SearchPathResolver::new(config.search_paths.clone());
            let usecase = TrimUsecase {
                loader: &loader,
                resolver: &resolver,
                printer: &SourcePrinter,
                sink: sink.as_ref(),
            };
            usecase.run(&parsed)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

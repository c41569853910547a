use clap::Parser;
use color_print::cformat;
use lamport_mutex_sim::{log, SimConfig, Simulation};
use std::{error::Error, path::PathBuf, process::ExitCode};
use tokio_util::sync::CancellationToken;

/// Simulates Lamport's distributed mutual exclusion between in-process peers.
#[derive(Parser)]
#[command(name = "lamport-sim", version, about, long_about = None)]
struct Cli {
    /// JSON file with the simulation settings; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of processes sharing the resource
    #[arg(short, long)]
    processes: Option<u32>,

    /// Seed for every random choice in the run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C or SIGTERM
    #[arg(short, long)]
    run_for: Option<u64>,

    /// Print state changes as JSON lines
    #[arg(long)]
    json: bool,

    /// Log every message a process receives
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> Result<SimConfig, Box<dyn Error + Send + Sync>> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };

        if let Some(processes) = self.processes {
            config.processes = processes;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.run_for.is_some() {
            config.run_for_ms = self.run_for;
        }
        config.json |= self.json;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    log::set_level(match (cli.verbose, cli.quiet) {
        (true, _) => log::Level::Debug,
        (_, true) => log::Level::Error,
        _ => log::Level::Info,
    });

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error(&format!("{e}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let simulation = Simulation::new(cli.into_config()?)?;
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });
    }
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if terminate.recv().await.is_some() {
                shutdown.cancel();
            }
        });
    }

    let report = simulation.run(shutdown).await?;

    log::info(&cformat!(
        "Seed <bold>{}</bold>: <bold>{}</bold> grants, <bold>{}</bold> state changes, at most <bold>{}</bold> holder(s) at once.",
        report.seed,
        report.observer.grants,
        report.observer.notifications,
        report.observer.max_holders
    ));
    for failure in &report.failures {
        log::error(&format!("{failure}"));
    }

    Ok(report.is_safe() && report.failures.is_empty())
}

//! Module that wires the processes together and runs them until shutdown.

use crate::{
    config::SimConfig,
    error::{ConfigError, ProtocolError},
    jitter::derive_seed,
    log,
    message::ProcessId,
    observer::{Observer, ObserverReport},
    peer::{Peer, Workload},
    process::Process,
    transport::{Courier, Directory},
};
use color_print::cformat;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{error::Error, sync::Arc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct Report {
    pub seed: u64,
    pub bootstrap_holder: Option<ProcessId>,
    pub observer: ObserverReport,
    /// Violations that terminated a process.
    pub failures: Vec<ProtocolError>,
}

impl Report {
    /// At no point did two processes hold the resource at once.
    pub fn is_safe(&self) -> bool {
        self.observer.max_holders <= 1
    }
}

pub struct Simulation {
    config: SimConfig,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Function that runs every process until `shutdown` fires, or until `run_for_ms` elapses.
    pub async fn run(self, shutdown: CancellationToken) -> Result<Report, Box<dyn Error + Send + Sync>> {
        let config = self.config;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let bootstrap_holder = config
            .bootstrap_holder
            .then(|| ProcessId(rng.random_range(0..config.processes)));

        let (directory, inboxes) = Directory::build(config.processes, config.inbox_capacity());
        let directory = Arc::new(directory);
        let members: Vec<ProcessId> = directory.ids().collect();

        let (observer, watch) = Observer::new(config.processes, config.observer_capacity, config.json);
        let observer = tokio::spawn(observer.run());

        let tracker = TaskTracker::new();
        let workload = Workload::from(&config);
        let mut peers = Vec::with_capacity(inboxes.len());

        for (id, inbox) in inboxes {
            let mut process = Process::new(id, members.iter().copied());
            if let Some(holder) = bootstrap_holder {
                process = process.with_bootstrap(holder);
            }

            let stream = u64::from(id.0) * 2;
            let (courier, outbox) = Courier::new(
                id,
                Arc::clone(&directory),
                config.delivery,
                derive_seed(config.seed, stream + 1),
            );
            tracker.spawn(courier.run(shutdown.clone()));

            let peer = Peer::new(
                process,
                inbox,
                outbox,
                watch.clone(),
                workload,
                derive_seed(config.seed, stream + 2),
            );
            peers.push(tracker.spawn(peer.run(shutdown.clone())));
        }
        drop(watch);
        tracker.close();

        log::info(&cformat!(
            "Started <bold>{}</bold> processes with seed <bold>{}</bold>.",
            config.processes,
            config.seed
        ));

        match config.run_for() {
            Some(duration) => {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(duration) => shutdown.cancel(),
                }
            }
            None => shutdown.cancelled().await,
        }

        log::info("Shutting down.");
        tracker.wait().await;

        let mut failures = Vec::new();
        for peer in peers {
            if let Err(e) = peer.await? {
                failures.push(e);
            }
        }
        let observer = observer.await?;

        if observer.max_holders > 1 {
            log::error(&cformat!(
                "<bold>{}</bold> processes held the resource at the same time.",
                observer.max_holders
            ));
        }

        Ok(Report {
            seed: config.seed,
            bootstrap_holder,
            observer,
            failures,
        })
    }
}

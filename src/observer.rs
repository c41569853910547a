//! Module that contains the notifications processes publish and the observer that prints them.

use crate::{log, message::ProcessId, process::ProcessState};
use color_print::cformat;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, error::Error};
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Snapshot a process publishes after every state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchMessage {
    pub process: ProcessId,
    pub clock: String,
    pub state: ProcessState,
    pub queue_len: usize,
}

impl WatchMessage {
    /// Function that returns the notification as a JSON formatted `String`.
    pub fn to_json_string(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(serde_json::to_string(self)?)
    }

    /// Function that parses the notification from a JSON formatted `String`.
    pub fn from_json_string(line: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(serde_json::from_str::<Self>(line)?)
    }
}

/// Publishing end of the observer channel. Sending waits while the observer is behind.
#[derive(Debug, Clone)]
pub struct ProcessWatch {
    tx: Sender<WatchMessage>,
}

impl ProcessWatch {
    pub async fn publish(&self, notification: WatchMessage) {
        // the observer only leaves once every publisher is gone
        let _ = self.tx.send(notification).await;
    }
}

/// What the observer saw over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverReport {
    pub notifications: usize,
    /// Transitions into `Holding`, the bootstrap holder included.
    pub grants: usize,
    pub max_holders: usize,
    /// Notifications whose clock did not advance past the previous one from the same process.
    pub clock_regressions: usize,
    pub latest: BTreeMap<ProcessId, WatchMessage>,
}

pub struct Observer {
    rx: Receiver<WatchMessage>,
    processes: u32,
    json: bool,
}

impl Observer {
    /// Function that creates an observer and the handle processes publish through.
    pub fn new(processes: u32, capacity: usize, json: bool) -> (Self, ProcessWatch) {
        let (tx, rx) = mpsc::channel::<WatchMessage>(capacity);
        (
            Self {
                rx,
                processes,
                json,
            },
            ProcessWatch { tx },
        )
    }

    /// Function that drains notifications until every `ProcessWatch` has been dropped.
    pub async fn run(mut self) -> ObserverReport {
        let mut report = ObserverReport::default();

        while let Some(notification) = self.rx.recv().await {
            report.notifications += 1;

            let previous = report.latest.get(&notification.process);
            let was_holding = previous.is_some_and(|p| p.state == ProcessState::Holding);
            if let Some(previous) = previous {
                let before = previous.clock.parse::<u64>().ok();
                let now = notification.clock.parse::<u64>().ok();
                if now <= before {
                    report.clock_regressions += 1;
                    log::error(&cformat!(
                        "Clock of <bold>{}</bold> went from {} to {}.",
                        notification.process,
                        previous.clock,
                        notification.clock
                    ));
                }
            }
            if notification.state == ProcessState::Holding && !was_holding {
                report.grants += 1;
            }

            self.print(&notification);
            report.latest.insert(notification.process, notification);

            let holders: Vec<ProcessId> = report
                .latest
                .values()
                .filter(|n| n.state == ProcessState::Holding)
                .map(|n| n.process)
                .collect();
            if holders.len() > 1 {
                log::error(&cformat!(
                    "<bold>Mutual exclusion violated</bold>: {holders:?} hold the resource."
                ));
            }
            report.max_holders = report.max_holders.max(holders.len());

            if log::enabled(log::Level::Debug) {
                self.print_all(&report.latest);
            }
        }

        report
    }

    fn print(&self, notification: &WatchMessage) {
        if self.json {
            match notification.to_json_string() {
                Ok(line) => println!("{line}"),
                Err(e) => log::error(&format!("{e}")),
            }
            return;
        }

        let state = match notification.state {
            ProcessState::Holding => cformat!("<yellow, bold>{}</yellow, bold>", notification.state),
            ProcessState::Requested => cformat!("<cyan>{}</cyan>", notification.state),
            ProcessState::Free => notification.state.to_string(),
        };
        log::info(&cformat!(
            "(Process, L Clock, State, Queue): <bold>{}</bold>, {}, {}, {}",
            notification.process,
            notification.clock,
            state,
            notification.queue_len
        ));
    }

    fn print_all(&self, latest: &BTreeMap<ProcessId, WatchMessage>) {
        log::debug("--- Current System State ---");
        for id in (0..self.processes).map(ProcessId) {
            match latest.get(&id) {
                Some(n) => log::debug(&format!(
                    "  {id}: clock {}, {}, {} queued",
                    n.clock, n.state, n.queue_len
                )),
                None => log::debug(&format!("  {id}: not reported yet")),
            }
        }
        log::debug("----------------------------");
    }
}

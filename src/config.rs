use crate::{error::ConfigError, jitter::JitterSpec};
use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub processes: u32,
    pub seed: u64,
    pub request_interval_ms: u64,
    pub request_probability: f64,
    pub internal_event: JitterSpec,
    pub usage: JitterSpec,
    pub initial_usage: JitterSpec,
    pub delivery: JitterSpec,
    pub observer_capacity: usize,
    /// Start with one process already holding the resource.
    pub bootstrap_holder: bool,
    /// Print observer notifications as JSON lines.
    pub json: bool,
    pub run_for_ms: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            processes: 10,
            seed: rand::random(),
            request_interval_ms: 1000,
            request_probability: 0.5,
            internal_event: JitterSpec::new(1000, 500),
            usage: JitterSpec::new(1000, 500),
            initial_usage: JitterSpec::new(1000, 250),
            delivery: JitterSpec::new(200, 100),
            observer_capacity: 5,
            bootstrap_holder: true,
            json: false,
            run_for_ms: None,
        }
    }
}

impl SimConfig {
    /// Function that parses a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let raw = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processes == 0 {
            return Err(ConfigError::NoProcesses);
        }
        if !(0.0..=1.0).contains(&self.request_probability) {
            return Err(ConfigError::InvalidProbability(self.request_probability));
        }
        if self.request_interval_ms == 0 {
            return Err(ConfigError::ZeroRequestInterval);
        }
        if self.observer_capacity == 0 {
            return Err(ConfigError::ZeroObserverCapacity);
        }
        Ok(())
    }

    /// Inboxes hold more than the number of messages that can be in flight towards one process.
    pub fn inbox_capacity(&self) -> usize {
        self.processes as usize + 1
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }
}

use std::fmt;

/// Logical time. Only meaningful together with the process that produced it.
pub type Timestamp = u64;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LamportClock {
    time: Timestamp,
}

impl LamportClock {
    /// Function that creates a clock starting at zero.
    pub fn new() -> Self {
        Self { time: 0 }
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// Function that advances the clock for a local step and returns the new time.
    pub fn tick(&mut self) -> Timestamp {
        self.time += 1;
        self.time
    }

    /// Function that advances the clock past a received timestamp: `max(local, received) + 1`.
    pub fn witness(&mut self, received: Timestamp) -> Timestamp {
        self.time = self.time.max(received) + 1;
        self.time
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time)
    }
}

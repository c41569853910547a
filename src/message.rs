//! Module that contains the messages exchanged between processes.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a process. Doubles as the routing key and the tie-breaker between equal timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Pair that identifies one specific request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey {
    pub origin: ProcessId,
    pub time: Timestamp,
}

/// Enum that represents what a message means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Request,
    Ack,
    /// Carries the key of the request being released.
    Release(RequestKey),
    Internal,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Ack => "Ack",
            Self::Release(_) => "Release",
            Self::Internal => "Internal",
        }
    }
}

/// Struct that represents a message. Never mutated once it has been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub origin: ProcessId,
    pub seq: u64,
    pub time: Timestamp,
    pub kind: Kind,
}

impl Message {
    pub fn key(&self) -> RequestKey {
        RequestKey {
            origin: self.origin,
            time: self.time,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, Kind::Request)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Release(key) => write!(
                f,
                "{}({}, t={}, #{}) for ({}, t={})",
                self.kind.name(),
                self.origin,
                self.time,
                self.seq,
                key.origin,
                key.time
            ),
            kind => write!(
                f,
                "{}({}, t={}, #{})",
                kind.name(),
                self.origin,
                self.time,
                self.seq
            ),
        }
    }
}

/// Process-local counter that stamps every message a process creates.
#[derive(Debug, Default, Clone)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Function that creates a message with the next sequence number.
    pub fn stamp(&mut self, origin: ProcessId, time: Timestamp, kind: Kind) -> Message {
        let seq = self.next;
        self.next += 1;

        Message {
            origin,
            seq,
            time,
            kind,
        }
    }
}

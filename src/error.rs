use crate::{message::ProcessId, process::ProcessState};
use thiserror::Error;

/// Errors that mean a process broke the protocol. They are fatal for the process that hits them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("process {process} received a {kind} message, which is never sent between processes")]
    UnexpectedKind {
        process: ProcessId,
        kind: &'static str,
    },

    #[error("process {process} tried to release the resource while {state}")]
    ReleaseWithoutHold {
        process: ProcessId,
        state: ProcessState,
    },

    #[error("process {process} received a message from {origin}, which is not in the directory")]
    UnknownOrigin {
        process: ProcessId,
        origin: ProcessId,
    },

    #[error("process {process} received a message it sent itself")]
    Loopback { process: ProcessId },
}

/// Errors that can occur while delivering a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no inbox registered for process {0}")]
    UnknownRecipient(ProcessId),

    #[error("the inbox of process {0} is closed")]
    Closed(ProcessId),
}

/// Errors that make a configuration unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("a simulation needs at least one process")]
    NoProcesses,

    #[error("the request probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("the request interval must be greater than zero")]
    ZeroRequestInterval,

    #[error("the observer channel needs a capacity of at least one")]
    ZeroObserverCapacity,
}

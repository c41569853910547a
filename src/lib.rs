pub use crate::clock::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::jitter::*;
pub use crate::message::*;
pub use crate::observer::*;
pub use crate::process::*;
pub use crate::queue::*;
pub use crate::simulation::*;
pub use crate::transport::*;

pub mod clock;
pub mod config;
pub mod error;
pub mod jitter;
pub mod log;
pub mod message;
pub mod observer;
pub mod peer;
pub mod process;
pub mod queue;
pub mod simulation;
pub mod transport;

//! The capture agent: gate, auto-registration and breakpoint sync.

pub mod engine;
pub mod outcome;
pub mod registrar;
pub mod stats;
mod sync;

pub use engine::{Agent, AgentBuilder, AgentError};
pub use outcome::{CaptureOutcome, CaptureTicket, SkipReason};
pub use registrar::Registrar;
pub use stats::{AgentStats, StatsSnapshot};

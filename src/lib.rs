//! Dynamic breakpoint snapshot agent.
//!
//! Application code marks capture points with [`Agent::capture`]. A capture
//! records a redacted snapshot of the supplied values only when the control
//! plane has armed a breakpoint for that point, and never affects the
//! caller's control flow.
//!
//! ```no_run
//! use snapline::{vars, Agent, AgentConfig};
//!
//! # async fn run() -> Result<(), snapline::AgentError> {
//! let agent = Agent::builder(AgentConfig::new("checkout")).build()?;
//! agent.start();
//!
//! let order_id = 1042;
//! agent.capture("before-charge", vars! { "order_id" => order_id });
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod breakpoint;
pub mod config;
pub mod context;
pub mod control_plane;
pub mod locator;
pub mod redact;
pub mod snapshot;
pub mod transport;
pub mod util;

pub use agent::{
    Agent, AgentBuilder, AgentError, CaptureOutcome, CaptureTicket, SkipReason, StatsSnapshot,
};
pub use breakpoint::{BreakpointCache, BreakpointConfig, CapturePointIdentity};
pub use config::{AgentConfig, ConfigError, RegistrationPolicy};
pub use context::{AmbientContext, ContextProvider, NoContext, TaskLocalContext};
pub use control_plane::{
    CapturePointRegistration, ControlPlane, ControlPlaneError, HttpControlPlane,
    MockControlPlane,
};
pub use locator::{BacktraceResolver, CallerLocator, FixedFrameResolver, FrameResolver};
pub use redact::{CaptureValue, CaptureValues, Redactor};
pub use snapshot::{SecurityFinding, Severity, Snapshot, SourceLocation};
pub use transport::{HttpTransport, RecordingTransport, SnapshotTransport, TransportError};

//! Control-plane client
//!
//! The agent needs two calls from the control plane: the bulk fetch of
//! active breakpoints for a service, and registration of a newly seen
//! capture point. The wire protocol behind them is up to the implementation.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::breakpoint::{BreakpointConfig, CapturePointIdentity};

pub use http::HttpControlPlane;
pub use mock::MockControlPlane;

/// Body of a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePointRegistration {
    pub service: String,
    pub file_path: String,
    pub line_number: u32,
    pub function_name: String,
    pub label: String,
}

impl CapturePointRegistration {
    pub fn new(service: impl Into<String>, identity: &CapturePointIdentity) -> Self {
        Self {
            service: service.into(),
            file_path: identity.file_path.clone(),
            line_number: identity.line_number,
            function_name: identity.function_name.clone(),
            label: identity.label.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("Control plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Control plane returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode control plane response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Control plane request timed out after {0} ms")]
    Timeout(u64),

    #[error("Control plane rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// All active breakpoints for `service`
    async fn fetch_active_breakpoints(
        &self,
        service: &str,
    ) -> Result<Vec<BreakpointConfig>, ControlPlaneError>;

    /// Register a capture point and return its server-side config
    async fn register_capture_point(
        &self,
        registration: &CapturePointRegistration,
    ) -> Result<BreakpointConfig, ControlPlaneError>;
}

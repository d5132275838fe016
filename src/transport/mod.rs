//! Snapshot transport
//!
//! Delivery is best-effort: the agent logs a failed send and moves on.

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::snapshot::Snapshot;

pub use http::HttpTransport;
pub use mock::RecordingTransport;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Snapshot delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Snapshot delivery timed out after {0} ms")]
    Timeout(u64),

    #[error("Snapshot rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait SnapshotTransport: Send + Sync {
    async fn send(&self, snapshot: &Snapshot) -> Result<(), TransportError>;
}

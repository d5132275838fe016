use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{SnapshotTransport, TransportError};
use crate::config::AgentConfig;
use crate::snapshot::Snapshot;

const SNAPSHOTS_PATH: &str = "/api/snapshots";

/// Posts snapshots as JSON to the collector endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    credential: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        credential: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SNAPSHOTS_PATH),
            credential,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.control_plane_url,
            config.credential.clone(),
            config.request_timeout,
        )
    }
}

#[async_trait]
impl SnapshotTransport for HttpTransport {
    async fn send(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        let mut request = self.client.post(&self.endpoint).json(snapshot);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

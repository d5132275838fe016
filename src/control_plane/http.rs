use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{CapturePointRegistration, ControlPlane, ControlPlaneError};
use crate::breakpoint::BreakpointConfig;
use crate::config::AgentConfig;

const ACTIVE_BREAKPOINTS_PATH: &str = "/api/breakpoints/active";
const REGISTER_PATH: &str = "/api/breakpoints/register";

/// Control-plane client over HTTP + JSON
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    base_url: String,
    credential: Option<String>,
}

impl HttpControlPlane {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ControlPlaneError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, ControlPlaneError> {
        Self::new(
            config.control_plane_url.clone(),
            config.credential.clone(),
            config.request_timeout,
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(credential) => request.bearer_auth(credential),
            None => request,
        }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn fetch_active_breakpoints(
        &self,
        service: &str,
    ) -> Result<Vec<BreakpointConfig>, ControlPlaneError> {
        let request = self
            .client
            .get(self.endpoint(ACTIVE_BREAKPOINTS_PATH))
            .query(&[("service", service)]);
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }

    async fn register_capture_point(
        &self,
        registration: &CapturePointRegistration,
    ) -> Result<BreakpointConfig, ControlPlaneError> {
        let request = self
            .client
            .post(self.endpoint(REGISTER_PATH))
            .json(registration);
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ControlPlaneError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ControlPlaneError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

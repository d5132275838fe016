use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Default interval between full breakpoint syncs
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on any single control-plane or transport call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);

pub const DEFAULT_CONTROL_PLANE_URL: &str = "http://localhost:8787";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What to do with capture points whose registration keeps failing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationPolicy {
    /// Consecutive failures before an identity is fenced for the process
    /// lifetime. `None` retries on every capture call.
    pub max_failures: Option<u32>,
}

impl RegistrationPolicy {
    pub fn retry_forever() -> Self {
        Self { max_failures: None }
    }

    pub fn fence_after(max_failures: u32) -> Self {
        Self {
            max_failures: Some(max_failures),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Service name sent with every sync and registration
    pub service_name: String,
    /// Base URL of the control plane (and snapshot collector)
    pub control_plane_url: String,
    /// Opaque bearer credential passed through unchanged
    pub credential: Option<String>,
    /// Interval between full syncs
    pub sync_interval: Duration,
    /// Bound on each outbound call
    pub request_timeout: Duration,
    /// Global kill switch; when false `capture` does nothing
    pub enabled: bool,
    /// Include the textual call stack in snapshots
    pub capture_stack: bool,
    /// Use the `#[track_caller]` location when the stack has no usable frame
    pub caller_fallback: bool,
    /// Registration retry/fencing policy
    pub registration: RegistrationPolicy,
}

/// TOML representation of the registration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRegistrationConfig {
    pub max_failures: Option<u32>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlAgentConfig {
    pub service_name: Option<String>,
    pub control_plane_url: Option<String>,
    pub credential: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub enabled: Option<bool>,
    pub capture_stack: Option<bool>,
    pub caller_fallback: Option<bool>,
    pub registration: Option<TomlRegistrationConfig>,
}

impl AgentConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            credential: None,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enabled: true,
            capture_stack: true,
            caller_fallback: false,
            registration: RegistrationPolicy::default(),
        }
    }

    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into();
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_registration(mut self, policy: RegistrationPolicy) -> Self {
        self.registration = policy;
        self
    }

    /// Parse a TOML document, filling unset keys with defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlAgentConfig = toml::from_str(contents)?;
        let config = Self::from_toml(toml_config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
        Ok(config)
    }

    fn from_toml(toml_config: TomlAgentConfig) -> Result<Self, ConfigError> {
        let service_name = toml_config
            .service_name
            .ok_or_else(|| ConfigError::Invalid("service_name is required".into()))?;
        let mut config = Self::new(service_name);

        if let Some(url) = toml_config.control_plane_url {
            config.control_plane_url = url;
        }
        config.credential = toml_config.credential.filter(|c| !c.is_empty());
        if let Some(secs) = toml_config.sync_interval_secs {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = toml_config.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = toml_config.enabled {
            config.enabled = enabled;
        }
        if let Some(capture_stack) = toml_config.capture_stack {
            config.capture_stack = capture_stack;
        }
        if let Some(fallback) = toml_config.caller_fallback {
            config.caller_fallback = fallback;
        }
        if let Some(registration) = toml_config.registration {
            config.registration.max_failures = registration.max_failures;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("service_name must not be empty".into()));
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::Invalid("sync interval must be non-zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be non-zero".into()));
        }
        if self.registration.max_failures == Some(0) {
            return Err(ConfigError::Invalid(
                "registration.max_failures must be at least 1".into(),
            ));
        }
        if !self.control_plane_url.starts_with("http://")
            && !self.control_plane_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid(format!(
                "control_plane_url must be an http(s) URL, got {}",
                self.control_plane_url
            )));
        }
        Ok(())
    }
}

mod settings;

pub use settings::{
    AgentConfig, ConfigError, RegistrationPolicy, TomlAgentConfig, TomlRegistrationConfig,
    DEFAULT_CONTROL_PLANE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SYNC_INTERVAL,
};

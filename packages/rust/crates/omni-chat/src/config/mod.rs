//! Config namespace: runtime settings files and the resolved chat configuration.

mod chat;
mod settings;

pub use chat::{
    ChatConfig, DEFAULT_BIND_ADDR, DEFAULT_INSTRUCTIONS_PATH, DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
    DEFAULT_SESSION_SWEEP_INTERVAL_SECS, DEFAULT_TURN_TIMEOUT_SECS,
};
pub use settings::{
    GatewaySettings, LlmSettings, RuntimeSettings, SessionSettings, load_runtime_settings,
    load_runtime_settings_from_paths, runtime_settings_paths, set_config_home_override,
};

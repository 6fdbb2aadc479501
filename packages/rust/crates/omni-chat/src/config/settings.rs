//! Runtime settings loader for omni-chat.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/omni-chat/settings.yaml`
//!
//! Merge precedence is user over system.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "omni-chat/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSettings {
    pub inference_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSettings {
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewaySettings {
    pub bind: Option<String>,
    pub turn_timeout_secs: Option<u64>,
    pub max_concurrent_turns: Option<usize>,
    pub instructions_path: Option<String>,
}

impl RuntimeSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            llm: self.llm.merge(overlay.llm),
            session: self.session.merge(overlay.session),
            gateway: self.gateway.merge(overlay.gateway),
        }
    }
}

impl LlmSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            inference_url: overlay.inference_url.or(self.inference_url),
            model: overlay.model.or(self.model),
            max_tokens: overlay.max_tokens.or(self.max_tokens),
            temperature: overlay.temperature.or(self.temperature),
        }
    }
}

impl SessionSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            idle_timeout_secs: overlay.idle_timeout_secs.or(self.idle_timeout_secs),
            sweep_interval_secs: overlay.sweep_interval_secs.or(self.sweep_interval_secs),
        }
    }
}

impl GatewaySettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            bind: overlay.bind.or(self.bind),
            turn_timeout_secs: overlay.turn_timeout_secs.or(self.turn_timeout_secs),
            max_concurrent_turns: overlay.max_concurrent_turns.or(self.max_concurrent_turns),
            instructions_path: overlay.instructions_path.or(self.instructions_path),
        }
    }
}

/// Load merged runtime settings (user overrides system).
pub fn load_runtime_settings() -> RuntimeSettings {
    let (system_path, user_path) = runtime_settings_paths();
    load_runtime_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
pub fn runtime_settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
pub fn load_runtime_settings_from_paths(system: &Path, user: &Path) -> RuntimeSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> RuntimeSettings {
    if !path.exists() {
        return RuntimeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return RuntimeSettings::default();
        }
    };
    match serde_yaml::from_str::<RuntimeSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            RuntimeSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    env_path("PRJ_ROOT")
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Pin the directory holding `omni-chat/settings.yaml` (CLI `--conf`).
///
/// Relative paths resolve against `PRJ_ROOT` (or the working directory). Only the first call
/// takes effect.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let requested = path.into();
    if requested.as_os_str().is_empty() {
        return;
    }
    let active = CONFIG_HOME_OVERRIDE.get_or_init(|| requested.clone());
    if *active != requested {
        tracing::warn!(
            active = %active.display(),
            ignored = %requested.display(),
            "config home already pinned; keeping the first value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    let config_home = CONFIG_HOME_OVERRIDE
        .get()
        .cloned()
        .or_else(|| env_path("PRJ_CONFIG_HOME"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_HOME_RELATIVE_PATH));
    if config_home.is_absolute() {
        config_home
    } else {
        project_root.join(config_home)
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

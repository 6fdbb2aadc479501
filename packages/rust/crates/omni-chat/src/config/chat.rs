//! Chat service configuration: inference endpoint, model, credential, session lifetime.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::llm::{DEFAULT_INFERENCE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

use super::settings::RuntimeSettings;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_INSTRUCTIONS_PATH: &str = "skills.md";
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 3_600;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Process-wide settings, resolved once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Full chat-completions URL.
    pub inference_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Instructions document injected as the system message.
    pub instructions_path: PathBuf,
    pub bind_addr: String,
    /// Bound on one reply generation.
    pub turn_timeout_secs: u64,
    /// `None` = no limit on concurrent chat turns.
    pub max_concurrent_turns: Option<usize>,
    pub session_idle_timeout_secs: u64,
    pub session_sweep_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            inference_url: DEFAULT_INFERENCE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            instructions_path: PathBuf::from(DEFAULT_INSTRUCTIONS_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            turn_timeout_secs: DEFAULT_TURN_TIMEOUT_SECS,
            max_concurrent_turns: None,
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            session_sweep_interval_secs: DEFAULT_SESSION_SWEEP_INTERVAL_SECS,
        }
    }
}

impl ChatConfig {
    /// Resolve from runtime settings and the process environment (env wins over settings).
    pub fn from_env(settings: &RuntimeSettings) -> Result<Self> {
        Self::from_sources(settings, |name| std::env::var(name).ok())
    }

    /// Resolve from runtime settings and an explicit environment lookup.
    pub fn from_sources(
        settings: &RuntimeSettings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let inference_url = first_env(&env, &["OMNI_CHAT_INFERENCE_URL"])
            .or_else(|| settings.llm.inference_url.clone().and_then(non_empty_string))
            .unwrap_or(defaults.inference_url);
        let model = first_env(&env, &["OMNI_CHAT_MODEL", "HF_MODEL"])
            .or_else(|| settings.llm.model.clone().and_then(non_empty_string))
            .unwrap_or(defaults.model);
        let api_key = first_env(&env, &["OMNI_CHAT_API_KEY", "HUGGINGFACE_API_TOKEN"]);
        let instructions_path = first_env(&env, &["OMNI_CHAT_INSTRUCTIONS", "SKILLS_FILE"])
            .or_else(|| {
                settings
                    .gateway
                    .instructions_path
                    .clone()
                    .and_then(non_empty_string)
            })
            .map_or(defaults.instructions_path, PathBuf::from);

        let session_idle_timeout_secs = parse_positive_u64(
            first_env(&env, &["OMNI_CHAT_SESSION_IDLE_TIMEOUT_SECS"]),
            "OMNI_CHAT_SESSION_IDLE_TIMEOUT_SECS",
            settings.session.idle_timeout_secs,
            defaults.session_idle_timeout_secs,
        )?;
        let session_sweep_interval_secs = parse_positive_u64(
            first_env(&env, &["OMNI_CHAT_SESSION_SWEEP_INTERVAL_SECS"]),
            "OMNI_CHAT_SESSION_SWEEP_INTERVAL_SECS",
            settings.session.sweep_interval_secs,
            defaults.session_sweep_interval_secs,
        )?;

        let temperature = settings.llm.temperature.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            bail!("llm.temperature must be within 0.0..=2.0 (got {temperature})");
        }

        let config = Self {
            inference_url,
            model,
            api_key,
            max_tokens: settings
                .llm
                .max_tokens
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_tokens),
            temperature,
            instructions_path,
            bind_addr: settings
                .gateway
                .bind
                .clone()
                .and_then(non_empty_string)
                .unwrap_or(defaults.bind_addr),
            turn_timeout_secs: settings
                .gateway
                .turn_timeout_secs
                .filter(|value| *value > 0)
                .unwrap_or(defaults.turn_timeout_secs),
            max_concurrent_turns: settings
                .gateway
                .max_concurrent_turns
                .filter(|value| *value > 0),
            session_idle_timeout_secs,
            session_sweep_interval_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that make every slow turn lose its session.
    ///
    /// A session idle timeout shorter than the turn timeout lets the sweeper evict a session
    /// while its reply is still being generated.
    pub fn validate(&self) -> Result<()> {
        if self.session_idle_timeout_secs < self.turn_timeout_secs {
            bail!(
                "session idle timeout ({}s) must not be shorter than the turn timeout ({}s)",
                self.session_idle_timeout_secs,
                self.turn_timeout_secs
            );
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_env(env: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|&name| env(name).and_then(non_empty_string))
}

fn parse_positive_u64(
    raw: Option<String>,
    name: &str,
    setting: Option<u64>,
    default: u64,
) -> Result<u64> {
    if let Some(raw) = raw {
        let parsed = raw
            .parse::<u64>()
            .with_context(|| format!("invalid value for {name}: `{raw}`"))?;
        if parsed == 0 {
            bail!("{name} must be greater than 0");
        }
        return Ok(parsed);
    }
    Ok(setting.filter(|value| *value > 0).unwrap_or(default))
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use omni_chat::{
    ChatConfig, ConversationService, IdleSweeper, LlmClient, SessionStore, load_instructions,
    spawn_idle_sweeper,
};

/// Running service plus the background task that must be stopped on shutdown.
pub(crate) struct BuiltService {
    pub(crate) service: ConversationService,
    pub(crate) sweeper: IdleSweeper,
}

/// CLI values that take precedence over env and settings.
#[derive(Default)]
pub(crate) struct CliOverrides {
    pub(crate) bind: Option<String>,
    pub(crate) turn_timeout_secs: Option<u64>,
    pub(crate) max_concurrent_turns: Option<usize>,
    pub(crate) instructions: Option<PathBuf>,
}

pub(crate) fn apply_cli_overrides(mut config: ChatConfig, overrides: CliOverrides) -> ChatConfig {
    if let Some(bind) = overrides.bind.filter(|value| !value.trim().is_empty()) {
        config.bind_addr = bind;
    }
    if let Some(secs) = overrides.turn_timeout_secs.filter(|value| *value > 0) {
        config.turn_timeout_secs = secs;
    }
    if let Some(max) = overrides.max_concurrent_turns {
        config.max_concurrent_turns = (max > 0).then_some(max);
    }
    if let Some(path) = overrides.instructions {
        config.instructions_path = path;
    }
    config
}

pub(crate) fn build_service(config: &ChatConfig) -> Result<BuiltService> {
    config.validate()?;
    let instructions = load_instructions(&config.instructions_path)?;
    let api_key = config.api_key.clone();
    if api_key.is_none() {
        tracing::warn!(
            inference_url = %config.inference_url,
            "no API key configured; inference requests are sent unauthenticated"
        );
    }
    let llm = LlmClient::new(
        config.inference_url.clone(),
        config.model.clone(),
        api_key,
    )
    .with_sampling(config.max_tokens, config.temperature);
    tracing::info!(
        model = %llm.model(),
        inference_url = %llm.inference_url(),
        idle_timeout_secs = config.session_idle_timeout_secs,
        "chat service configured"
    );

    let store = SessionStore::with_idle_timeout(config.session_idle_timeout());
    let sweeper = spawn_idle_sweeper(
        store.clone(),
        config.session_idle_timeout(),
        config.session_sweep_interval(),
    );
    let service = ConversationService::new(store, Arc::new(llm), instructions)
        .with_generation_timeout(config.turn_timeout());
    Ok(BuiltService { service, sweeper })
}

#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::PathBuf;

use omni_chat::{
    ChatConfig, DEFAULT_INSTRUCTIONS, DEFAULT_MODEL, DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
    RuntimeSettings, load_instructions, load_runtime_settings_from_paths,
};
use tempfile::TempDir;

fn write_file(path: PathBuf, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars = pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect::<HashMap<_, _>>();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn merge_user_overrides_system() {
    let tmp = TempDir::new().expect("tempdir");
    let system = tmp.path().join("packages/conf/settings.yaml");
    let user = tmp.path().join(".config/omni-chat/settings.yaml");

    write_file(
        system.clone(),
        r#"
llm:
  model: "system-model"
  max_tokens: 512
  temperature: 0.2
session:
  idle_timeout_secs: 900
  sweep_interval_secs: 30
gateway:
  bind: "127.0.0.1:9000"
  turn_timeout_secs: 60
  instructions_path: "system-skills.md"
"#,
    );
    write_file(
        user.clone(),
        r#"
llm:
  model: "user-model"
session:
  idle_timeout_secs: 1800
gateway:
  max_concurrent_turns: 8
"#,
    );

    let settings = load_runtime_settings_from_paths(&system, &user);
    assert_eq!(settings.llm.model.as_deref(), Some("user-model"));
    assert_eq!(settings.llm.max_tokens, Some(512));
    assert_eq!(settings.llm.temperature, Some(0.2));
    assert_eq!(settings.session.idle_timeout_secs, Some(1800));
    assert_eq!(settings.session.sweep_interval_secs, Some(30));
    assert_eq!(settings.gateway.bind.as_deref(), Some("127.0.0.1:9000"));
    assert_eq!(settings.gateway.turn_timeout_secs, Some(60));
    assert_eq!(settings.gateway.max_concurrent_turns, Some(8));
    assert_eq!(
        settings.gateway.instructions_path.as_deref(),
        Some("system-skills.md")
    );
}

#[test]
fn missing_or_invalid_files_fall_back_to_defaults() {
    let tmp = TempDir::new().expect("tempdir");
    let system = tmp.path().join("absent.yaml");
    let user = tmp.path().join("broken.yaml");
    write_file(user.clone(), "llm: [not, a, mapping");

    let settings = load_runtime_settings_from_paths(&system, &user);
    assert!(settings.llm.model.is_none());
    assert!(settings.session.idle_timeout_secs.is_none());
    assert!(settings.gateway.bind.is_none());
}

#[test]
fn chat_config_defaults_without_settings_or_env() {
    let config = ChatConfig::from_sources(&RuntimeSettings::default(), env_of(&[]))
        .expect("config");
    assert_eq!(config.model, DEFAULT_MODEL);
    assert!(config.api_key.is_none());
    assert_eq!(
        config.session_idle_timeout_secs,
        DEFAULT_SESSION_IDLE_TIMEOUT_SECS
    );
    assert_eq!(config.session_sweep_interval_secs, 60);
    assert_eq!(config.turn_timeout_secs, 120);
    assert_eq!(config.bind_addr, "0.0.0.0:8000");
    assert_eq!(config.instructions_path, PathBuf::from("skills.md"));
    assert!(config.max_concurrent_turns.is_none());
}

#[test]
fn chat_config_env_overrides_settings() {
    let mut settings = RuntimeSettings::default();
    settings.llm.model = Some("settings-model".to_string());
    settings.session.idle_timeout_secs = Some(900);
    settings.gateway.instructions_path = Some("settings-skills.md".to_string());

    let config = ChatConfig::from_sources(
        &settings,
        env_of(&[
            ("HF_MODEL", "env-model"),
            ("HUGGINGFACE_API_TOKEN", " hf_token "),
            ("OMNI_CHAT_SESSION_IDLE_TIMEOUT_SECS", "450"),
            ("SKILLS_FILE", "/etc/skills.md"),
        ]),
    )
    .expect("config");

    assert_eq!(config.model, "env-model");
    assert_eq!(config.api_key.as_deref(), Some("hf_token"));
    assert_eq!(config.session_idle_timeout_secs, 450);
    assert_eq!(config.instructions_path, PathBuf::from("/etc/skills.md"));
}

#[test]
fn chat_config_prefers_specific_env_names() {
    let config = ChatConfig::from_sources(
        &RuntimeSettings::default(),
        env_of(&[("OMNI_CHAT_MODEL", "primary"), ("HF_MODEL", "fallback")]),
    )
    .expect("config");
    assert_eq!(config.model, "primary");
}

#[test]
fn chat_config_rejects_invalid_session_env_values() {
    let zero = ChatConfig::from_sources(
        &RuntimeSettings::default(),
        env_of(&[("OMNI_CHAT_SESSION_SWEEP_INTERVAL_SECS", "0")]),
    );
    assert!(zero.is_err());

    let garbage = ChatConfig::from_sources(
        &RuntimeSettings::default(),
        env_of(&[("OMNI_CHAT_SESSION_IDLE_TIMEOUT_SECS", "soon")]),
    );
    let message = format!("{:#}", garbage.expect_err("invalid number"));
    assert!(message.contains("OMNI_CHAT_SESSION_IDLE_TIMEOUT_SECS"));
}

#[test]
fn chat_config_api_key_comes_only_from_resolved_sources() {
    let config = ChatConfig::from_sources(
        &RuntimeSettings::default(),
        env_of(&[("OMNI_CHAT_API_KEY", "   "), ("HUGGINGFACE_API_TOKEN", "")]),
    )
    .expect("config");
    assert!(config.api_key.is_none());
}

#[test]
fn chat_config_rejects_idle_timeout_shorter_than_turn_timeout() {
    let mut settings = RuntimeSettings::default();
    settings.gateway.turn_timeout_secs = Some(300);
    settings.session.idle_timeout_secs = Some(120);
    let error = ChatConfig::from_sources(&settings, env_of(&[])).expect_err("too short");
    assert!(format!("{error:#}").contains("turn timeout"));

    settings.session.idle_timeout_secs = Some(300);
    assert!(ChatConfig::from_sources(&settings, env_of(&[])).is_ok());

    let overridden = ChatConfig {
        turn_timeout_secs: 7_200,
        ..ChatConfig::default()
    };
    assert!(overridden.validate().is_err());
}

#[test]
fn chat_config_rejects_out_of_range_temperature() {
    let mut settings = RuntimeSettings::default();
    settings.llm.temperature = Some(3.5);
    assert!(ChatConfig::from_sources(&settings, env_of(&[])).is_err());
}

#[test]
fn instructions_fall_back_when_file_is_missing() {
    let tmp = TempDir::new().expect("tempdir");
    let loaded = load_instructions(&tmp.path().join("skills.md")).expect("fallback");
    assert_eq!(loaded, DEFAULT_INSTRUCTIONS);
}

#[test]
fn instructions_are_read_verbatim() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("skills.md");
    write_file(path.clone(), "# Skills\n\nAnswer in one sentence.\n");

    let loaded = load_instructions(&path).expect("instructions");
    assert_eq!(loaded, "# Skills\n\nAnswer in one sentence.\n");
}

#[test]
fn instructions_path_that_is_a_directory_is_an_error() {
    let tmp = TempDir::new().expect("tempdir");
    assert!(load_instructions(tmp.path()).is_err());
}

//! omni-chat CLI: gateway or stdio mode.
//!
//! Logging: set `RUST_LOG=omni_chat=info` (or `warn`, `debug`) to see logs on stderr.

mod cli;
mod service_builder;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni_chat::{ChatConfig, load_runtime_settings, run_http, run_stdio, set_config_home_override};

use crate::cli::{Cli, Command};
use crate::service_builder::{CliOverrides, apply_cli_overrides, build_service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    // RUST_LOG overrides; else info
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omni_chat=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let runtime_settings = load_runtime_settings();
    let config = ChatConfig::from_env(&runtime_settings)?;

    match cli.command {
        Command::Gateway {
            bind,
            turn_timeout,
            max_concurrent,
            instructions,
        } => {
            let config = apply_cli_overrides(
                config,
                CliOverrides {
                    bind,
                    turn_timeout_secs: turn_timeout,
                    max_concurrent_turns: max_concurrent,
                    instructions,
                },
            );
            let built = build_service(&config)?;
            let result = run_http(
                built.service,
                &config.bind_addr,
                config.max_concurrent_turns,
            )
            .await;
            built.sweeper.stop().await;
            result
        }
        Command::Stdio {
            session_id,
            instructions,
        } => {
            let config = apply_cli_overrides(
                config,
                CliOverrides {
                    instructions,
                    ..CliOverrides::default()
                },
            );
            let built = build_service(&config)?;
            let result = run_stdio(built.service, session_id).await;
            built.sweeper.stop().await;
            result
        }
    }
}

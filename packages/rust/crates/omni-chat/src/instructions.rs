//! Static instructions document, loaded once at startup and injected into every generation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::observability::SessionEvent;

/// Used when no instructions file is present.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// Read the instructions document at `path`.
///
/// A missing file falls back to [`DEFAULT_INSTRUCTIONS`]; a file that exists but cannot be read
/// is an error.
pub fn load_instructions(path: &Path) -> Result<String> {
    if !path.exists() {
        tracing::warn!(
            event = SessionEvent::InstructionsFallback.as_str(),
            path = %path.display(),
            "instructions file not found; using default instructions"
        );
        return Ok(DEFAULT_INSTRUCTIONS.to_string());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read instructions file: {}", path.display()))?;
    tracing::info!(
        event = SessionEvent::InstructionsLoaded.as_str(),
        path = %path.display(),
        chars = raw.chars().count(),
        "instructions loaded"
    );
    Ok(raw)
}

//! Loading a [`DocumentContext`] from a TOML or JSON file.

use anyhow::{bail, Context, Result};
use std::path::Path;

use redraft_core::DocumentContext;

pub fn load_context(path: &Path) -> Result<DocumentContext> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Some("toml") | None => {
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        }
        Some(other) => bail!(
            "Unsupported context file extension '.{}' (expected .toml or .json)",
            other
        ),
    }
}

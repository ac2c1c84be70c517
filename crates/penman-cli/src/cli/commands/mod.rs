//! CLI command handlers.

pub mod api;
pub mod config;
pub mod export;
pub mod generate;
pub mod preview;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use penman_core::config::Config;
use penman_core::profile::{DocumentType, ProfileForm};

/// Reads a saved document.
fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))
}

/// Reads a profile JSON file.
fn load_profile(path: &Path) -> Result<ProfileForm> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read profile {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse profile {}", path.display()))
}

/// The explicit document type, or the configured default.
fn resolve_document_type(explicit: Option<&str>, config: &Config) -> Result<DocumentType> {
    match explicit {
        Some(raw) => raw.parse().map_err(|e: String| {
            let valid: Vec<&str> = DocumentType::all().iter().map(|t| t.as_str()).collect();
            anyhow!("{e}. Valid options: {}", valid.join(", "))
        }),
        None => Ok(config.document_type),
    }
}

//! Config command handlers.

use anyhow::{Context, Result};
use penman_core::config;
use penman_core::profile::DocumentType;

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn generate() -> Result<()> {
    let toml = config::Config::generate()?;
    print!("{toml}");
    Ok(())
}

pub fn set_type(raw: &str) -> Result<()> {
    let document_type: DocumentType = raw.parse().map_err(anyhow::Error::msg)?;
    config::Config::save_document_type(document_type).context("save document type")?;
    println!("Default document type set to {document_type}");
    Ok(())
}

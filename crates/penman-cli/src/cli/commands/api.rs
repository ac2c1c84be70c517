//! Auxiliary API command handlers.

use std::path::Path;

use anyhow::{Context, Result, bail};
use penman_core::client::{ApiResponse, GenerationClient};
use penman_core::config::Config;

pub async fn types(config: &Config) -> Result<()> {
    let client = GenerationClient::from_config(config)?;
    let response = client.document_types().await.context("list document types")?;
    print_response(&response)
}

pub async fn validate(config: &Config, profile: &Path) -> Result<()> {
    let form = super::load_profile(profile)?;
    let client = GenerationClient::from_config(config)?;
    let response = client.validate(&form).await.context("validate profile")?;
    print_response(&response)
}

pub async fn save(
    config: &Config,
    input: &Path,
    profile: &Path,
    document_type: Option<&str>,
) -> Result<()> {
    let content = super::read_document(input)?;
    let form = super::load_profile(profile)?;
    let document_type = super::resolve_document_type(document_type, config)?;
    let client = GenerationClient::from_config(config)?;
    let response = client
        .save_document(&content, &form, document_type)
        .await
        .context("save document")?;
    print_response(&response)
}

pub async fn history(config: &Config, user_id: &str) -> Result<()> {
    let client = GenerationClient::from_config(config)?;
    let response = client
        .user_documents(user_id)
        .await
        .with_context(|| format!("list documents for {user_id}"))?;
    print_response(&response)
}

/// Prints `data` (or the message) as JSON; an unsuccessful envelope is an error.
fn print_response(response: &ApiResponse) -> Result<()> {
    if !response.success {
        let reason = response
            .error
            .as_deref()
            .or(response.message.as_deref())
            .unwrap_or("request was not successful");
        bail!("Service error: {reason}");
    }
    match (&response.data, &response.message) {
        (Some(data), _) => println!("{}", serde_json::to_string_pretty(data)?),
        (None, Some(message)) => println!("{message}"),
        (None, None) => println!("ok"),
    }
    Ok(())
}

//! Configuration management for penman.
//!
//! Loads configuration from ${PENMAN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::profile::DocumentType;

/// Generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the generation service (endpoints are appended to it).
    pub base_url: String,
    /// Request timeout in seconds (0 disables).
    pub timeout_secs: u32,
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

    /// Returns the request timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 0,
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported files are written to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Format used when none is given on the command line.
    pub default_format: String,
    /// Font used to rasterize PDF exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    /// Optional bold face for headings and strong runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold_font_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            default_format: "pdf".to_string(),
            font_path: None,
            bold_font_path: None,
        }
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Parses the commented template and lays `overlay` values over it.
///
/// Keys missing from the overlay keep the template's value and comments.
fn template_with(overlay: &str) -> Result<toml_edit::DocumentMut> {
    let mut doc: toml_edit::DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let overlay: toml_edit::DocumentMut = overlay.parse().context("Failed to parse config")?;
    overlay_table(doc.as_table_mut(), overlay.as_table());
    Ok(doc)
}

fn overlay_table(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, item) in source.iter() {
        match item {
            Item::None => {}
            Item::Table(src) => match target.get_mut(key) {
                Some(Item::Table(dst)) => overlay_table(dst, src),
                _ => target[key] = item.clone(),
            },
            _ => target[key] = item.clone(),
        }
    }
}

pub mod paths {
    //! Path resolution for penman configuration and data directories.
    //!
    //! PENMAN_HOME resolution order:
    //! 1. PENMAN_HOME environment variable (if set)
    //! 2. ~/.config/penman (default)

    use std::path::PathBuf;

    /// Returns the penman home directory.
    pub fn penman_home() -> PathBuf {
        if let Ok(home) = std::env::var("PENMAN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".penman"),
            |h| h.join(".config").join("penman"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        penman_home().join("config.toml")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document type requested when none is given explicitly.
    pub document_type: DocumentType,

    /// Generation service settings.
    pub api: ApiConfig,

    /// Export settings.
    pub export: ExportConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the service base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not a valid absolute URL.
    pub fn resolve_base_url(&self) -> Result<String> {
        resolve_base_url(
            Some(&self.api.base_url),
            "PENMAN_API_URL",
            ApiConfig::DEFAULT_BASE_URL,
        )
    }

    /// Saves only the `document_type` field to the default config file.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, merged, or written.
    pub fn save_document_type(document_type: DocumentType) -> Result<()> {
        Self::save_document_type_to(&paths::config_path(), document_type)
    }

    /// Saves only the `document_type` field to a specific config file path.
    ///
    /// Creates the file with the default template if it doesn't exist.
    /// If the file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, merged, or written.
    pub fn save_document_type_to(path: &Path, document_type: DocumentType) -> Result<()> {
        let user_config = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            String::new()
        };

        let mut doc = template_with(&user_config)
            .with_context(|| format!("Failed to merge config from {}", path.display()))?;
        doc["document_type"] = toml_edit::value(document_type.as_str());

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a config file with the default template.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Renders `Config::default()` into the commented template.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        let defaults = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;
        Ok(template_with(&defaults)?.to_string())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write config for {}", path.display()))?;
        file.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Resolves a base URL with precedence: env > config > default.
fn resolve_base_url(config_base_url: Option<&str>, env_var: &str, default_url: &str) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid generation service URL: {url}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.document_type, DocumentType::PersonalStatement);
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.export.default_format, "pdf");
        assert!(config.api.timeout().is_none());
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "document_type = \"motivation_letter\"\n[api]\ntimeout_secs = 30\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.document_type, DocumentType::MotivationLetter);
        assert_eq!(config.api.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert!(config.export.font_path.is_none());
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "document_type = [").unwrap();

        assert!(Config::load_from(&config_path).is_err());
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("document_type = \"personal_statement\""));
        assert!(contents.contains("# font_path ="));
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_save_document_type_preserves_user_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[api]\nbase_url = \"http://example.test/api\"\n").unwrap();

        Config::save_document_type_to(&config_path, DocumentType::CoverLetter).unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.document_type, DocumentType::CoverLetter);
        assert_eq!(config.api.base_url, "http://example.test/api");
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("# penman configuration"));
    }

    #[test]
    fn test_save_document_type_creates_missing_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        Config::save_document_type_to(&config_path, DocumentType::MotivationLetter).unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("document_type = \"motivation_letter\""));
        assert!(contents.contains("timeout_secs = 0"));
        let entries: Vec<_> = fs::read_dir(config_path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("config.toml")]);
    }

    #[test]
    fn test_overlay_keeps_template_keys_in_nested_tables() {
        let doc = template_with("[export]\ndefault_format = \"txt\"\n").unwrap();
        let rendered = doc.to_string();

        assert!(rendered.contains("default_format = \"txt\""));
        assert!(rendered.contains("# Optional bold face"));
        assert!(rendered.contains("base_url = \"http://localhost:8000/api\""));
    }

    #[test]
    fn test_generate_matches_defaults() {
        let generated = Config::generate().unwrap();
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed.api.base_url, ApiConfig::DEFAULT_BASE_URL);
        assert_eq!(parsed.document_type, DocumentType::PersonalStatement);
    }

    #[test]
    fn test_resolve_base_url_prefers_config_over_default() {
        let url = resolve_base_url(
            Some("http://example.test/api/"),
            "PENMAN_TEST_UNSET_URL_VAR",
            "http://default.test",
        )
        .unwrap();
        assert_eq!(url, "http://example.test/api");
    }

    #[test]
    fn test_resolve_base_url_rejects_invalid() {
        let result = resolve_base_url(
            Some("not a url"),
            "PENMAN_TEST_UNSET_URL_VAR",
            "http://default.test",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_base_url_falls_back_to_default() {
        let url =
            resolve_base_url(Some("  "), "PENMAN_TEST_UNSET_URL_VAR", "http://default.test").unwrap();
        assert_eq!(url, "http://default.test");
    }
}

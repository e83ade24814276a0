//! Application configuration for docsagent.
//!
//! User config lives at `~/.docsagent/docsagent.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsAgentError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docsagent.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docsagent";

// ---------------------------------------------------------------------------
// Config structs (matching docsagent.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Documentation scope (domain + path prefix).
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Sitemap resolution settings.
    #[serde(default)]
    pub sitemap: SitemapConfig,

    /// Section extraction limits.
    #[serde(default)]
    pub sections: SectionsConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[scope]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Root domain; subdomains are accepted too.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Root path prefix.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            path: default_path(),
        }
    }
}

fn default_domain() -> String {
    "example.com".into()
}
fn default_path() -> String {
    "/docs".into()
}

/// `[sitemap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Sitemap (or sitemap index) to start from.
    #[serde(default = "default_sitemap_url")]
    pub root_url: String,

    /// Upper bound on in-flight sitemap fetches. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            root_url: default_sitemap_url(),
            max_concurrent_fetches: None,
        }
    }
}

fn default_sitemap_url() -> String {
    "https://example.com/sitemap.xml".into()
}

/// `[sections]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionsConfig {
    /// Serialized-markup budget used when the caller gives none.
    #[serde(default = "default_size_limit")]
    pub default_size_limit: usize,

    /// Largest budget a caller may ask for.
    #[serde(default = "default_max_size_limit")]
    pub max_size_limit: usize,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        Self {
            default_size_limit: default_size_limit(),
            max_size_limit: default_max_size_limit(),
        }
    }
}

fn default_size_limit() -> usize {
    5000
}
fn default_max_size_limit() -> usize {
    20_000
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Client-level request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

impl AppConfig {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.scope.domain.trim().is_empty() {
            return Err(DocsAgentError::config("scope.domain must not be empty"));
        }
        if self.sections.default_size_limit == 0 || self.sections.max_size_limit == 0 {
            return Err(DocsAgentError::config("section size limits must be positive"));
        }
        if self.sections.default_size_limit > self.sections.max_size_limit {
            return Err(DocsAgentError::config(format!(
                "sections.default_size_limit ({}) exceeds sections.max_size_limit ({})",
                self.sections.default_size_limit, self.sections.max_size_limit
            )));
        }
        if self.sitemap.max_concurrent_fetches == Some(0) {
            return Err(DocsAgentError::config(
                "sitemap.max_concurrent_fetches must be at least 1",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docsagent/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsAgentError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docsagent/docsagent.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsAgentError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocsAgentError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsAgentError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocsAgentError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsAgentError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("domain"));
        assert!(toml_str.contains("default_size_limit = 5000"));
        assert!(!toml_str.contains("max_concurrent_fetches"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scope.path, "/docs");
        assert_eq!(parsed.sections.max_size_limit, 20_000);
        assert_eq!(parsed.fetch.max_redirects, 5);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[scope]
domain = "docs.internal.test"

[sitemap]
max_concurrent_fetches = 8
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.scope.domain, "docs.internal.test");
        assert_eq!(config.scope.path, "/docs");
        assert_eq!(config.sitemap.max_concurrent_fetches, Some(8));
        assert_eq!(config.sitemap.root_url, "https://example.com/sitemap.xml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_inverted_limits() {
        let mut config = AppConfig::default();
        config.sections.default_size_limit = 30_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn validation_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.sitemap.max_concurrent_fetches = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join(format!("docsagent-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("docsagent.toml");
        std::fs::write(&path, "[sections]\ndefault_size_limit = 1200\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.sections.default_size_limit, 1200);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/docsagent.toml")).unwrap_err();
        assert!(matches!(err, DocsAgentError::Io { .. }));
    }
}

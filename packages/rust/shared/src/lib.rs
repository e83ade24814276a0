//! Shared error model, configuration, URL scope and fetch capability for docsagent.
//!
//! This crate is the foundation depended on by all other docsagent crates.
//! It provides:
//! - [`DocsAgentError`] — the unified error type
//! - [`UrlScope`] — the domain + path predicate every fetched or reported URL must pass
//! - [`DocumentFetcher`] / [`HttpFetcher`] — the network boundary
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod fetch;
pub mod scope;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, ScopeConfig, SectionsConfig, SitemapConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocsAgentError, Result};
pub use fetch::{DocumentFetcher, FetchedDocument, HttpFetcher};
pub use scope::UrlScope;

//! Documentation scope: the domain + path prefix that URLs must fall under
//! before they are fetched or reported.

use url::Url;

use crate::config::ScopeConfig;

/// Determines which URLs are "in scope" for the documentation set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlScope {
    /// Root domain, lowercased. Subdomains are accepted too.
    domain: String,
    /// Root path without a trailing slash. Empty means the whole host.
    path: String,
}

impl UrlScope {
    /// Build a scope from a root domain and a root path prefix.
    pub fn new(domain: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        let domain = domain.as_ref().trim().trim_end_matches('.').to_ascii_lowercase();

        let path = path.as_ref().trim().trim_end_matches('/');
        let path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self { domain, path }
    }

    /// The configured root domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The configured root path (`/` when the whole host is in scope).
    pub fn path(&self) -> &str {
        if self.path.is_empty() { "/" } else { &self.path }
    }

    /// Parse `url` and check it against the scope. Unparsable input is out of scope.
    pub fn is_in_scope(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.contains(&parsed),
            Err(_) => false,
        }
    }

    /// Check an already-parsed URL against the scope.
    pub fn contains(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        let host_ok = host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'));
        if !host_ok {
            return false;
        }

        if self.path.is_empty() {
            return true;
        }

        let path = url.path();
        path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl From<&ScopeConfig> for UrlScope {
    fn from(config: &ScopeConfig) -> Self {
        Self::new(&config.domain, &config.path)
    }
}

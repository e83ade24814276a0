//! Document fetch capability.
//!
//! The sitemap resolver and the section extractor never talk to the network
//! directly; they go through a [`DocumentFetcher`]. [`HttpFetcher`] is the
//! production implementation over `reqwest`.
//!
//! A fetcher built with [`HttpFetcher::scoped`] only follows redirects that
//! stay inside its [`UrlScope`]; a hop that leaves the scope fails with
//! [`DocsAgentError::OutOfScope`] naming the redirect target.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, redirect};
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::{DocsAgentError, Result};
use crate::scope::UrlScope;

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("docsagent/", env!("CARGO_PKG_VERSION"));

/// A fetched document: final status and body text.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The URL that was requested.
    pub url: String,
    /// HTTP status code of the final response (after redirects).
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl FetchedDocument {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success outcome into [`DocsAgentError::Http`] naming the URL.
    pub fn into_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DocsAgentError::http(self.url, self.status))
        }
    }
}

/// Something that can GET a document by URL.
///
/// Implementations return `Ok` for any HTTP response, successful or not;
/// deciding what a non-success status means is left to the caller.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url`, following redirects.
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// [`DocumentFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    scope: Option<UrlScope>,
}

impl HttpFetcher {
    /// Build a fetcher with the given client settings. Redirects are followed
    /// wherever they lead, up to `max_redirects` hops.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let policy = redirect::Policy::limited(config.max_redirects);
        Ok(Self {
            client: build_client(config, policy)?,
            scope: None,
        })
    }

    /// Build a fetcher that refuses to follow a redirect out of `scope`.
    pub fn scoped(config: &FetchConfig, scope: UrlScope) -> Result<Self> {
        let max = config.max_redirects;
        let allowed = scope.clone();
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max {
                attempt.error("too many redirects")
            } else if allowed.contains(attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        Ok(Self {
            client: build_client(config, policy)?,
            scope: Some(scope),
        })
    }
}

fn build_client(config: &FetchConfig, policy: redirect::Policy) -> Result<Client> {
    let user_agent = config.user_agent.as_deref().unwrap_or(USER_AGENT);

    Client::builder()
        .user_agent(user_agent)
        .redirect(policy)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DocsAgentError::Network(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        debug!(%url, "fetching document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DocsAgentError::Network(format!("{url}: {e}")))?;

        // The scoped policy stops on an off-scope hop and hands back the 3xx.
        if self.scope.is_some() && response.status().is_redirection() {
            let target = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| response.url().join(location).ok())
                .map(|target| target.to_string())
                .unwrap_or_else(|| response.url().to_string());
            warn!(%url, %target, "redirect leaves documentation scope");
            return Err(DocsAgentError::out_of_scope(target));
        }

        let status = response.status().as_u16();

        let body = response
            .text()
            .await
            .map_err(|e| DocsAgentError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(%url, status, body_len = body.len(), "document fetched");

        Ok(FetchedDocument {
            url: url.to_string(),
            status,
            body,
        })
    }
}

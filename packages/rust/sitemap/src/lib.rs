//! Sitemap resolution.
//!
//! Expands a sitemap tree (an index pointing at child sitemaps, or a leaf
//! listing pages) into a flat, scope-filtered list of [`SitemapEntry`].
//!
//! Ordering is depth-first in listing order: an index's children are fetched
//! concurrently, and the fetched tree is then walked in the order the index
//! lists them. Each sitemap URL is fetched at most once per
//! [`SitemapResolver::resolve`] call and contributes entries only at its first
//! position in that walk, so a child shared by two branches always lands in
//! the earlier branch and self-referencing indexes terminate. Page entries
//! themselves are *not* deduplicated; a page listed in two leaf sitemaps
//! appears twice.

mod document;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use docsagent_shared::{DocsAgentError, DocumentFetcher, FetchedDocument, Result, UrlScope};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::{Instrument, debug, debug_span, info, instrument};

use document::SitemapDocument;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One page reference discovered in a sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    /// Absolute page URL.
    pub location: String,
    /// `<lastmod>` text, passed through unparsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// `<changefreq>` text, passed through unparsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<String>,
    /// `<priority>`, when present and numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// Caller-side filters applied after scope filtering.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Keep only locations containing at least one of these substrings.
    pub include: Vec<String>,
    /// Drop locations containing any of these substrings. Wins over `include`.
    pub exclude: Vec<String>,
    /// Truncate the result to this many entries.
    pub limit: Option<usize>,
}

impl ResolveOptions {
    /// Whether `location` passes the include/exclude substring filters.
    pub fn accepts(&self, location: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|s| location.contains(s.as_str()));
        let excluded = self.exclude.iter().any(|s| location.contains(s.as_str()));
        included && !excluded
    }
}

// ---------------------------------------------------------------------------
// SitemapResolver
// ---------------------------------------------------------------------------

/// Resolves sitemap trees into scope-filtered page lists.
pub struct SitemapResolver {
    fetcher: Arc<dyn DocumentFetcher>,
    scope: UrlScope,
    max_concurrent_fetches: Option<usize>,
}

impl SitemapResolver {
    /// Create a resolver with unbounded sibling fan-out.
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, scope: UrlScope) -> Self {
        Self {
            fetcher,
            scope,
            max_concurrent_fetches: None,
        }
    }

    /// Cap the number of sitemap fetches in flight during one `resolve` call.
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = Some(limit.max(1));
        self
    }

    /// The scope entries are filtered against.
    pub fn scope(&self) -> &UrlScope {
        &self.scope
    }

    /// Expand the sitemap tree at `root_url` and return the in-scope entries.
    ///
    /// Any non-success fetch anywhere in the tree fails the whole call; there
    /// is no partial result.
    #[instrument(skip_all, fields(root_url = %root_url))]
    pub async fn resolve(&self, root_url: &str, opts: &ResolveOptions) -> Result<Vec<SitemapEntry>> {
        let run = Expansion {
            fetcher: self.fetcher.as_ref(),
            documents: Mutex::new(HashMap::new()),
            permits: self.max_concurrent_fetches.map(Semaphore::new),
        };

        let tree = run.expand(root_url.to_string(), Vec::new()).await?;
        let sitemaps = run.documents.lock().await.len();

        let mut visited = HashSet::new();
        let mut entries = Vec::new();
        flatten(&tree, &mut visited, &mut entries);
        let discovered = entries.len();

        let entries = filter_entries(entries, &self.scope, opts);

        info!(
            sitemaps,
            discovered,
            returned = entries.len(),
            "sitemap resolved"
        );

        Ok(entries)
    }
}

/// Scope filter, then include/exclude, then the count cap.
fn filter_entries(
    entries: Vec<SitemapEntry>,
    scope: &UrlScope,
    opts: &ResolveOptions,
) -> Vec<SitemapEntry> {
    let filtered = entries
        .into_iter()
        .filter(|e| scope.is_in_scope(&e.location))
        .filter(|e| opts.accepts(&e.location));

    match opts.limit {
        Some(limit) => filtered.take(limit).collect(),
        None => filtered.collect(),
    }
}

// ---------------------------------------------------------------------------
// Per-call expansion state
// ---------------------------------------------------------------------------

/// A fetched sitemap and the subtrees of the children it lists.
///
/// `document` is `None` where the branch was cut because the URL is already
/// one of its own ancestors.
struct SitemapNode {
    url: String,
    document: Option<Arc<SitemapDocument>>,
    children: Vec<SitemapNode>,
}

type DocumentCell = Arc<OnceCell<Arc<SitemapDocument>>>;

/// State for a single `resolve` call. Dropped when the call returns.
struct Expansion<'f> {
    fetcher: &'f dyn DocumentFetcher,
    /// One fetch per sitemap URL per call, shared by every branch listing it.
    documents: Mutex<HashMap<String, DocumentCell>>,
    permits: Option<Semaphore>,
}

impl Expansion<'_> {
    /// Fetch the tree below `url`, siblings concurrently.
    fn expand(&self, url: String, ancestors: Vec<String>) -> BoxFuture<'_, Result<SitemapNode>> {
        let span = debug_span!("expand", %url);

        async move {
            if ancestors.contains(&url) {
                debug!("sitemap references its own ancestor, cutting branch");
                return Ok(SitemapNode {
                    url,
                    document: None,
                    children: Vec::new(),
                });
            }

            let document = self.document(&url).await?;

            let children = match document.as_ref() {
                SitemapDocument::Index(child_urls) => {
                    debug!(children = child_urls.len(), "expanding sitemap index");
                    let mut path = ancestors;
                    path.push(url.clone());
                    try_join_all(
                        child_urls
                            .iter()
                            .map(|child| self.expand(child.clone(), path.clone())),
                    )
                    .await?
                }
                SitemapDocument::Leaf(entries) => {
                    debug!(entries = entries.len(), "sitemap leaf");
                    Vec::new()
                }
                SitemapDocument::Empty => {
                    debug!("unrecognized sitemap document, treating as empty");
                    Vec::new()
                }
            };

            Ok(SitemapNode {
                url,
                document: Some(document),
                children,
            })
        }
        .instrument(span)
        .boxed()
    }

    /// The parsed document at `url`, fetched on first request.
    async fn document(&self, url: &str) -> Result<Arc<SitemapDocument>> {
        let cell = self
            .documents
            .lock()
            .await
            .entry(url.to_string())
            .or_default()
            .clone();

        cell.get_or_try_init(|| async {
            let fetched = self.fetch(url).await?;
            Ok::<_, DocsAgentError>(Arc::new(document::parse_document(&fetched.body)?))
        })
        .await
        .cloned()
    }

    /// Fetch one sitemap, holding a permit only for the request itself.
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|e| DocsAgentError::Network(format!("{url}: {e}")))?,
            ),
            None => None,
        };

        self.fetcher.fetch(url).await?.into_success()
    }
}

/// Walk the fetched tree depth-first in listing order. The first occurrence
/// of a sitemap URL contributes its entries; later ones contribute nothing.
fn flatten(node: &SitemapNode, visited: &mut HashSet<String>, out: &mut Vec<SitemapEntry>) {
    if !visited.insert(node.url.clone()) {
        debug!(url = %node.url, "sitemap already expanded, skipping");
        return;
    }

    match node.document.as_deref() {
        Some(SitemapDocument::Leaf(entries)) => out.extend(entries.iter().cloned()),
        Some(SitemapDocument::Index(_)) => {
            for child in &node.children {
                flatten(child, visited, out);
            }
        }
        Some(SitemapDocument::Empty) | None => {}
    }
}

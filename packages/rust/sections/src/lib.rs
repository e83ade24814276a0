//! Page section extraction.
//!
//! Finds a heading on a documentation page (by identifier or by text) and
//! returns everything between it and the next heading of equal or greater
//! significance, bounded by a serialized-markup budget.
//!
//! A section is the run of element siblings that follow the heading. A deeper
//! heading (an `h3` under an `h2`) is part of the section; the next `h2` or
//! `h1` ends it.

mod outline;

use std::sync::{Arc, LazyLock};

use docsagent_shared::{
    DocsAgentError, DocumentFetcher, FetchedDocument, Result, SectionsConfig, UrlScope,
};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use outline::{heading_level, headings};

pub use outline::{Heading, outline};

static PRE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre").expect("pre selector"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How to find the target heading. At least one field should be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLocator {
    /// Heading identifier, with or without a leading `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
    /// Heading text, compared trimmed and case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_text: Option<String>,
}

impl SectionLocator {
    /// Locate by heading identifier.
    pub fn by_anchor(id: impl Into<String>) -> Self {
        Self {
            anchor_id: Some(id.into()),
            heading_text: None,
        }
    }

    /// Locate by heading text.
    pub fn by_heading(text: impl Into<String>) -> Self {
        Self {
            anchor_id: None,
            heading_text: Some(text.into()),
        }
    }

    fn anchor(&self) -> Option<&str> {
        self.anchor_id
            .as_deref()
            .map(|id| id.trim().trim_start_matches('#'))
            .filter(|id| !id.is_empty())
    }

    fn text(&self) -> Option<&str> {
        self.heading_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// True when neither an identifier nor a text was given.
    pub fn is_empty(&self) -> bool {
        self.anchor().is_none() && self.text().is_none()
    }

    fn matches(&self, heading: &Heading) -> bool {
        let by_id = self
            .anchor()
            .is_some_and(|id| heading.id.as_deref() == Some(id));
        let by_text = self
            .text()
            .is_some_and(|t| heading.text.to_lowercase() == t.to_lowercase());
        by_id || by_text
    }

    fn describe(&self) -> String {
        match (self.anchor(), self.text()) {
            (Some(id), Some(t)) => format!("anchor \"#{id}\" or heading \"{t}\""),
            (Some(id), None) => format!("anchor \"#{id}\""),
            (None, Some(t)) => format!("heading \"{t}\""),
            (None, None) => "empty locator".to_string(),
        }
    }
}

/// Content of one extracted section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSection {
    /// The page the section was taken from.
    pub source_url: String,
    /// The caller's anchor if given, else the matched heading's own identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_anchor_id: Option<String>,
    /// Trimmed text of the matched heading.
    pub heading_text: String,
    /// Level of the matched heading (1-6).
    pub heading_level: u8,
    /// Serialized markup of the consumed siblings, concatenated.
    pub raw_markup: String,
    /// Non-empty trimmed text of each consumed sibling, separated by blank lines.
    pub plain_text: String,
    /// Verbatim text of `pre` blocks met in the section.
    pub code_fragments: Vec<String>,
    /// Accumulation stopped at the size limit rather than at a heading or the end.
    pub truncated: bool,
}

/// Result of a section lookup. A miss is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    /// The heading was found.
    Found(PageSection),
    /// No heading matched the locator.
    NotFound { source_url: String, reason: String },
}

impl SectionOutcome {
    /// Whether a heading matched.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// The extracted section, if any.
    pub fn section(&self) -> Option<&PageSection> {
        match self {
            Self::Found(section) => Some(section),
            Self::NotFound { .. } => None,
        }
    }
}

/// Size budget for `raw_markup`, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLimits {
    /// Used when the caller gives no limit.
    pub default_size_limit: usize,
    /// Caller-supplied limits are clamped to this.
    pub max_size_limit: usize,
}

impl Default for SectionLimits {
    fn default() -> Self {
        Self::from(&SectionsConfig::default())
    }
}

impl From<&SectionsConfig> for SectionLimits {
    fn from(config: &SectionsConfig) -> Self {
        Self {
            default_size_limit: config.default_size_limit,
            max_size_limit: config.max_size_limit,
        }
    }
}

impl SectionLimits {
    /// The effective limit for a request.
    pub fn effective(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_size_limit),
            Some(0) => Err(DocsAgentError::validation("size limit must be positive")),
            Some(n) => Ok(n.min(self.max_size_limit)),
        }
    }
}

// ---------------------------------------------------------------------------
// SectionExtractor
// ---------------------------------------------------------------------------

/// Fetches in-scope pages and extracts sections from them.
pub struct SectionExtractor {
    fetcher: Arc<dyn DocumentFetcher>,
    scope: UrlScope,
    limits: SectionLimits,
}

impl SectionExtractor {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, scope: UrlScope, limits: SectionLimits) -> Self {
        Self {
            fetcher,
            scope,
            limits,
        }
    }

    /// Fetch `page_url` and extract the section `locator` points at.
    ///
    /// Out-of-scope URLs are rejected before any request is made. A
    /// non-success fetch is an error; a locator miss is
    /// [`SectionOutcome::NotFound`].
    #[instrument(skip_all, fields(url = %page_url))]
    pub async fn extract_section(
        &self,
        page_url: &str,
        locator: &SectionLocator,
        size_limit: Option<usize>,
    ) -> Result<SectionOutcome> {
        let limit = self.limits.effective(size_limit)?;

        if locator.is_empty() {
            self.ensure_in_scope(page_url)?;
            return Ok(SectionOutcome::NotFound {
                source_url: page_url.to_string(),
                reason: "no anchor id or heading text supplied".into(),
            });
        }

        let page = self.fetch_page(page_url).await?;
        let outcome = extract_from_html(&page.body, page_url, locator, limit);

        match &outcome {
            SectionOutcome::Found(section) => debug!(
                heading = %section.heading_text,
                chars = section.raw_markup.chars().count(),
                truncated = section.truncated,
                "section extracted"
            ),
            SectionOutcome::NotFound { reason, .. } => debug!(%reason, "section not found"),
        }

        Ok(outcome)
    }

    /// Fetch `page_url` and list its headings.
    #[instrument(skip_all, fields(url = %page_url))]
    pub async fn outline(&self, page_url: &str) -> Result<Vec<Heading>> {
        let page = self.fetch_page(page_url).await?;
        Ok(outline(&page.body))
    }

    fn ensure_in_scope(&self, page_url: &str) -> Result<()> {
        if self.scope.is_in_scope(page_url) {
            Ok(())
        } else {
            Err(DocsAgentError::out_of_scope(page_url))
        }
    }

    async fn fetch_page(&self, page_url: &str) -> Result<FetchedDocument> {
        self.ensure_in_scope(page_url)?;
        self.fetcher.fetch(page_url).await?.into_success()
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract a section from already-fetched markup.
///
/// `size_limit` bounds the character count of `raw_markup`: a sibling whose
/// markup would push the total past it is left out and accumulation stops.
pub fn extract_from_html(
    html: &str,
    source_url: &str,
    locator: &SectionLocator,
    size_limit: usize,
) -> SectionOutcome {
    if locator.is_empty() {
        return SectionOutcome::NotFound {
            source_url: source_url.to_string(),
            reason: "no anchor id or heading text supplied".into(),
        };
    }

    let doc = Html::parse_document(html);
    let all = headings(&doc);

    let Some((el, heading)) = all.iter().find(|(_, h)| locator.matches(h)) else {
        return SectionOutcome::NotFound {
            source_url: source_url.to_string(),
            reason: format!(
                "no heading matching {} among {} headings",
                locator.describe(),
                all.len()
            ),
        };
    };

    let siblings: Vec<ElementRef<'_>> = el.next_siblings().filter_map(ElementRef::wrap).collect();
    let body = collect_section(&siblings, heading.level, size_limit);

    SectionOutcome::Found(PageSection {
        source_url: source_url.to_string(),
        resolved_anchor_id: locator
            .anchor()
            .map(str::to_string)
            .or_else(|| heading.id.clone()),
        heading_text: heading.text.clone(),
        heading_level: heading.level,
        raw_markup: body.markup,
        plain_text: body.text.join("\n\n"),
        code_fragments: body.code,
        truncated: body.truncated,
    })
}

#[derive(Debug, Default)]
struct SectionBody {
    markup: String,
    markup_chars: usize,
    text: Vec<String>,
    code: Vec<String>,
    truncated: bool,
}

/// Accumulate siblings until a heading at `level` or above, the size limit, or the end.
fn collect_section(siblings: &[ElementRef<'_>], level: u8, size_limit: usize) -> SectionBody {
    let mut body = SectionBody::default();

    for el in siblings {
        if heading_level(el).is_some_and(|l| l <= level) {
            break;
        }

        let markup = el.html();
        let chars = markup.chars().count();
        if body.markup_chars + chars > size_limit {
            body.truncated = true;
            break;
        }

        body.markup.push_str(&markup);
        body.markup_chars += chars;

        let text = el.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            body.text.push(text.to_string());
        }

        if matches!(el.value().name(), "pre" | "code") {
            body.code.push(el.text().collect());
        } else {
            body.code.extend(el.select(&PRE_SEL).map(|pre| pre.text().collect::<String>()));
        }
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsagent_shared::{FetchConfig, HttpFetcher};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URL: &str = "https://example.com/docs/guide";

    const GUIDE: &str = r#"<html><body>
<h1>Guide</h1>
<p>Intro.</p>
<h2 id="installation">Installation</h2>
<p>Download the package.</p>
<p>Run the installer.</p>
<h2 id="configuration">Configuration</h2>
<p>Edit the config file.</p>
</body></html>"#;

    const NESTED: &str = r#"<html><body>
<h2>Deploying</h2>
<p>Overview.</p>
<h3 id="docker">Docker</h3>
<pre><code>docker run app</code></pre>
<h4>Compose</h4>
<div class="note"><p>Tip:</p><pre>compose up</pre></div>
<h2>Monitoring</h2>
<p>Dashboards.</p>
</body></html>"#;

    fn found(outcome: SectionOutcome) -> PageSection {
        match outcome {
            SectionOutcome::Found(section) => section,
            SectionOutcome::NotFound { reason, .. } => panic!("expected Found, got: {reason}"),
        }
    }

    #[test]
    fn section_stops_at_next_equal_heading() {
        let section = found(extract_from_html(
            GUIDE,
            URL,
            &SectionLocator::by_heading("Installation"),
            5000,
        ));

        assert_eq!(section.heading_text, "Installation");
        assert_eq!(section.heading_level, 2);
        assert_eq!(section.resolved_anchor_id.as_deref(), Some("installation"));
        assert_eq!(
            section.plain_text,
            "Download the package.\n\nRun the installer."
        );
        assert_eq!(
            section.raw_markup,
            "<p>Download the package.</p><p>Run the installer.</p>"
        );
        assert!(!section.plain_text.contains("Edit the config"));
        assert!(!section.truncated);
    }

    #[test]
    fn heading_text_match_ignores_case_and_padding() {
        let section = found(extract_from_html(
            GUIDE,
            URL,
            &SectionLocator::by_heading("  CONFIGURATION "),
            5000,
        ));
        assert_eq!(section.plain_text, "Edit the config file.");
    }

    #[test]
    fn anchor_match_and_resolved_anchor() {
        let section = found(extract_from_html(
            GUIDE,
            URL,
            &SectionLocator::by_anchor("#configuration"),
            5000,
        ));
        assert_eq!(section.heading_text, "Configuration");
        assert_eq!(section.resolved_anchor_id.as_deref(), Some("configuration"));
    }

    #[test]
    fn caller_anchor_is_reported_even_when_text_matched() {
        let locator = SectionLocator {
            anchor_id: Some("does-not-exist".into()),
            heading_text: Some("Installation".into()),
        };
        let section = found(extract_from_html(GUIDE, URL, &locator, 5000));
        assert_eq!(section.heading_text, "Installation");
        assert_eq!(section.resolved_anchor_id.as_deref(), Some("does-not-exist"));
    }

    #[test]
    fn first_matching_heading_wins() {
        let html = "<h2>Usage</h2><p>first</p><h2>Usage</h2><p>second</p>";
        let section = found(extract_from_html(html, URL, &SectionLocator::by_heading("usage"), 5000));
        assert_eq!(section.plain_text, "first");
    }

    #[test]
    fn deeper_headings_stay_inside_section() {
        let section = found(extract_from_html(
            NESTED,
            URL,
            &SectionLocator::by_heading("Deploying"),
            5000,
        ));

        assert!(section.plain_text.contains("Docker"));
        assert!(section.plain_text.contains("Compose"));
        assert!(!section.plain_text.contains("Dashboards"));
        assert_eq!(section.code_fragments, vec!["docker run app", "compose up"]);
        assert_eq!(section.resolved_anchor_id, None);
    }

    #[test]
    fn subsection_stops_at_parent_level_heading() {
        let section = found(extract_from_html(
            NESTED,
            URL,
            &SectionLocator::by_anchor("docker"),
            5000,
        ));

        // h4 is deeper than h3 and is included; the h2 ends the scan.
        assert!(section.plain_text.starts_with("docker run app"));
        assert!(section.plain_text.contains("Compose"));
        assert!(!section.plain_text.contains("Monitoring"));
    }

    #[test]
    fn last_section_runs_to_end_of_siblings() {
        let section = found(extract_from_html(
            NESTED,
            URL,
            &SectionLocator::by_heading("Monitoring"),
            5000,
        ));
        assert_eq!(section.plain_text, "Dashboards.");
    }

    #[test]
    fn size_limit_keeps_a_prefix_and_flags_truncation() {
        let html = "<h2>Notes</h2><p>one</p><p>two</p><p>three</p>";
        // "<p>one</p>" and "<p>two</p>" are 10 chars each, "<p>three</p>" is 12.
        let section = found(extract_from_html(html, URL, &SectionLocator::by_heading("Notes"), 25));

        assert_eq!(section.raw_markup, "<p>one</p><p>two</p>");
        assert_eq!(section.plain_text, "one\n\ntwo");
        assert!(section.raw_markup.chars().count() <= 25);
        assert!(section.truncated);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let html = "<h2>Notes</h2><p>one</p><p>two</p>";
        let section = found(extract_from_html(html, URL, &SectionLocator::by_heading("Notes"), 20));
        assert_eq!(section.raw_markup, "<p>one</p><p>two</p>");
        assert!(!section.truncated);
    }

    #[test]
    fn oversized_first_node_yields_empty_section() {
        let html = "<h2>Notes</h2><p>a fairly long paragraph</p>";
        let section = found(extract_from_html(html, URL, &SectionLocator::by_heading("Notes"), 5));
        assert!(section.raw_markup.is_empty());
        assert!(section.plain_text.is_empty());
        assert!(section.truncated);
    }

    #[test]
    fn empty_text_nodes_are_skipped_in_plain_text() {
        let html = "<h2>Media</h2><p>caption</p><img src=\"a.png\"><p>after</p>";
        let section = found(extract_from_html(html, URL, &SectionLocator::by_heading("Media"), 5000));
        assert_eq!(section.plain_text, "caption\n\nafter");
        assert!(section.raw_markup.contains("<img"));
    }

    #[test]
    fn missing_heading_is_a_negative_result() {
        let outcome = extract_from_html(GUIDE, URL, &SectionLocator::by_heading("Uninstall"), 5000);
        assert!(!outcome.is_found());
        match outcome {
            SectionOutcome::NotFound { source_url, reason } => {
                assert_eq!(source_url, URL);
                assert!(reason.contains("Uninstall"));
                assert!(reason.contains("3 headings"));
            }
            SectionOutcome::Found(_) => panic!("expected NotFound"),
        }
    }

    #[test]
    fn empty_locator_is_a_negative_result() {
        let outcome = extract_from_html(GUIDE, URL, &SectionLocator::default(), 5000);
        assert!(!outcome.is_found());
        assert!(outcome.section().is_none());
    }

    #[test]
    fn limits_default_and_clamp() {
        let limits = SectionLimits::default();
        assert_eq!(limits.effective(None).unwrap(), 5000);
        assert_eq!(limits.effective(Some(800)).unwrap(), 800);
        assert_eq!(limits.effective(Some(1_000_000)).unwrap(), 20_000);
        assert!(limits.effective(Some(0)).is_err());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = SectionOutcome::NotFound {
            source_url: URL.into(),
            reason: "nope".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "not_found");

        let found = extract_from_html(GUIDE, URL, &SectionLocator::by_anchor("installation"), 5000);
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["heading_text"], "Installation");
    }

    // -----------------------------------------------------------------------
    // Network behaviour
    // -----------------------------------------------------------------------

    fn extractor() -> SectionExtractor {
        let scope = UrlScope::new("127.0.0.1", "/docs");
        let fetcher = HttpFetcher::scoped(&FetchConfig::default(), scope.clone()).unwrap();
        SectionExtractor::new(Arc::new(fetcher), scope, SectionLimits::default())
    }

    #[tokio::test]
    async fn extracts_from_fetched_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/guide"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GUIDE))
            .mount(&server)
            .await;

        let url = format!("{}/docs/guide", server.uri());
        let outcome = extractor()
            .extract_section(&url, &SectionLocator::by_heading("Installation"), None)
            .await
            .unwrap();

        let section = found(outcome);
        assert_eq!(section.source_url, url);
        assert_eq!(section.plain_text, "Download the package.\n\nRun the installer.");
    }

    #[tokio::test]
    async fn out_of_scope_page_is_rejected_without_fetching() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GUIDE))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/blog/post", server.uri());
        let err = extractor()
            .extract_section(&url, &SectionLocator::by_heading("Installation"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DocsAgentError::OutOfScope { .. }));
        assert_eq!(err.url(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn redirect_out_of_scope_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/guide"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("location", format!("{}/blog/post", server.uri()).as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blog/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GUIDE))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/docs/guide", server.uri());
        let err = extractor()
            .extract_section(&url, &SectionLocator::by_heading("Installation"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DocsAgentError::OutOfScope { .. }));
        assert_eq!(err.url(), Some(format!("{}/blog/post", server.uri()).as_str()));
    }

    #[tokio::test]
    async fn fetch_failure_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/docs/missing", server.uri());
        let err = extractor()
            .extract_section(&url, &SectionLocator::by_heading("Anything"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DocsAgentError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn outline_of_fetched_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/guide"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GUIDE))
            .mount(&server)
            .await;

        let headings = extractor()
            .outline(&format!("{}/docs/guide", server.uri()))
            .await
            .unwrap();

        let texts: Vec<&str> = headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Guide", "Installation", "Configuration"]);
    }
}

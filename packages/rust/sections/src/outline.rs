//! Heading outline of a page: the addressing space for section lookup.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("heading selector"));

/// Anchors nested in a heading that carry its identifier.
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[id], a[name]").expect("anchor selector"));

/// A heading on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// 1 (`h1`, most significant) through 6.
    pub level: u8,
    /// The heading's `id`, or the `id`/`name` of an anchor nested inside it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Trimmed text content.
    pub text: String,
}

/// Heading level for `h1`..`h6`, `None` for anything else.
pub(crate) fn heading_level(el: &ElementRef<'_>) -> Option<u8> {
    match el.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// All headings of `doc` in document order, paired with their elements.
pub(crate) fn headings(doc: &Html) -> Vec<(ElementRef<'_>, Heading)> {
    doc.select(&HEADING_SEL)
        .filter_map(|el| {
            let level = heading_level(&el)?;
            let heading = Heading {
                level,
                id: heading_id(&el),
                text: el.text().collect::<String>().trim().to_string(),
            };
            Some((el, heading))
        })
        .collect()
}

fn heading_id(el: &ElementRef<'_>) -> Option<String> {
    let own = el.value().attr("id").map(str::trim).filter(|id| !id.is_empty());
    if let Some(id) = own {
        return Some(id.to_string());
    }

    el.select(&ANCHOR_SEL).find_map(|a| {
        ["id", "name"]
            .into_iter()
            .filter_map(|attr| a.value().attr(attr))
            .map(str::trim)
            .find(|id| !id.is_empty())
            .map(str::to_string)
    })
}

/// Parse `html` and list its headings.
pub fn outline(html: &str) -> Vec<Heading> {
    let doc = Html::parse_document(html);
    headings(&doc).into_iter().map(|(_, h)| h).collect()
}

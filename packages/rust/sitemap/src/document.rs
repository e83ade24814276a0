//! Sitemap XML adapter.
//!
//! Normalizes a fetched sitemap body into a [`SitemapDocument`] right after
//! parsing, so the resolver never has to care whether a listing held one
//! child or many:
//! - `<sitemapindex>` with `<sitemap><loc>` children → [`SitemapDocument::Index`]
//! - `<urlset>` with `<url>` children → [`SitemapDocument::Leaf`]
//! - any other root element, or no root at all → [`SitemapDocument::Empty`]

use docsagent_shared::{DocsAgentError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::trace;

use crate::SitemapEntry;

/// A parsed sitemap body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SitemapDocument {
    /// Child sitemap URLs, in listing order.
    Index(Vec<String>),
    /// Page entries, in listing order.
    Leaf(Vec<SitemapEntry>),
    /// Unrecognized or empty document.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Root {
    Index,
    Leaf,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

/// Raw text collected for one `<url>` or `<sitemap>` item.
#[derive(Debug, Default)]
struct RawItem {
    loc: String,
    lastmod: String,
    changefreq: String,
    priority: String,
}

impl RawItem {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Loc => &mut self.loc,
            Field::LastMod => &mut self.lastmod,
            Field::ChangeFreq => &mut self.changefreq,
            Field::Priority => &mut self.priority,
        }
    }

    fn into_entry(self) -> Option<SitemapEntry> {
        let location = non_empty(self.loc)?;
        Some(SitemapEntry {
            location,
            last_modified: non_empty(self.lastmod),
            change_frequency: non_empty(self.changefreq),
            priority: self
                .priority
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|p| p.is_finite()),
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a sitemap body into its normalized shape.
///
/// Only fields that are direct children of an item are read, so nested
/// extension elements such as `<image:image><image:loc>` never overwrite
/// the page location.
pub(crate) fn parse_document(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<Root> = None;
    let mut depth: usize = 0;

    let mut children: Vec<String> = Vec::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();

    // (item, depth at which the item element opened)
    let mut current: Option<(RawItem, usize)> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let local = e.local_name();
                let name = local.as_ref();

                let Some(kind) = root else {
                    root = match name {
                        b"sitemapindex" => Some(Root::Index),
                        b"urlset" => Some(Root::Leaf),
                        other => {
                            trace!(root = %String::from_utf8_lossy(other), "unrecognized sitemap root");
                            return Ok(SitemapDocument::Empty);
                        }
                    };
                    continue;
                };

                let open_item = current.as_ref().map(|(_, d)| *d);
                match (open_item, kind, name) {
                    (None, Root::Index, b"sitemap") | (None, Root::Leaf, b"url") if depth == 2 => {
                        current = Some((RawItem::default(), depth));
                    }
                    (Some(item_depth), _, _) if depth == item_depth + 1 => {
                        field = match name {
                            b"loc" => Some(Field::Loc),
                            b"lastmod" => Some(Field::LastMod),
                            b"changefreq" => Some(Field::ChangeFreq),
                            b"priority" => Some(Field::Priority),
                            _ => None,
                        };
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                // A self-closing root (`<urlset/>`) lists nothing.
                if root.is_none() {
                    let local = e.local_name();
                    trace!(root = %String::from_utf8_lossy(local.as_ref()), "empty sitemap root");
                    return Ok(SitemapDocument::Empty);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(f), Some((item, _))) = (field, current.as_mut()) {
                    let text = t
                        .unescape()
                        .map_err(|e| DocsAgentError::parse(format!("sitemap text: {e}")))?;
                    item.slot(f).push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(f), Some((item, _))) = (field, current.as_mut()) {
                    item.slot(f).push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(item_depth) = current.as_ref().map(|(_, d)| *d) {
                    if depth == item_depth {
                        if let Some((item, _)) = current.take() {
                            match root {
                                Some(Root::Index) => children.extend(non_empty(item.loc)),
                                Some(Root::Leaf) => entries.extend(item.into_entry()),
                                None => {}
                            }
                        }
                    } else if depth == item_depth + 1 {
                        field = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocsAgentError::parse(format!(
                    "sitemap XML error at byte {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    Ok(match root {
        Some(Root::Index) => SitemapDocument::Index(children),
        Some(Root::Leaf) => SitemapDocument::Leaf(entries),
        None => SitemapDocument::Empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leaf_with_metadata() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/docs/intro</loc>
    <lastmod>2024-01-15</lastmod>
    <changefreq>weekly</changefreq>
    <priority>0.8</priority>
  </url>
  <url>
    <loc>https://example.com/docs/api</loc>
  </url>
</urlset>"#;

        let SitemapDocument::Leaf(entries) = parse_document(xml).unwrap() else {
            panic!("expected leaf");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].location, "https://example.com/docs/intro");
        assert_eq!(entries[0].last_modified.as_deref(), Some("2024-01-15"));
        assert_eq!(entries[0].change_frequency.as_deref(), Some("weekly"));
        assert_eq!(entries[0].priority, Some(0.8));
        assert_eq!(entries[1].location, "https://example.com/docs/api");
        assert!(entries[1].last_modified.is_none());
        assert!(entries[1].priority.is_none());
    }

    #[test]
    fn parses_index_in_listing_order() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-b.xml</loc><lastmod>2024-02-01</lastmod></sitemap>
  <sitemap><loc>https://example.com/sitemap-a.xml</loc></sitemap>
</sitemapindex>"#;

        assert_eq!(
            parse_document(xml).unwrap(),
            SitemapDocument::Index(vec![
                "https://example.com/sitemap-b.xml".into(),
                "https://example.com/sitemap-a.xml".into(),
            ])
        );
    }

    #[test]
    fn singleton_listings_normalize_like_lists() {
        let index = "<sitemapindex><sitemap><loc>https://example.com/only.xml</loc></sitemap></sitemapindex>";
        assert_eq!(
            parse_document(index).unwrap(),
            SitemapDocument::Index(vec!["https://example.com/only.xml".into()])
        );

        let leaf = "<urlset><url><loc>https://example.com/docs/one</loc></url></urlset>";
        let SitemapDocument::Leaf(entries) = parse_document(leaf).unwrap() else {
            panic!("expected leaf");
        };
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn unknown_or_empty_documents_are_empty() {
        assert_eq!(parse_document("").unwrap(), SitemapDocument::Empty);
        assert_eq!(
            parse_document("<?xml version=\"1.0\"?><rss><channel/></rss>").unwrap(),
            SitemapDocument::Empty
        );
        assert_eq!(parse_document("<urlset/>").unwrap(), SitemapDocument::Empty);
        assert_eq!(
            parse_document("<html><body><p>Not found</body></html>").unwrap(),
            SitemapDocument::Empty
        );
    }

    #[test]
    fn items_without_loc_are_skipped() {
        let xml = "<urlset><url><lastmod>2024-01-01</lastmod></url><url><loc> https://example.com/docs/x </loc></url></urlset>";
        let SitemapDocument::Leaf(entries) = parse_document(xml).unwrap() else {
            panic!("expected leaf");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].location, "https://example.com/docs/x");
    }

    #[test]
    fn unparsable_priority_is_omitted() {
        let xml = "<urlset><url><loc>https://example.com/docs/x</loc><priority>high</priority></url></urlset>";
        let SitemapDocument::Leaf(entries) = parse_document(xml).unwrap() else {
            panic!("expected leaf");
        };
        assert!(entries[0].priority.is_none());
    }

    #[test]
    fn non_finite_priority_is_omitted() {
        for value in ["NaN", "inf", "-infinity"] {
            let xml = format!(
                "<urlset><url><loc>https://example.com/docs/x</loc><priority>{value}</priority></url></urlset>"
            );
            let SitemapDocument::Leaf(entries) = parse_document(&xml).unwrap() else {
                panic!("expected leaf");
            };
            assert!(entries[0].priority.is_none(), "{value} kept as priority");
        }
    }

    #[test]
    fn nested_extension_loc_does_not_override_page_loc() {
        let xml = r#"<urlset xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/docs/gallery</loc>
    <image:image><image:loc>https://example.com/img/a.png</image:loc></image:image>
  </url>
</urlset>"#;
        let SitemapDocument::Leaf(entries) = parse_document(xml).unwrap() else {
            panic!("expected leaf");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].location, "https://example.com/docs/gallery");
    }

    #[test]
    fn escaped_and_cdata_locations() {
        let xml = "<urlset><url><loc>https://example.com/docs/a?x=1&amp;y=2</loc></url><url><loc><![CDATA[https://example.com/docs/b]]></loc></url></urlset>";
        let SitemapDocument::Leaf(entries) = parse_document(xml).unwrap() else {
            panic!("expected leaf");
        };
        assert_eq!(entries[0].location, "https://example.com/docs/a?x=1&y=2");
        assert_eq!(entries[1].location, "https://example.com/docs/b");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse_document("<urlset><url><loc>x</url></urlset>").unwrap_err();
        assert!(matches!(err, DocsAgentError::Parse { .. }));
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::util::{non_blank, strip_control_chars};

/// One post discovered in a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub guid: String,
    pub author: Option<String>,
}

/// A parsed RSS/Atom document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// The site the feed belongs to, as declared by the feed itself
    pub site_link: Option<String>,
    pub items: Vec<FeedItem>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)?;

    let site_link = preferred_link(&feed.links);

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = preferred_link(&entry.links);
            let published_at = entry.published.or(entry.updated);
            let title = entry
                .title
                .and_then(|t| non_blank(Some(&t.content)))
                .unwrap_or_else(|| "Untitled".to_string());
            let author = entry
                .authors
                .first()
                .and_then(|person| non_blank(Some(&person.name)));

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(
                existing_id,
                link.as_deref(),
                &title,
                published_at.map(|dt| dt.timestamp()),
            );

            FeedItem {
                title,
                link,
                published_at,
                guid,
                author,
            }
        })
        .collect();

    Ok(ParsedFeed { site_link, items })
}

/// Picks the human-facing link out of a feed or entry link list.
///
/// An `alternate` (or unlabelled) link wins; otherwise the first link that
/// is not a `self` reference. Feeds pointing only at themselves yield `None`.
fn preferred_link(links: &[Link]) -> Option<String> {
    let is_alternate = |l: &&Link| l.rel.as_deref().map_or(true, |r| r == "alternate");
    let not_self = |l: &&Link| l.rel.as_deref() != Some("self");

    links
        .iter()
        .find(is_alternate)
        .or_else(|| links.iter().find(not_self))
        .and_then(|l| non_blank(Some(&strip_control_chars(&l.href))))
}

fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Ann's Blog</title>
    <link>https://ann.example.com/</link>
    <item>
        <guid>post-1</guid>
        <title>First post</title>
        <link>https://ann.example.com/first</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
        <author>ann@example.com (Ann)</author>
    </item>
    <item>
        <link>https://ann.example.com/second</link>
    </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Bob</title>
    <id>urn:bob</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <link rel="self" href="https://bob.example.com/atom.xml"/>
    <link rel="alternate" href="https://bob.example.com/"/>
    <entry>
        <id>urn:bob:1</id>
        <title>Hello</title>
        <updated>2024-01-02T00:00:00Z</updated>
        <author><name>Bob</name></author>
        <link rel="alternate" href="https://bob.example.com/hello"/>
    </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_site_link_and_items() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(feed.site_link.as_deref(), Some("https://ann.example.com/"));
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.guid, "post-1");
        assert_eq!(first.title, "First post");
        assert_eq!(first.link.as_deref(), Some("https://ann.example.com/first"));
        assert!(first.published_at.is_some());
    }

    #[test]
    fn test_missing_title_and_guid_fall_back() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        let second = &feed.items[1];
        assert_eq!(second.title, "Untitled");
        assert!(!second.guid.is_empty());
    }

    #[test]
    fn test_parse_atom_prefers_alternate_link() {
        let feed = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(feed.site_link.as_deref(), Some("https://bob.example.com/"));
        assert_eq!(feed.items[0].author.as_deref(), Some("Bob"));
        assert_eq!(feed.items[0].published_at.map(|d| d.timestamp()), Some(1704153600));
    }

    #[test]
    fn test_self_link_only_yields_no_site_link() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Self</title>
    <id>urn:self</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <link rel="self" href="https://self.example.com/atom.xml"/>
</feed>"#;
        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.site_link, None);
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_invalid_xml_is_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
        assert!(parse_feed(b"").is_err());
    }

    #[test]
    fn test_generated_guid_is_stable() {
        let a = generate_guid(None, Some("https://x/1"), "T", Some(1));
        let b = generate_guid(Some("  "), Some("https://x/1"), "T", Some(1));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_guid(None, Some("https://x/2"), "T", Some(1)));
    }
}

use scraper::{Html, Selector};
use sqlx::SqlitePool;
use url::Url;

use super::{xml, FeedType};
use crate::fetch;

/// A candidate subscription found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFeed {
    pub title: String,
    pub url: String,
    pub feed_type: FeedType,
}

const FEED_MIME_RSS: &str = "application/rss+xml";
const FEED_MIME_ATOM: &str = "application/atom+xml";
const FEED_MIME_JSON: &str = "application/json";
const FEED_MIME_FEED_JSON: &str = "application/feed+json";

/// Discovers candidate feeds behind a URL: fetches the page and inspects it
/// as a YouTube channel, a direct feed, or an HTML page with alternate links.
/// Network or parse failures yield an empty candidate list.
pub async fn discover(pool: Option<&SqlitePool>, url: &str) -> Vec<DiscoveredFeed> {
    if url.is_empty() {
        return Vec::new();
    }

    let normalised = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    let body = match fetch::get(pool, &normalised, None).await {
        Ok(response) => response.text(),
        Err(_) => return Vec::new(),
    };

    discover_in_body(&normalised, &body)
}

/// The inspection half of `discover`, separated so page bodies can be fed in
/// directly. First matching interpretation wins.
pub fn discover_in_body(url: &str, body: &str) -> Vec<DiscoveredFeed> {
    if let Some(feed) = interpret_as_youtube_source(url, body) {
        return vec![feed];
    }
    if let Some(feed) = interpret_as_direct_feed_link(url, body) {
        return vec![feed];
    }
    let mut feeds = interpret_as_html_with_rel_alternate_links(body);
    post_process_feeds(url, &mut feeds);
    feeds
}

/// YouTube pages do not advertise their Atom feeds; derive one from the
/// canonical channel URL instead.
fn interpret_as_youtube_source(url: &str, body: &str) -> Option<DiscoveredFeed> {
    let host = Url::parse(url).ok()?.host_str()?.to_string();
    if !host.ends_with("youtube.com") {
        return None;
    }

    let document = Html::parse_document(body);
    let link_selector = Selector::parse("link").ok()?;

    let canonical = document
        .select(&link_selector)
        .filter(|el| el.value().attr("rel") == Some("canonical"))
        .find_map(|el| el.value().attr("href"))?;

    let channel_id = canonical
        .strip_prefix("https://")
        .and_then(|rest| rest.split_once("youtube.com/channel/"))
        .map(|(_, id)| id)?;
    if channel_id.is_empty() {
        return None;
    }

    let title_selector = Selector::parse("title").ok()?;
    let channel_title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| channel_id.to_string());

    Some(DiscoveredFeed {
        title: channel_title,
        url: format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}"),
        feed_type: FeedType::Atom,
    })
}

fn interpret_as_direct_feed_link(url: &str, body: &str) -> Option<DiscoveredFeed> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let doc = xml::parse_document(trimmed).ok()?;
        let name = doc.local_name().to_ascii_lowercase();
        if name == "rss" || name == "rdf" {
            return Some(DiscoveredFeed {
                title: "RSS Feed".to_string(),
                url: url.to_string(),
                feed_type: FeedType::Rss,
            });
        }
        if name == "feed" {
            return Some(DiscoveredFeed {
                title: "Atom Feed".to_string(),
                url: url.to_string(),
                feed_type: FeedType::Atom,
            });
        }
        return None;
    }

    if trimmed.starts_with('{') {
        let root: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        let version = root.get("version")?.as_str()?;
        if version.eq_ignore_ascii_case("https://jsonfeed.org/version/1.1")
            || version.eq_ignore_ascii_case("https://jsonfeed.org/version/1")
        {
            let title = root
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("JSON feed")
                .to_string();
            return Some(DiscoveredFeed {
                title,
                url: url.to_string(),
                feed_type: FeedType::Json,
            });
        }
    }

    None
}

/// Collects `<link rel="alternate">` elements with a known feed mimetype.
/// The HTML5 parser recovers on the malformed markup that is common in the
/// wild, so no secondary extraction pass is needed.
fn interpret_as_html_with_rel_alternate_links(body: &str) -> Vec<DiscoveredFeed> {
    let document = Html::parse_document(body);
    let link_selector = match Selector::parse("link") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut feeds = Vec::new();
    for el in document.select(&link_selector) {
        let link = el.value();
        let (rel, href, mime) = match (link.attr("rel"), link.attr("href"), link.attr("type")) {
            (Some(rel), Some(href), Some(mime)) => (rel, href, mime),
            _ => continue,
        };
        if !rel.eq_ignore_ascii_case("alternate") {
            continue;
        }

        let feed_type = if mime.eq_ignore_ascii_case(FEED_MIME_RSS) {
            FeedType::Rss
        } else if mime.eq_ignore_ascii_case(FEED_MIME_ATOM) {
            FeedType::Atom
        } else if mime.eq_ignore_ascii_case(FEED_MIME_JSON) || mime.eq_ignore_ascii_case(FEED_MIME_FEED_JSON) {
            FeedType::Json
        } else {
            continue;
        };

        feeds.push(DiscoveredFeed {
            title: link.attr("title").unwrap_or_default().to_string(),
            url: href.to_string(),
            feed_type,
        });
    }
    feeds
}

/// Converts relative candidate URLs to absolute ones against the source URL.
fn post_process_feeds(base_url: &str, feeds: &mut [DiscoveredFeed]) {
    for feed in feeds.iter_mut() {
        if !feed.url.starts_with("http") {
            if let Ok(base) = Url::parse(base_url) {
                if let Ok(absolute) = base.join(&feed.url) {
                    feed.url = absolute.to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_with_alternate_links_yields_candidates() {
        let html = r#"<!DOCTYPE html><html><head>
            <title>pawelgrzybek.com</title>
            <link rel="alternate" type="application/rss+xml" title="pawelgrzybek.com" href="https://pawelgrzybek.com/feed.xml">
            <link rel="alternate" type="application/json" title="pawelgrzybek.com" href="https://pawelgrzybek.com/feed.json">
            <link rel="stylesheet" href="/style.css">
            </head><body></body></html>"#;

        let feeds = discover_in_body("https://pawelgrzybek.com", html);
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].feed_type, FeedType::Rss);
        assert_eq!(feeds[0].url, "https://pawelgrzybek.com/feed.xml");
        assert_eq!(feeds[0].title, "pawelgrzybek.com");
        assert_eq!(feeds[1].feed_type, FeedType::Json);
        assert_eq!(feeds[1].url, "https://pawelgrzybek.com/feed.json");
    }

    #[test]
    fn youtube_channel_page_yields_one_atom_candidate() {
        let html = r#"<html><head>
            <title>MrBeast - YouTube</title>
            <link rel="canonical" href="https://www.youtube.com/channel/UCX6OQ3DkcsbYNE6H8uQQuVA">
            </head><body></body></html>"#;

        let feeds = discover_in_body("https://www.youtube.com/@MrBeast", html);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_type, FeedType::Atom);
        assert_eq!(feeds[0].title, "MrBeast - YouTube");
        assert_eq!(
            feeds[0].url,
            "https://www.youtube.com/feeds/videos.xml?channel_id=UCX6OQ3DkcsbYNE6H8uQQuVA"
        );
    }

    #[test]
    fn direct_rss_body_is_recognised() {
        let body = r#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
        let feeds = discover_in_body("https://example.com/feed.xml", body);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_type, FeedType::Rss);
        assert_eq!(feeds[0].url, "https://example.com/feed.xml");
    }

    #[test]
    fn direct_json_feed_carries_its_title() {
        let body = r#"{"version": "https://jsonfeed.org/version/1.1", "title": "My JSON"}"#;
        let feeds = discover_in_body("https://example.com/feed.json", body);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "My JSON");
        assert_eq!(feeds[0].feed_type, FeedType::Json);
    }

    #[test]
    fn relative_urls_are_resolved_against_the_page() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/atom+xml" title="atom" href="/feed.atom">
            </head></html>"#;
        let feeds = discover_in_body("https://example.com/blog/", html);
        assert_eq!(feeds[0].url, "https://example.com/feed.atom");
    }

    #[test]
    fn invalid_html_still_yields_candidates() {
        // unclosed tags and stray markup; the HTML5 parser recovers
        let html = r#"<html><head><title>broken<div>
            <link rel="alternate" type="application/rss+xml" title="b" href="https://broken.example/feed">
            <p>unclosed"#;
        let feeds = discover_in_body("https://broken.example", html);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, "https://broken.example/feed");
    }
}

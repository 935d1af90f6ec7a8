pub mod atom10;
pub mod discovery;
pub mod favicon;
pub mod json11;
pub mod rss10;
pub mod rss20;
pub mod xml;

use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::model::Enclosure;

/// Kind of wire format a parser handles; also the type reported by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    Rss,
    Atom,
    Json,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Rss => "RSS",
            FeedType::Atom => "Atom",
            FeedType::Json => "JSON",
        }
    }
}

/// One item in its uniform shape, independent of the wire format. Dates are
/// already normalised to ISO-8601 UTC; guids are never empty.
#[derive(Debug, Clone, Default)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub content: String,
    pub author: String,
    pub comments_url: String,
    pub guid: String,
    pub date_published: String,
    pub thumbnail: Option<String>,
    pub enclosures: Vec<Enclosure>,
    pub categories: Vec<String>,
}

/// The uniform contract every wire format is decoded through.
pub trait FeedParser: Send + Sync {
    fn feed_type(&self) -> FeedType;
    fn guid(&self) -> String;
    fn title(&self) -> String;
    fn subtitle(&self) -> String;
    fn link(&self) -> String;
    fn description(&self) -> String;
    fn language(&self) -> String;
    fn copyright(&self) -> String;
    fn icon_url(&self) -> String;
    fn items(&self) -> Vec<ParsedItem>;
}

impl std::fmt::Debug for dyn FeedParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedParser")
            .field("feed_type", &self.feed_type())
            .finish()
    }
}

const JSON_FEED_VERSION_1: &str = "https://jsonfeed.org/version/1";
const JSON_FEED_VERSION_1_1: &str = "https://jsonfeed.org/version/1.1";

/// Sniffs the payload and returns the parser for it, or `None` when there is
/// nothing to parse (empty body, e.g. a conditional-GET 304, or a JSON
/// document that is not a JSON Feed).
pub fn parse_feed(data: &str, original_url: &str) -> Result<Option<Box<dyn FeedParser>>> {
    let trimmed = data.trim_start();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.starts_with('<') {
        let doc = xml::parse_document(trimmed)?;
        if doc.name == "rss" {
            if doc.attr("version") == Some("2.0") {
                return Ok(Some(Box::new(rss20::Rss20Parser::new(doc))));
            }
        } else if doc.name == "feed" {
            return Ok(Some(Box::new(atom10::Atom10Parser::new(doc, original_url))));
        } else if doc.name == "rdf:RDF" {
            return Ok(Some(Box::new(rss10::Rss10Parser::new(doc))));
        }
        return Err(Error::Parse("Unknown feed type".into()));
    }

    if trimmed.starts_with('{') {
        let root: serde_json::Value = serde_json::from_str(trimmed)?;
        // both v1 and v1.1 go through the 1.1 parser, as it checks for both 'authors' and 'author'
        if let Some(version) = root.get("version").and_then(|v| v.as_str()) {
            if version.eq_ignore_ascii_case(JSON_FEED_VERSION_1_1) || version.eq_ignore_ascii_case(JSON_FEED_VERSION_1) {
                return Ok(Some(Box::new(json11::Json11Parser::new(root))));
            }
        }
        return Ok(None);
    }

    Err(Error::Parse("Unknown feed type".into()))
}

/// Hex MD5 digest of a string, as used for synthesised guids.
pub fn md5_hex(data: &str) -> String {
    md5_hex_bytes(data.as_bytes())
}

/// Hex MD5 digest of raw bytes, as used for icon hashes.
pub fn md5_hex_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Synthesises a guid for an item that has none: hash the first non-empty of
/// the given candidates, falling back to a random UUID.
pub fn synthesise_guid(candidates: &[&str]) -> String {
    let source = candidates
        .iter()
        .find(|c| !c.is_empty())
        .map(|c| c.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    md5_hex(&source)
}

/// Parses a feed timestamp (RFC 3339, with an RFC 2822 fallback for RSS
/// pubDates) and re-emits it as ISO-8601 UTC. Unparseable input yields "".
pub fn normalise_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .or_else(|_| chrono::DateTime::parse_from_rfc2822(raw));
    match parsed {
        Ok(dt) => crate::model::format_date(dt.with_timezone(&chrono::Utc)),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_parser() {
        assert!(parse_feed("", "https://example.com/feed").unwrap().is_none());
        assert!(parse_feed("   \n\t ", "https://example.com/feed").unwrap().is_none());
    }

    #[test]
    fn unknown_document_element_is_rejected() {
        let err = parse_feed("<?xml version=\"1.0\"?><invalid-root/>", "https://example.com").unwrap_err();
        assert!(err.to_string().contains("Unknown feed type"));
    }

    #[test]
    fn unknown_json_version_yields_no_parser() {
        let body = r#"{"version": "https://jsonfeed.org/version/9", "items": []}"#;
        assert!(parse_feed(body, "https://example.com").unwrap().is_none());
    }

    #[test]
    fn dispatches_on_document_element() {
        let rss = r#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
        assert_eq!(parse_feed(rss, "u").unwrap().unwrap().feed_type(), FeedType::Rss);

        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title></feed>"#;
        assert_eq!(parse_feed(atom, "u").unwrap().unwrap().feed_type(), FeedType::Atom);

        let rdf = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><channel><title>t</title></channel></rdf:RDF>"#;
        assert_eq!(parse_feed(rdf, "u").unwrap().unwrap().feed_type(), FeedType::Rss);

        let json = r#"{"version": "https://jsonfeed.org/version/1.1", "title": "t", "items": []}"#;
        assert_eq!(parse_feed(json, "u").unwrap().unwrap().feed_type(), FeedType::Json);
    }

    #[test]
    fn synthesised_guids_are_reproducible() {
        let a = synthesise_guid(&["", "https://example.com/x"]);
        let b = synthesise_guid(&["", "https://example.com/x"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        // no material at all: random, but still non-empty and well-formed
        let c = synthesise_guid(&["", ""]);
        let d = synthesise_guid(&["", ""]);
        assert_eq!(c.len(), 32);
        assert_ne!(c, d);
    }

    #[test]
    fn date_normalisation_handles_both_wire_formats() {
        assert_eq!(normalise_date("2023-06-01T10:00:00+02:00"), "2023-06-01T08:00:00Z");
        assert_eq!(normalise_date("Thu, 01 Jun 2023 10:00:00 +0200"), "2023-06-01T08:00:00Z");
        assert_eq!(normalise_date("not a date"), "");
        assert_eq!(normalise_date(""), "");
    }
}

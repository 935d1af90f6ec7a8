use serde_json::Value;

use super::{normalise_date, FeedParser, FeedType, ParsedItem};

/// JSON Feed 1 / 1.1. Both versions go through this parser; it checks for
/// the 1.1 `authors` array and the 1.0 `author` object.
pub struct Json11Parser {
    root: Value,
}

impl Json11Parser {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    fn str_field(&self, name: &str) -> String {
        self.root
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

fn authors_of(value: &Value) -> String {
    if let Some(authors) = value.get("authors").and_then(|a| a.as_array()) {
        let names: Vec<&str> = authors
            .iter()
            .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
            .collect();
        if !names.is_empty() {
            return names.join(", ");
        }
    }
    value
        .get("author")
        .and_then(|a| a.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or_default()
        .to_string()
}

/// The spec is very clear about only allowing html in the content_html field,
/// yet some people put html in content_text; showing it verbatim would break
/// the layout, so angle brackets are escaped and the block rides in a pre.
fn escape_content_text(text: &str) -> String {
    let escaped = text
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br />");
    format!(r#"<pre style="white-space:pre-wrap;">{escaped}</pre>"#)
}

impl FeedParser for Json11Parser {
    fn feed_type(&self) -> FeedType {
        FeedType::Json
    }

    fn guid(&self) -> String {
        self.str_field("feed_url")
    }

    fn title(&self) -> String {
        self.str_field("title")
    }

    fn subtitle(&self) -> String {
        String::new()
    }

    fn link(&self) -> String {
        self.str_field("home_page_url")
    }

    fn description(&self) -> String {
        self.str_field("description")
    }

    fn language(&self) -> String {
        self.str_field("language")
    }

    fn copyright(&self) -> String {
        String::new()
    }

    fn icon_url(&self) -> String {
        let icon = self.str_field("icon");
        if !icon.is_empty() {
            return icon;
        }
        self.str_field("favicon")
    }

    fn items(&self) -> Vec<ParsedItem> {
        let top_level_authors = authors_of(&self.root);

        let mut items = Vec::new();
        let item_list = match self.root.get("items").and_then(|i| i.as_array()) {
            Some(list) => list,
            None => return items,
        };

        for item_obj in item_list {
            // id is required; items without one are skipped
            let guid = match item_obj.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };

            let mut item = ParsedItem {
                guid,
                link: item_obj.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                title: item_obj.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                ..ParsedItem::default()
            };

            if let Some(html) = item_obj.get("content_html").and_then(|v| v.as_str()) {
                item.content = html.to_string();
            } else {
                let text = item_obj.get("content_text").and_then(|v| v.as_str()).unwrap_or_default();
                item.content = escape_content_text(text);
            }

            if let Some(image) = item_obj.get("image").and_then(|v| v.as_str()) {
                item.thumbnail = Some(image.to_string());
            }

            let provided_date = item_obj
                .get("date_modified")
                .or_else(|| item_obj.get("date_published"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            item.date_published = normalise_date(provided_date);

            let item_authors = authors_of(item_obj);
            item.author = if item_authors.is_empty() {
                top_level_authors.clone()
            } else {
                item_authors
            };

            if let Some(tags) = item_obj.get("tags").and_then(|t| t.as_array()) {
                for tag in tags {
                    if let Some(tag) = tag.as_str() {
                        item.categories.push(tag.to_string());
                    }
                }
            }

            items.push(item);
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_feed;

    const FEED: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "title": "JSON example",
        "home_page_url": "https://example.io/",
        "feed_url": "https://example.io/feed.json",
        "description": "a json feed",
        "language": "en",
        "icon": "https://example.io/icon.png",
        "authors": [ { "name": "Dave" }, { "name": "Erin" } ],
        "items": [
            {
                "id": "1",
                "url": "https://example.io/one",
                "title": "One",
                "content_html": "<p>one</p>",
                "image": "https://example.io/one.jpg",
                "date_published": "2023-02-03T04:05:06Z",
                "tags": ["a", "b"]
            },
            {
                "id": "2",
                "title": "Two",
                "content_text": "<nohtml>",
                "date_modified": "2023-02-04T00:00:00+02:00",
                "author": { "name": "Frank" }
            },
            { "title": "no id, skipped" }
        ]
    }"#;

    #[test]
    fn feed_metadata() {
        let parser = parse_feed(FEED, "https://example.io/feed.json").unwrap().unwrap();
        assert_eq!(parser.guid(), "https://example.io/feed.json");
        assert_eq!(parser.title(), "JSON example");
        assert_eq!(parser.link(), "https://example.io/");
        assert_eq!(parser.description(), "a json feed");
        assert_eq!(parser.language(), "en");
        assert_eq!(parser.icon_url(), "https://example.io/icon.png");
    }

    #[test]
    fn items_without_id_are_skipped() {
        let parser = parse_feed(FEED, "u").unwrap().unwrap();
        assert_eq!(parser.items().len(), 2);
    }

    #[test]
    fn content_text_is_escaped_into_a_pre_block() {
        let parser = parse_feed(FEED, "u").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(
            items[1].content,
            r#"<pre style="white-space:pre-wrap;">&lt;nohtml&gt;</pre>"#
        );
    }

    #[test]
    fn author_fallback_chain() {
        let parser = parse_feed(FEED, "u").unwrap().unwrap();
        let items = parser.items();
        // feed-level authors joined when the item has none
        assert_eq!(items[0].author, "Dave, Erin");
        // item-level author object wins
        assert_eq!(items[1].author, "Frank");
    }

    #[test]
    fn date_modified_wins_and_is_normalised() {
        let parser = parse_feed(FEED, "u").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[0].date_published, "2023-02-03T04:05:06Z");
        assert_eq!(items[1].date_published, "2023-02-03T22:00:00Z");
    }

    #[test]
    fn favicon_is_the_icon_fallback() {
        let body = r#"{"version": "https://jsonfeed.org/version/1", "title": "t",
                       "favicon": "https://example.io/fav.ico", "items": []}"#;
        let parser = parse_feed(body, "u").unwrap().unwrap();
        assert_eq!(parser.icon_url(), "https://example.io/fav.ico");
    }

    #[test]
    fn thumbnails_and_tags() {
        let parser = parse_feed(FEED, "u").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[0].thumbnail.as_deref(), Some("https://example.io/one.jpg"));
        assert_eq!(items[0].categories, vec!["a", "b"]);
    }
}

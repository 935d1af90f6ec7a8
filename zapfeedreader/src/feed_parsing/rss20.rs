use super::xml::XmlElement;
use super::{normalise_date, synthesise_guid, FeedParser, FeedType, ParsedItem};
use crate::model::Enclosure;

/// RSS 2.0. Channel metadata lives under `/rss/channel`; item content prefers
/// `content:encoded` over `description`, and `dc:creator` overrides `author`.
pub struct Rss20Parser {
    doc: XmlElement,
}

impl Rss20Parser {
    pub fn new(doc: XmlElement) -> Self {
        Self { doc }
    }

    fn channel(&self) -> Option<&XmlElement> {
        self.doc.child("channel")
    }

    fn channel_text(&self, name: &str) -> String {
        self.channel().map(|c| c.child_text(name)).unwrap_or_default()
    }
}

impl FeedParser for Rss20Parser {
    fn feed_type(&self) -> FeedType {
        FeedType::Rss
    }

    fn guid(&self) -> String {
        String::new()
    }

    fn title(&self) -> String {
        self.channel_text("title")
    }

    fn subtitle(&self) -> String {
        String::new()
    }

    fn link(&self) -> String {
        self.channel_text("link")
    }

    fn description(&self) -> String {
        self.channel_text("description")
    }

    fn language(&self) -> String {
        self.channel_text("language")
    }

    fn copyright(&self) -> String {
        self.channel_text("copyright")
    }

    fn icon_url(&self) -> String {
        self.channel()
            .and_then(|c| c.child("image"))
            .map(|i| i.child_text("url"))
            .unwrap_or_default()
    }

    fn items(&self) -> Vec<ParsedItem> {
        let channel = match self.channel() {
            Some(c) => c,
            None => return Vec::new(),
        };

        let mut items = Vec::new();
        for item_el in channel.children_named("item") {
            let mut item = ParsedItem {
                title: item_el.child_text("title"),
                link: item_el.child_text("link"),
                comments_url: item_el.child_text("comments"),
                ..ParsedItem::default()
            };

            // content:encoded carries the full body when present
            item.content = match item_el.child("content:encoded") {
                Some(encoded) => encoded.text(),
                None => item_el.inner_xml_of("description"),
            };

            item.author = item_el.child_text("author");
            if let Some(creator) = item_el.child("dc:creator") {
                item.author = creator.text();
            }

            for enclosure_el in item_el.children_named("enclosure") {
                // magnet links ride in the url attribute like any other
                let url = enclosure_el.attr("url").unwrap_or_default().to_string();
                if url.is_empty() {
                    continue;
                }
                item.enclosures.push(Enclosure {
                    url,
                    mime_type: enclosure_el.attr("type").unwrap_or_default().to_string(),
                    size: enclosure_el
                        .attr("length")
                        .and_then(|l| l.parse().ok())
                        .unwrap_or(0),
                });
            }

            for category_el in item_el.children_named("category") {
                let title = category_el.text();
                if !title.is_empty() {
                    item.categories.push(title);
                }
            }

            let mut guid_is_permalink = true;
            match item_el.child("guid") {
                Some(guid_el) => {
                    item.guid = guid_el.text();
                    if let Some(v) = guid_el.attr("isPermaLink") {
                        guid_is_permalink = v != "false";
                    }
                }
                None => {
                    item.guid = synthesise_guid(&[&item.link, &item.title, &item.content]);
                }
            }
            if item.link.is_empty() && guid_is_permalink && item.guid.starts_with("http") {
                item.link = item.guid.clone();
            }

            item.date_published = normalise_date(&item_el.child_text("pubDate"));

            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_feed;
    use super::super::md5_hex;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example channel</title>
    <link>https://example.com/</link>
    <description>All the news</description>
    <language>en-us</language>
    <copyright>© Example</copyright>
    <image><url>https://example.com/logo.png</url></image>
    <item>
      <title>First</title>
      <link>https://example.com/first</link>
      <guid isPermaLink="false">first-guid</guid>
      <description>short</description>
      <content:encoded><![CDATA[<p>full body</p>]]></content:encoded>
      <author>editor@example.com</author>
      <dc:creator>Alice</dc:creator>
      <comments>https://example.com/first#comments</comments>
      <category>news</category>
      <category>tech</category>
      <enclosure url="https://example.com/a.mp3" length="1234" type="audio/mpeg"/>
      <pubDate>Thu, 01 Jun 2023 10:00:00 +0200</pubDate>
    </item>
    <item>
      <title>No guid</title>
      <link>https://example.com/x</link>
      <description>body</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn channel_metadata() {
        let parser = parse_feed(FEED, "https://example.com/feed.xml").unwrap().unwrap();
        assert_eq!(parser.title(), "Example channel");
        assert_eq!(parser.link(), "https://example.com/");
        assert_eq!(parser.description(), "All the news");
        assert_eq!(parser.language(), "en-us");
        assert_eq!(parser.copyright(), "© Example");
        assert_eq!(parser.icon_url(), "https://example.com/logo.png");
    }

    #[test]
    fn item_fields_and_preferences() {
        let parser = parse_feed(FEED, "https://example.com/feed.xml").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.guid, "first-guid");
        assert_eq!(first.content, "<p>full body</p>");
        assert_eq!(first.author, "Alice"); // dc:creator wins over author
        assert_eq!(first.comments_url, "https://example.com/first#comments");
        assert_eq!(first.categories, vec!["news", "tech"]);
        assert_eq!(first.enclosures.len(), 1);
        assert_eq!(first.enclosures[0].size, 1234);
        assert_eq!(first.date_published, "2023-06-01T08:00:00Z");
    }

    #[test]
    fn guid_synthesis_hashes_the_link() {
        let parser = parse_feed(FEED, "https://example.com/feed.xml").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[1].guid, md5_hex("https://example.com/x"));
    }

    #[test]
    fn magnet_enclosures_are_tolerated() {
        let feed = r#"<rss version="2.0"><channel><title>t</title><item>
            <title>i</title><link>https://e.com/1</link>
            <enclosure url="magnet:?xt=urn:btih:abcdef" length="0" type="application/x-bittorrent"/>
        </item></channel></rss>"#;
        let parser = parse_feed(feed, "u").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[0].enclosures[0].url, "magnet:?xt=urn:btih:abcdef");
    }
}

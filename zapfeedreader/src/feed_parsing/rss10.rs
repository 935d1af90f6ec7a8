use super::xml::XmlElement;
use super::{normalise_date, synthesise_guid, FeedParser, FeedType, ParsedItem};

/// RSS 1.0 (RDF). Items sit next to the channel rather than inside it, carry
/// no guids by spec, and use the Dublin Core namespace for author and date.
pub struct Rss10Parser {
    doc: XmlElement,
}

impl Rss10Parser {
    pub fn new(doc: XmlElement) -> Self {
        Self { doc }
    }

    fn channel_text(&self, name: &str) -> String {
        self.doc
            .child("channel")
            .map(|c| c.child_text(name))
            .unwrap_or_default()
    }
}

impl FeedParser for Rss10Parser {
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
        String::new()
    }

    fn copyright(&self) -> String {
        String::new()
    }

    fn icon_url(&self) -> String {
        self.doc
            .child("image")
            .and_then(|i| i.attr("rdf:about"))
            .unwrap_or_default()
            .to_string()
    }

    fn items(&self) -> Vec<ParsedItem> {
        let mut items = Vec::new();
        for item_el in self.doc.children_named("item") {
            let mut item = ParsedItem {
                title: item_el.child_text("title"),
                link: item_el.child_text("link"),
                content: item_el.inner_xml_of("description"),
                ..ParsedItem::default()
            };

            // content:encoded carries the full body when present
            if let Some(encoded) = item_el.child("content:encoded") {
                item.content = encoded.text();
            }

            // no guids in RSS 1.0: hash the first available of link/title/body
            item.guid = synthesise_guid(&[&item.link, &item.title, &item.content]);

            if let Some(creator) = item_el.child("dc:creator") {
                item.author = creator.text();
            }
            if let Some(date) = item_el.child("dc:date") {
                item.date_published = normalise_date(&date.text());
            }

            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::super::{md5_hex, parse_feed};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel rdf:about="https://example.org/">
    <title>RDF channel</title>
    <link>https://example.org/</link>
    <description>An RDF feed</description>
  </channel>
  <image rdf:about="https://example.org/icon.png"><title>icon</title></image>
  <item rdf:about="https://example.org/one">
    <title>One</title>
    <link>https://example.org/one</link>
    <description>summary one</description>
    <content:encoded><![CDATA[<p>one, in full</p>]]></content:encoded>
    <dc:creator>Bob</dc:creator>
    <dc:date>2023-03-05T12:30:00+01:00</dc:date>
  </item>
  <item rdf:about="https://example.org/two">
    <title>Two</title>
    <description>summary two</description>
  </item>
</rdf:RDF>"#;

    #[test]
    fn channel_metadata_and_icon() {
        let parser = parse_feed(FEED, "https://example.org/feed.rdf").unwrap().unwrap();
        assert_eq!(parser.title(), "RDF channel");
        assert_eq!(parser.link(), "https://example.org/");
        assert_eq!(parser.description(), "An RDF feed");
        assert_eq!(parser.icon_url(), "https://example.org/icon.png");
    }

    #[test]
    fn items_with_synthesised_guids() {
        let parser = parse_feed(FEED, "https://example.org/feed.rdf").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items.len(), 2);

        // guid is the MD5 of the link when one exists
        assert_eq!(items[0].guid, md5_hex("https://example.org/one"));
        assert_eq!(items[0].content, "<p>one, in full</p>");
        assert_eq!(items[0].author, "Bob");
        assert_eq!(items[0].date_published, "2023-03-05T11:30:00Z");

        // no link: guid falls back to the title hash
        assert_eq!(items[1].guid, md5_hex("Two"));
        assert_eq!(items[1].content, "summary two");
    }
}

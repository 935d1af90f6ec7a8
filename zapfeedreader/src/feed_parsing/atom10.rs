use url::Url;

use super::xml::XmlElement;
use super::{normalise_date, FeedParser, FeedType, ParsedItem};
use crate::model::Enclosure;

/// Atom 1.0. Links are relation-tagged, enclosures appear both as
/// `link[rel=enclosure]` and as nonstandard `<enclosure>` elements, and
/// YouTube entries carry their body in the Media RSS extension.
pub struct Atom10Parser {
    doc: XmlElement,
    url: String,
}

impl Atom10Parser {
    pub fn new(doc: XmlElement, url: &str) -> Self {
        Self {
            doc,
            url: url.to_string(),
        }
    }

    /// Reddit Atom entries frequently lack an alternate link; the guid is the
    /// post id prefixed with `t3_`, which maps straight onto a comments URL.
    fn post_process_item(&self, item: &mut ParsedItem) {
        let host = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        if host.ends_with("reddit.com") && item.link.is_empty() && !item.guid.is_empty() {
            if let Ok(mut base) = Url::parse(&self.url) {
                let post_id = item.guid.replace("t3_", "");
                base.set_path(&post_id);
                base.set_query(None);
                base.set_fragment(None);
                item.link = base.to_string();
            }
        }
    }
}

fn entry_content(entry: &XmlElement) -> String {
    // summary is the fallback body
    let mut content = entry.inner_xml_of("summary");

    if let Some(content_el) = entry.child("content") {
        // a src attribute means the body lives elsewhere; keep the summary
        if !content_el.has_attr("src") {
            let content_type = content_el.attr("type").unwrap_or("text");
            if content_type == "text" {
                content = format!("<pre>{}</pre>", content_el.text());
            } else {
                content = content_el.inner_xml();
            }
        }
    }
    content
}

fn media_fallback(entry: &XmlElement, item: &mut ParsedItem) {
    let group = match entry.child("media:group") {
        Some(g) => g,
        None => return,
    };

    let mut snippet = String::new();
    if let Some(thumbnail) = group.child("media:thumbnail").and_then(|t| t.attr("url")) {
        item.thumbnail = Some(thumbnail.to_string());
        snippet.push_str(&format!(
            r#"<a href="{}"><img src="{}" alt="" /></a>"#,
            item.link, thumbnail
        ));
    }
    if let Some(description) = group.child("media:description") {
        if description.attr("type") == Some("html") {
            snippet.push_str(&format!("<p>{}</p>", description.text()));
        } else {
            snippet.push_str(&format!("<p>{}</p>", description.text().replace('\n', "<br />")));
        }
    }
    item.content = snippet;
}

impl FeedParser for Atom10Parser {
    fn feed_type(&self) -> FeedType {
        FeedType::Atom
    }

    fn guid(&self) -> String {
        self.doc.child_text("id")
    }

    fn title(&self) -> String {
        self.doc.child_text("title")
    }

    fn subtitle(&self) -> String {
        self.doc.child_text("subtitle")
    }

    fn link(&self) -> String {
        for link_el in self.doc.children_named("link") {
            if link_el.attr("rel") == Some("alternate") {
                if let Some(href) = link_el.attr("href") {
                    return href.to_string();
                }
            }
        }
        String::new()
    }

    fn description(&self) -> String {
        String::new()
    }

    fn language(&self) -> String {
        self.doc.attr("xml:lang").unwrap_or_default().to_string()
    }

    fn copyright(&self) -> String {
        self.doc.child_text("rights")
    }

    fn icon_url(&self) -> String {
        String::new()
    }

    fn items(&self) -> Vec<ParsedItem> {
        let mut items = Vec::new();

        for entry in self.doc.children_named("entry") {
            let mut item = ParsedItem {
                title: entry.child_text("title"),
                guid: entry.child_text("id"),
                ..ParsedItem::default()
            };

            for link_el in entry.children_named("link") {
                let href = match link_el.attr("href") {
                    Some(h) => h,
                    None => continue,
                };
                match link_el.attr("rel") {
                    Some("enclosure") => {
                        item.enclosures.push(Enclosure {
                            url: href.to_string(),
                            mime_type: link_el.attr("type").unwrap_or_default().to_string(),
                            size: link_el.attr("length").and_then(|l| l.parse().ok()).unwrap_or(0),
                        });
                    }
                    Some("alternate") | None => {
                        if item.link.is_empty() {
                            item.link = href.to_string();
                        }
                    }
                    Some(_) => {}
                }
            }

            // some feeds also put <enclosure> elements within entries (diverges from spec, but allow anyway)
            // try url/href, length and type as attributes
            for enclosure_el in entry.children_named("enclosure") {
                let url = enclosure_el
                    .attr("href")
                    .or_else(|| enclosure_el.attr("url"))
                    .unwrap_or_default()
                    .to_string();
                if url.is_empty() {
                    continue;
                }
                item.enclosures.push(Enclosure {
                    url,
                    mime_type: enclosure_el.attr("type").unwrap_or_default().to_string(),
                    size: enclosure_el.attr("length").and_then(|l| l.parse().ok()).unwrap_or(0),
                });
            }

            item.content = entry_content(entry);
            if item.content.is_empty() {
                // see if there's a media:thumbnail/media:description present (for YouTube)
                media_fallback(entry, &mut item);
            }

            if let Some(author) = entry.child("author") {
                item.author = author.child_text("name");
            }

            item.date_published = normalise_date(&entry.child_text("updated"));

            for category_el in entry.children_named("category") {
                if let Some(term) = category_el.attr("term") {
                    item.categories.push(term.to_string());
                }
            }

            self.post_process_item(&mut item);
            items.push(item);
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_feed;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en">
  <id>urn:example:feed</id>
  <title>Atom example</title>
  <subtitle>All the atoms</subtitle>
  <rights>© Atoms Inc</rights>
  <link rel="self" href="https://example.net/feed.atom"/>
  <link rel="alternate" href="https://example.net/"/>
  <entry>
    <id>urn:example:1</id>
    <title>Entry one</title>
    <link rel="alternate" href="https://example.net/one"/>
    <link rel="enclosure" href="file:///dummy" length="100" type="image/jpeg"/>
    <link rel="enclosure" href="file:///dummy2" length="200" type="image/png"/>
    <link rel="enclosure" href="file:///dummy3" length="300" type="image/gif"/>
    <summary>summary text</summary>
    <content type="html">&lt;p&gt;the body&lt;/p&gt;</content>
    <author><name>Carol</name></author>
    <category term="science"/>
    <updated>2023-01-02T03:04:05Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn feed_metadata() {
        let parser = parse_feed(FEED, "https://example.net/feed.atom").unwrap().unwrap();
        assert_eq!(parser.guid(), "urn:example:feed");
        assert_eq!(parser.title(), "Atom example");
        assert_eq!(parser.subtitle(), "All the atoms");
        assert_eq!(parser.copyright(), "© Atoms Inc");
        assert_eq!(parser.link(), "https://example.net/");
        assert_eq!(parser.language(), "en");
    }

    #[test]
    fn enclosure_links_round_trip_in_order() {
        let parser = parse_feed(FEED, "https://example.net/feed.atom").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items.len(), 1);
        let enclosures = &items[0].enclosures;
        assert_eq!(enclosures.len(), 3);
        assert_eq!(enclosures[0].url, "file:///dummy");
        assert_eq!(enclosures[0].size, 100);
        assert_eq!(enclosures[0].mime_type, "image/jpeg");
        assert_eq!(enclosures[1].url, "file:///dummy2");
        assert_eq!(enclosures[1].size, 200);
        assert_eq!(enclosures[1].mime_type, "image/png");
        assert_eq!(enclosures[2].url, "file:///dummy3");
        assert_eq!(enclosures[2].size, 300);
        assert_eq!(enclosures[2].mime_type, "image/gif");
        assert_eq!(items[0].link, "https://example.net/one");
    }

    #[test]
    fn html_content_wins_over_summary() {
        let parser = parse_feed(FEED, "https://example.net/feed.atom").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[0].content, "<p>the body</p>");
        assert_eq!(items[0].author, "Carol");
        assert_eq!(items[0].categories, vec!["science"]);
        assert_eq!(items[0].date_published, "2023-01-02T03:04:05Z");
    }

    #[test]
    fn text_content_is_wrapped_in_pre() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title>
          <entry><id>e1</id><title>x</title>
            <content type="text">plain words</content>
            <updated>2023-01-01T00:00:00Z</updated>
          </entry></feed>"#;
        let parser = parse_feed(feed, "u").unwrap().unwrap();
        assert_eq!(parser.items()[0].content, "<pre>plain words</pre>");
    }

    #[test]
    fn media_group_fallback_builds_snippet() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
          <title>yt</title>
          <entry>
            <id>yt:video:abc</id><title>clip</title>
            <link rel="alternate" href="https://www.youtube.com/watch?v=abc"/>
            <media:group>
              <media:thumbnail url="https://i.ytimg.com/vi/abc/hq.jpg"/>
              <media:description>line one
line two</media:description>
            </media:group>
            <updated>2023-01-01T00:00:00Z</updated>
          </entry></feed>"#;
        let parser = parse_feed(feed, "https://www.youtube.com/feeds/videos.xml?channel_id=c").unwrap().unwrap();
        let items = parser.items();
        assert_eq!(items[0].thumbnail.as_deref(), Some("https://i.ytimg.com/vi/abc/hq.jpg"));
        assert!(items[0].content.contains(r#"<img src="https://i.ytimg.com/vi/abc/hq.jpg""#));
        assert!(items[0].content.contains("line one<br />line two"));
    }

    #[test]
    fn reddit_entries_synthesise_their_link_from_the_guid() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>r/rust</title>
          <entry><id>t3_abc123</id><title>post</title>
            <updated>2023-01-01T00:00:00Z</updated>
          </entry></feed>"#;
        let parser = parse_feed(feed, "https://www.reddit.com/r/rust/.rss").unwrap().unwrap();
        assert_eq!(parser.items()[0].link, "https://www.reddit.com/abc123");
    }
}

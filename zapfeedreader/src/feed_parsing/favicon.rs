use scraper::{Html, Selector};
use sqlx::SqlitePool;
use url::Url;

use crate::fetch;

/// Locates the site icon for a page: the YouTube channel avatar when the host
/// is a YouTube property, otherwise the first `<link rel="...icon...">`, with
/// `/favicon.ico` as the last resort. The result is always absolute.
pub async fn fav_icon(pool: Option<&SqlitePool>, page_url: &str, associated_feed_id: Option<i64>) -> String {
    if page_url.is_empty() {
        return String::new();
    }

    let body = match fetch::get(pool, page_url, associated_feed_id).await {
        Ok(response) => response.text(),
        Err(_) => String::new(),
    };

    fav_icon_in_body(page_url, &body)
}

/// The inspection half of `fav_icon`, separated so page bodies can be fed in
/// directly.
pub fn fav_icon_in_body(page_url: &str, body: &str) -> String {
    // exception for YouTube: extract the channel image from the ytInitialData variable
    let host = Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    if host.ends_with("youtube.com") {
        if let Some(avatar) = youtube_channel_avatar(body) {
            return make_absolute(page_url, &avatar);
        }
    }

    let mut icon = icon_link_href(body);
    if icon.is_empty() {
        // point to <site>/favicon.ico as a last resort
        if let Ok(mut url) = Url::parse(page_url) {
            url.set_path("/favicon.ico");
            url.set_query(None);
            url.set_fragment(None);
            icon = url.to_string();
        }
    }

    make_absolute(page_url, &icon)
}

/// Digs `metadata.channelMetadataRenderer.avatar.thumbnails[0].url` out of
/// the embedded `ytInitialData` JSON block.
fn youtube_channel_avatar(body: &str) -> Option<String> {
    let start = body.find("var ytInitialData = ")? + "var ytInitialData = ".len();
    let rest = &body[start..];
    let end = rest.find("};")?;
    let json_blob = &rest[..=end];

    let root: serde_json::Value = serde_json::from_str(json_blob).ok()?;
    root.get("metadata")?
        .get("channelMetadataRenderer")?
        .get("avatar")?
        .get("thumbnails")?
        .get(0)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

/// First `<link>` whose rel mentions "icon". The HTML5 parser recovers on
/// malformed markup, so a single pass suffices.
fn icon_link_href(body: &str) -> String {
    let document = Html::parse_document(body);
    let link_selector = match Selector::parse("link") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    for el in document.select(&link_selector) {
        let link = el.value();
        if let (Some(rel), Some(href)) = (link.attr("rel"), link.attr("href")) {
            if rel.contains("icon") {
                return href.to_string();
            }
        }
    }
    String::new()
}

fn make_absolute(page_url: &str, icon: &str) -> String {
    if icon.is_empty() || icon.starts_with("http") {
        return icon.to_string();
    }
    match Url::parse(page_url).and_then(|base| base.join(icon)) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => icon.to_string(),
    }
}

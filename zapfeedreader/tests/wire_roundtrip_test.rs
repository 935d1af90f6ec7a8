use zapfeedreader::model::{
    Category, Enclosure, Feed, FlagColor, Folder, Post, Script, ScriptEvent, ScriptFolder, Statistics,
};

#[test]
fn post_wire_round_trip_preserves_all_fields() {
    let post = Post {
        id: 17,
        feed_id: 3,
        feed_title: "A feed".into(),
        is_read: true,
        title: "A title".into(),
        link: "https://example.com/a".into(),
        content: "<p>body</p>".into(),
        author: "Alice".into(),
        comments_url: "https://example.com/a#comments".into(),
        guid: "guid-17".into(),
        date_published: "2023-06-01T08:00:00Z".into(),
        thumbnail: Some("https://example.com/a.jpg".into()),
        enclosures: vec![Enclosure {
            url: "https://example.com/a.mp3".into(),
            mime_type: "audio/mpeg".into(),
            size: 1234,
        }],
        categories: vec![Category {
            id: 5,
            feed_id: 3,
            title: "news".into(),
        }],
        flag_colors: vec![FlagColor::Red, FlagColor::Blue],
        script_folder_ids: vec![7, 8],
    };

    let json = serde_json::to_string(&post).expect("encode");
    // the protocol's fixed key names are on the wire
    assert!(json.contains("\"postID\":17"));
    assert!(json.contains("\"feedID\":3"));
    assert!(json.contains("\"isRead\":true"));
    assert!(json.contains("\"datePublished\""));
    assert!(json.contains("\"enclosureURL\""));
    assert!(json.contains("\"flagColors\":[\"red\",\"blue\"]"));

    let back: Post = serde_json::from_str(&json).expect("decode");
    assert_eq!(back.id, post.id);
    assert_eq!(back.feed_id, post.feed_id);
    assert_eq!(back.feed_title, post.feed_title);
    assert_eq!(back.is_read, post.is_read);
    assert_eq!(back.title, post.title);
    assert_eq!(back.link, post.link);
    assert_eq!(back.content, post.content);
    assert_eq!(back.author, post.author);
    assert_eq!(back.comments_url, post.comments_url);
    assert_eq!(back.guid, post.guid);
    assert_eq!(back.date_published, post.date_published);
    assert_eq!(back.thumbnail, post.thumbnail);
    assert_eq!(back.enclosures, post.enclosures);
    assert_eq!(back.categories, post.categories);
    assert_eq!(back.flag_colors, post.flag_colors);
    assert_eq!(back.script_folder_ids, post.script_folder_ids);
}

#[test]
fn feed_wire_round_trip_preserves_all_fields() {
    let feed = Feed {
        id: 9,
        folder_id: 2,
        url: "https://example.com/feed.xml".into(),
        guid: "urn:feed".into(),
        title: "Feed".into(),
        subtitle: "sub".into(),
        link: "https://example.com".into(),
        description: "desc".into(),
        language: "en".into(),
        copyright: "©".into(),
        icon_url: "https://example.com/icon.png".into(),
        icon_hash: "0123456789abcdef0123456789abcdef".into(),
        icon_last_fetched: "2023-06-01T00:00:00Z".into(),
        last_checked: "2023-06-02T00:00:00Z".into(),
        last_refresh_error: Some("HTTP status 500 received".into()),
        refresh_interval: Some(600),
        sort_order: 20,
        unread_count: 4,
        icon: None,
        statistics: Some(Statistics {
            post_count: 100,
            flagged_post_count: 3,
            oldest_post: Some("2020-01-01T00:00:00Z".into()),
            newest_post: Some("2023-06-01T00:00:00Z".into()),
        }),
    };

    let json = serde_json::to_string(&feed).expect("encode");
    assert!(json.contains("\"feedID\":9"));
    assert!(json.contains("\"iconHash\""));
    assert!(json.contains("\"refreshInterval\":600"));

    let back: Feed = serde_json::from_str(&json).expect("decode");
    assert_eq!(back.id, feed.id);
    assert_eq!(back.folder_id, feed.folder_id);
    assert_eq!(back.url, feed.url);
    assert_eq!(back.guid, feed.guid);
    assert_eq!(back.title, feed.title);
    assert_eq!(back.subtitle, feed.subtitle);
    assert_eq!(back.link, feed.link);
    assert_eq!(back.description, feed.description);
    assert_eq!(back.language, feed.language);
    assert_eq!(back.copyright, feed.copyright);
    assert_eq!(back.icon_url, feed.icon_url);
    assert_eq!(back.icon_hash, feed.icon_hash);
    assert_eq!(back.last_checked, feed.last_checked);
    assert_eq!(back.last_refresh_error, feed.last_refresh_error);
    assert_eq!(back.refresh_interval, feed.refresh_interval);
    assert_eq!(back.sort_order, feed.sort_order);
    assert_eq!(back.unread_count, feed.unread_count);
}

#[test]
fn folder_script_and_scriptfolder_round_trips() {
    let folder = Folder {
        id: 4,
        parent_id: 1,
        title: "Tech".into(),
        sort_order: 30,
    };
    let json = serde_json::to_string(&folder).expect("encode");
    assert!(json.contains("\"folderID\":4"));
    assert!(json.contains("\"parentFolderID\":1"));
    let back: Folder = serde_json::from_str(&json).expect("decode");
    assert_eq!(back.id, folder.id);
    assert_eq!(back.parent_id, folder.parent_id);
    assert_eq!(back.title, folder.title);
    assert_eq!(back.sort_order, folder.sort_order);

    let script = Script {
        id: 6,
        typ: "lua".into(),
        title: "tagger".into(),
        is_enabled: true,
        run_on_events: vec![ScriptEvent::NewPost, ScriptEvent::UpdatePost],
        run_on_feed_ids: Some(vec![1, 2, 3]),
        script: "post.isRead = true".into(),
    };
    let json = serde_json::to_string(&script).expect("encode");
    // event identifiers are protocol
    assert!(json.contains("\"runOnEvents\":[\"newpost\",\"updatepost\"]"));
    assert!(json.contains("\"runOnFeedIDs\":[1,2,3]"));
    let back: Script = serde_json::from_str(&json).expect("decode");
    assert_eq!(back.id, script.id);
    assert_eq!(back.typ, script.typ);
    assert_eq!(back.is_enabled, script.is_enabled);
    assert_eq!(back.run_on_events, script.run_on_events);
    assert_eq!(back.run_on_feed_ids, script.run_on_feed_ids);
    assert_eq!(back.script, script.script);

    let script_folder = ScriptFolder {
        id: 2,
        title: "Bucket".into(),
        show_total: true,
        show_unread: false,
        total_post_count: 12,
        total_unread_count: 5,
    };
    let json = serde_json::to_string(&script_folder).expect("encode");
    assert!(json.contains("\"scriptFolderID\":2"));
    let back: ScriptFolder = serde_json::from_str(&json).expect("decode");
    assert_eq!(back.id, script_folder.id);
    assert_eq!(back.title, script_folder.title);
    assert_eq!(back.show_total, script_folder.show_total);
    assert_eq!(back.show_unread, script_folder.show_unread);
    assert_eq!(back.total_post_count, script_folder.total_post_count);
    assert_eq!(back.total_unread_count, script_folder.total_unread_count);
}

use serde_json::json;

use zapfeedreader::backend::{Backend, FeedFetchOptions};
use zapfeedreader::error::Error;
use zapfeedreader::model::{ParentType, PostFilter, RemoteSourceSettings, Source, SourceType};
use zapfeedreader::remote::RemoteBackend;

fn remote_source(server: &mockito::Server) -> Source {
    let url = url::Url::parse(&server.url()).expect("server url");
    let settings = RemoteSourceSettings {
        host: url.host_str().unwrap_or("127.0.0.1").to_string(),
        port: url.port().unwrap_or(80),
        login: "alice".into(),
        password: "hunter2".into(),
        use_https: false,
    };
    Source {
        id: 2,
        typ: SourceType::Remote,
        title: "peer".into(),
        sort_order: 20,
        config_data: Some(serde_json::to_string(&settings).expect("settings")),
        last_error: None,
    }
}

fn feed_json(id: i64, title: &str) -> serde_json::Value {
    json!({
        "feedID": id,
        "folderID": 0,
        "url": format!("https://example.com/{id}.xml"),
        "guid": "",
        "title": title,
        "subtitle": "",
        "link": "",
        "description": "",
        "language": "",
        "copyright": "",
        "iconURL": "",
        "iconHash": "",
        "iconLastFetched": "",
        "lastChecked": "2023-06-01T00:00:00Z",
        "lastRefreshError": null,
        "refreshInterval": null,
        "sortOrder": 10,
        "unreadCount": 3
    })
}

#[tokio::test]
async fn feeds_are_listed_from_the_peer() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/feeds")
        .match_query(mockito::Matcher::UrlEncoded("getIcons".into(), "false".into()))
        .with_status(200)
        .with_body(json!([feed_json(1, "one"), feed_json(2, "two")]).to_string())
        .create_async()
        .await;

    let backend = RemoteBackend::from_source(&remote_source(&server)).expect("backend");
    let feeds = backend.get_feeds(false).await.expect("feeds");
    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds[0].title, "one");
    assert_eq!(feeds[1].unread_count, 3);
}

#[tokio::test]
async fn post_listing_sends_the_filter_as_wire_parameters() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/posts")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("parentType".into(), "feed".into()),
            mockito::Matcher::UrlEncoded("parentID".into(), "7".into()),
            mockito::Matcher::UrlEncoded("perPage".into(), "25".into()),
            mockito::Matcher::UrlEncoded("page".into(), "2".into()),
            mockito::Matcher::UrlEncoded("showOnlyUnread".into(), "true".into()),
            mockito::Matcher::UrlEncoded("searchFilter".into(), "apple".into()),
            mockito::Matcher::UrlEncoded("flagColor".into(), "red".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "count": 1,
                "posts": [{
                    "postID": 11,
                    "feedID": 7,
                    "feedTitle": "peer feed",
                    "isRead": false,
                    "title": "apple pie",
                    "link": "https://example.com/apple",
                    "content": "",
                    "author": "",
                    "commentsURL": "",
                    "guid": "g-11",
                    "datePublished": "2023-06-01T00:00:00Z",
                    "thumbnail": null
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let backend = RemoteBackend::from_source(&remote_source(&server)).expect("backend");
    let mut filter = PostFilter::new(ParentType::Feed(7), 25, 2);
    filter.show_only_unread = true;
    filter.search_filter = "apple".into();
    filter.flag_color = zapfeedreader::model::FlagColor::Red;

    let (count, posts) = backend.get_posts(&filter).await.expect("posts");
    assert_eq!(count, 1);
    assert_eq!(posts[0].id, 11);
    assert_eq!(posts[0].feed_title, "peer feed");
}

#[tokio::test]
async fn validation_failures_surface_as_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/feed")
        .with_status(200)
        .with_body(json!({ "success": false, "error": "Unknown feed type" }).to_string())
        .create_async()
        .await;

    let backend = RemoteBackend::from_source(&remote_source(&server)).expect("backend");
    let err = backend.subscribe_feed("https://bad.example/feed", 0).await.unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
    assert!(err.to_string().contains("Unknown feed type"));
}

#[tokio::test]
async fn unknown_entities_map_to_not_found() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", mockito::Matcher::Regex("^/feed/99".to_string()))
        .with_status(404)
        .with_body(json!({ "success": false, "error": "404 - not found" }).to_string())
        .create_async()
        .await;

    let backend = RemoteBackend::from_source(&remote_source(&server)).expect("backend");
    let err = backend.get_feed(99, FeedFetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn unread_counts_decode_the_wire_map() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/unread-counts")
        .with_status(200)
        .with_body(json!({ "3": 7, "5": 0 }).to_string())
        .create_async()
        .await;

    let backend = RemoteBackend::from_source(&remote_source(&server)).expect("backend");
    let counts = backend.get_unread_counts().await.expect("counts");
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].feed_id, 3);
    assert_eq!(counts[0].unread_count, 7);
}

use sqlx::SqlitePool;
use tempfile::TempDir;

use zapfeedreader::backend::Backend;
use zapfeedreader::local::{sources, LocalBackend};
use zapfeedreader::model::{
    FeedAndPostID, FlagColor, ParentType, PostFilter, RemoteSourceSettings, SourceType,
};

async fn setup() -> (TempDir, SqlitePool, LocalBackend) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("test.db");
    let pool = common::init_db_pool(&db_path.to_string_lossy()).await.expect("init pool");
    zapfeedreader::db::ensure_schema(&pool).await.expect("ensure schema");
    let backend = LocalBackend::new(pool.clone(), dir.path().join("icons"));
    (dir, pool, backend)
}

async fn insert_feed(pool: &SqlitePool, title: &str, folder: i64) -> i64 {
    sqlx::query_scalar("INSERT INTO feeds (url, folder, title, sortOrder) VALUES (?, ?, ?, 10) RETURNING id")
        .bind(format!("https://example.com/{title}.xml"))
        .bind(folder)
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("insert feed")
}

async fn insert_post(pool: &SqlitePool, feed_id: i64, guid: &str, title: &str, date: &str, is_read: bool) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO posts (feedID, isRead, title, link, content, author, commentsURL, guid, datePublished) \
         VALUES (?, ?, ?, '', 'content', '', '', ?, ?) RETURNING id",
    )
    .bind(feed_id)
    .bind(is_read)
    .bind(title)
    .bind(guid)
    .bind(date)
    .fetch_one(pool)
    .await
    .expect("insert post")
}

async fn insert_folder(pool: &SqlitePool, parent: i64, title: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO folders (parent, title, sortOrder) VALUES (?, ?, 10) RETURNING id")
        .bind(parent)
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("insert folder")
}

#[tokio::test]
async fn mark_feed_read_respects_max_post_id() {
    let (_dir, pool, backend) = setup().await;
    let feed = insert_feed(&pool, "news", 0).await;

    let p1 = insert_post(&pool, feed, "g1", "one", "2023-01-01T00:00:00Z", false).await;
    let p2 = insert_post(&pool, feed, "g2", "two", "2023-01-02T00:00:00Z", false).await;
    let p3 = insert_post(&pool, feed, "g3", "three", "2023-01-03T00:00:00Z", false).await;

    backend.mark_feed_read(feed, p2 as u64).await.expect("mark read");

    let read_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE isRead = TRUE ORDER BY id")
        .fetch_all(&pool)
        .await
        .expect("query");
    assert_eq!(read_ids, vec![p1, p2]);

    // the sentinel flips everything that is left
    backend.mark_feed_read(feed, u64::MAX).await.expect("mark all read");
    let unread: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE isRead = FALSE")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(unread, 0);
    let _ = p3;
}

#[tokio::test]
async fn script_folder_mark_read_reports_affected_feeds() {
    let (_dir, pool, backend) = setup().await;
    let feed_a = insert_feed(&pool, "a", 0).await;
    let feed_b = insert_feed(&pool, "b", 0).await;
    let feed_c = insert_feed(&pool, "c", 0).await;

    let pa = insert_post(&pool, feed_a, "ga", "a1", "2023-01-01T00:00:00Z", false).await;
    let pb = insert_post(&pool, feed_b, "gb", "b1", "2023-01-02T00:00:00Z", false).await;
    // feed_c's post is already read, so it must not be reported
    let pc = insert_post(&pool, feed_c, "gc", "c1", "2023-01-03T00:00:00Z", true).await;

    let sf = backend.add_script_folder("bucket", true, true).await.expect("add sf");
    backend
        .assign_posts_to_script_folder(
            sf.id,
            true,
            &[
                FeedAndPostID { feed_id: feed_a, post_id: pa },
                FeedAndPostID { feed_id: feed_b, post_id: pb },
                FeedAndPostID { feed_id: feed_c, post_id: pc },
            ],
        )
        .await
        .expect("assign");

    let mut affected = backend.mark_script_folder_read(sf.id, u64::MAX).await.expect("mark read");
    affected.sort_unstable();
    assert_eq!(affected, vec![feed_a, feed_b]);
}

#[tokio::test]
async fn folder_deletion_cascades_without_orphans() {
    let (_dir, pool, backend) = setup().await;
    let root = insert_folder(&pool, 0, "root").await;
    let child = insert_folder(&pool, root, "child").await;
    let feed = insert_feed(&pool, "inside", child).await;
    let post = insert_post(&pool, feed, "g1", "post", "2023-01-01T00:00:00Z", false).await;

    // satellite rows of every kind
    sqlx::query("INSERT INTO post_enclosures (postID, url, size, mimeType) VALUES (?, 'https://e/x.mp3', 1, 'audio/mpeg')")
        .bind(post)
        .execute(&pool)
        .await
        .expect("enclosure");
    let category: i64 = sqlx::query_scalar("INSERT INTO categories (feedID, title) VALUES (?, 'cat') RETURNING id")
        .bind(feed)
        .fetch_one(&pool)
        .await
        .expect("category");
    sqlx::query("INSERT INTO post_categories (postID, categoryID) VALUES (?, ?)")
        .bind(post)
        .bind(category)
        .execute(&pool)
        .await
        .expect("post category");
    sqlx::query("INSERT INTO flags (postID, flagID) VALUES (?, ?)")
        .bind(post)
        .bind(FlagColor::Red.id())
        .execute(&pool)
        .await
        .expect("flag");
    let sf = backend.add_script_folder("bucket", false, false).await.expect("sf");
    sqlx::query("INSERT INTO scriptfolder_posts (scriptFolderID, postID) VALUES (?, ?)")
        .bind(sf.id)
        .bind(post)
        .execute(&pool)
        .await
        .expect("sf post");

    backend.delete_folder(root).await.expect("delete folder");

    for (table, column, value) in [
        ("folders", "id", root),
        ("folders", "id", child),
        ("feeds", "id", feed),
        ("posts", "feedID", feed),
        ("post_enclosures", "postID", post),
        ("post_categories", "postID", post),
        ("flags", "postID", post),
        ("scriptfolder_posts", "postID", post),
        ("categories", "feedID", feed),
    ] {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
        let count: i64 = sqlx::query_scalar(&sql).bind(value).fetch_one(&pool).await.expect("count");
        assert_eq!(count, 0, "orphan rows left in {table}");
    }
}

#[tokio::test]
async fn post_listing_composes_filters() {
    let (_dir, pool, backend) = setup().await;
    let feed = insert_feed(&pool, "filtered", 0).await;

    let p_old = insert_post(&pool, feed, "g1", "an apple a day", "2023-01-01T00:00:00Z", true).await;
    let p_mid = insert_post(&pool, feed, "g2", "banana bread", "2023-02-01T00:00:00Z", false).await;
    let p_new = insert_post(&pool, feed, "g3", "apple pie", "2023-03-01T00:00:00Z", false).await;

    // newest first, full listing
    let (count, posts) = backend
        .get_posts(&PostFilter::new(ParentType::Feed(feed), 10, 1))
        .await
        .expect("list");
    assert_eq!(count, 3);
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![p_new, p_mid, p_old]);

    // unread only
    let mut filter = PostFilter::new(ParentType::Feed(feed), 10, 1);
    filter.show_only_unread = true;
    let (count, _) = backend.get_posts(&filter).await.expect("unread");
    assert_eq!(count, 2);

    // search filter matches title or content with wildcards on both sides
    let mut filter = PostFilter::new(ParentType::Feed(feed), 10, 1);
    filter.search_filter = "apple".into();
    let (count, posts) = backend.get_posts(&filter).await.expect("search");
    assert_eq!(count, 2);
    assert_eq!(posts[0].id, p_new);

    // flag filter
    sqlx::query("INSERT INTO flags (postID, flagID) VALUES (?, ?)")
        .bind(p_mid)
        .bind(FlagColor::Blue.id())
        .execute(&pool)
        .await
        .expect("flag");
    let mut filter = PostFilter::new(ParentType::Feed(feed), 10, 1);
    filter.flag_color = FlagColor::Blue;
    let (count, posts) = backend.get_posts(&filter).await.expect("flagged");
    assert_eq!(count, 1);
    assert_eq!(posts[0].id, p_mid);

    // pagination
    let (count, page2) = backend
        .get_posts(&PostFilter::new(ParentType::Feed(feed), 2, 2))
        .await
        .expect("page 2");
    assert_eq!(count, 3);
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].id, p_old);
}

#[tokio::test]
async fn category_filter_matches_across_feeds() {
    let (_dir, pool, backend) = setup().await;
    let feed_a = insert_feed(&pool, "a", 0).await;
    let feed_b = insert_feed(&pool, "b", 0).await;
    let pa = insert_post(&pool, feed_a, "ga", "a", "2023-01-01T00:00:00Z", false).await;
    let pb = insert_post(&pool, feed_b, "gb", "b", "2023-01-02T00:00:00Z", false).await;
    insert_post(&pool, feed_b, "gb2", "b2", "2023-01-03T00:00:00Z", false).await;

    // the same category title exists in both feeds with distinct ids
    let cat_a: i64 = sqlx::query_scalar("INSERT INTO categories (feedID, title) VALUES (?, 'science') RETURNING id")
        .bind(feed_a)
        .fetch_one(&pool)
        .await
        .expect("cat a");
    let cat_b: i64 = sqlx::query_scalar("INSERT INTO categories (feedID, title) VALUES (?, 'science') RETURNING id")
        .bind(feed_b)
        .fetch_one(&pool)
        .await
        .expect("cat b");
    sqlx::query("INSERT INTO post_categories (postID, categoryID) VALUES (?, ?)")
        .bind(pa)
        .bind(cat_a)
        .execute(&pool)
        .await
        .expect("link a");
    sqlx::query("INSERT INTO post_categories (postID, categoryID) VALUES (?, ?)")
        .bind(pb)
        .bind(cat_b)
        .execute(&pool)
        .await
        .expect("link b");

    // filtering on one feed's category id still matches the other feed's posts
    let mut filter = PostFilter::new(ParentType::Source, 10, 1);
    filter.category_id = Some(cat_a);
    let (count, posts) = backend.get_posts(&filter).await.expect("category filter");
    assert_eq!(count, 2);
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![pb, pa]);
}

#[tokio::test]
async fn sources_enumeration_and_local_delete_is_a_noop() {
    let (_dir, pool, _backend) = setup().await;

    sources::add_remote(
        &pool,
        "peer",
        &RemoteSourceSettings {
            host: "peer.example".into(),
            port: 16016,
            login: "alice".into(),
            password: "hunter2".into(),
            use_https: false,
        },
    )
    .await
    .expect("add remote");

    assert_eq!(sources::list(&pool, None).await.expect("all").len(), 2);
    assert_eq!(sources::list(&pool, Some(SourceType::Remote)).await.expect("remote").len(), 1);

    let local = sources::list(&pool, Some(SourceType::Local)).await.expect("local")[0].clone();
    sources::delete(&pool, local.id).await.expect("delete local");
    // deleting the local source must not remove anything
    assert_eq!(sources::list(&pool, None).await.expect("all").len(), 2);

    let remote = sources::list(&pool, Some(SourceType::Remote)).await.expect("remote")[0].clone();
    sources::delete(&pool, remote.id).await.expect("delete remote");
    assert_eq!(sources::list(&pool, None).await.expect("all").len(), 1);
}

#[tokio::test]
async fn folder_sort_renumbers_in_steps_of_ten() {
    let (_dir, pool, backend) = setup().await;
    let parent = insert_folder(&pool, 0, "parent").await;
    let f_c = insert_folder(&pool, parent, "cherry").await;
    let f_a = insert_folder(&pool, parent, "apple").await;
    let f_b = insert_folder(&pool, parent, "banana").await;

    let result = backend
        .sort_folder(parent, zapfeedreader::model::SortMethod::AlphabeticallyAscending)
        .await
        .expect("sort");

    assert_eq!(result.folder_sort_orders.get(&f_a), Some(&10));
    assert_eq!(result.folder_sort_orders.get(&f_b), Some(&20));
    assert_eq!(result.folder_sort_orders.get(&f_c), Some(&30));
}

#[tokio::test]
async fn status_reports_errors_and_unread_counts() {
    let (_dir, pool, backend) = setup().await;
    let healthy = insert_feed(&pool, "healthy", 0).await;
    let broken = insert_feed(&pool, "broken", 0).await;
    sqlx::query("UPDATE feeds SET lastRefreshError = 'HTTP status 404 received' WHERE id = ?")
        .bind(broken)
        .execute(&pool)
        .await
        .expect("set error");
    let p = insert_post(&pool, healthy, "g", "unread", "2023-01-01T00:00:00Z", false).await;

    let status = backend.get_status().await.expect("status");
    assert_eq!(status.feed_errors.len(), 1);
    assert_eq!(status.feed_errors[0].feed_id, broken);
    assert_eq!(status.highest_post_id, p);
    assert_eq!(status.unread_counts.len(), 1);
    assert_eq!(status.unread_counts[0].feed_id, healthy);
    assert_eq!(status.unread_counts[0].unread_count, 1);
}

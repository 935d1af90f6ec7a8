use std::path::{Path, PathBuf};

use base64::Engine as _;
use sqlx::{Row, SqlitePool};

use crate::backend::FeedFetchOptions;
use crate::error::{Error, Result};
use crate::fetch::ConditionalGetInfo;
use crate::model::{Feed, Statistics};

fn row_to_feed(row: &sqlx::sqlite::SqliteRow) -> Feed {
    Feed {
        id: row.get("id"),
        folder_id: row.get("folder"),
        url: row.get("url"),
        guid: row.get("guid"),
        title: row.get("title"),
        subtitle: row.get("subtitle"),
        link: row.get("link"),
        description: row.get("description"),
        language: row.get("language"),
        copyright: row.get("copyright"),
        icon_url: row.get("iconURL"),
        icon_hash: row.get("iconHash"),
        icon_last_fetched: row.get("iconLastFetched"),
        last_checked: row.get("lastChecked"),
        last_refresh_error: row.get("lastRefreshError"),
        refresh_interval: row.get("refreshInterval"),
        sort_order: row.get("sortOrder"),
        unread_count: 0,
        icon: None,
        statistics: None,
    }
}

const FEED_COLUMNS: &str = "id, url, folder, guid, title, subtitle, link, description, language, copyright, \
                            iconURL, iconHash, iconLastFetched, lastChecked, lastRefreshError, refreshInterval, \
                            sortOrder";

/// On-disk location of a feed's icon.
pub(crate) fn icon_file(icon_dir: &Path, feed_id: i64) -> PathBuf {
    icon_dir.join(format!("feed{feed_id}.icon"))
}

pub(crate) async fn list(pool: &SqlitePool, icon_dir: &Path, with_icons: bool) -> Result<Vec<Feed>> {
    let sql = format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY sortOrder");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let mut feeds: Vec<Feed> = rows.iter().map(row_to_feed).collect();

    for feed in &mut feeds {
        feed.unread_count = unread_count(pool, feed.id).await?;
        if with_icons {
            if let Ok(bytes) = tokio::fs::read(icon_file(icon_dir, feed.id)).await {
                feed.icon = Some(base64::engine::general_purpose::STANDARD.encode(bytes));
            }
        }
    }
    Ok(feeds)
}

pub(crate) async fn get(pool: &SqlitePool, feed_id: i64, options: FeedFetchOptions) -> Result<Feed> {
    let sql = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(feed_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Feed {feed_id} not found")))?;
    let mut feed = row_to_feed(&row);

    if options.with_unread_count {
        feed.unread_count = unread_count(pool, feed_id).await?;
    }
    if options.with_statistics {
        feed.statistics = Some(statistics(pool, feed_id).await?);
    }
    Ok(feed)
}

pub(crate) async fn unread_count(pool: &SqlitePool, feed_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feedID = ? AND isRead = FALSE")
        .bind(feed_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

async fn statistics(pool: &SqlitePool, feed_id: i64) -> Result<Statistics> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS postCount, MIN(datePublished) AS oldestPost, MAX(datePublished) AS newestPost \
         FROM posts WHERE feedID = ?",
    )
    .bind(feed_id)
    .fetch_one(pool)
    .await?;

    let flagged: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT postID) FROM flags WHERE postID IN (SELECT id FROM posts WHERE feedID = ?)",
    )
    .bind(feed_id)
    .fetch_one(pool)
    .await?;

    Ok(Statistics {
        post_count: row.get("postCount"),
        flagged_post_count: flagged,
        oldest_post: row.get("oldestPost"),
        newest_post: row.get("newestPost"),
    })
}

/// Inserts the bare subscription row; the caller is expected to refresh it
/// afterwards to populate metadata and posts. The insert and its sort-order
/// computation run under the backend's create mutex.
pub(crate) async fn create(pool: &SqlitePool, url: &str, parent_folder_id: i64) -> Result<Feed> {
    let max_sort_order: Option<i64> = sqlx::query_scalar("SELECT MAX(sortOrder) FROM feeds WHERE folder = ?")
        .bind(parent_folder_id)
        .fetch_one(pool)
        .await?;
    let sort_order = max_sort_order.unwrap_or(0) + 10;

    let id: i64 = sqlx::query_scalar("INSERT INTO feeds (url, folder, sortOrder) VALUES (?, ?, ?) RETURNING id")
        .bind(url)
        .bind(parent_folder_id)
        .bind(sort_order)
        .fetch_one(pool)
        .await?;

    get(pool, id, FeedFetchOptions::default()).await
}

pub(crate) async fn move_to(pool: &SqlitePool, feed_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
    let feed = get(pool, feed_id, FeedFetchOptions::default()).await?;
    let old_folder = feed.folder_id;

    // land just before the requested slot, then renumber both sibling sets
    sqlx::query("UPDATE feeds SET folder = ?, sortOrder = ? WHERE id = ?")
        .bind(parent_folder_id)
        .bind(sort_order - 5)
        .bind(feed_id)
        .execute(pool)
        .await?;

    resort_in_folder(pool, parent_folder_id).await?;
    if old_folder != parent_folder_id {
        resort_in_folder(pool, old_folder).await?;
    }
    Ok(())
}

/// Reassigns the sort orders of the feeds in a folder in steps of 10.
pub(crate) async fn resort_in_folder(pool: &SqlitePool, folder_id: i64) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM feeds WHERE folder = ? ORDER BY sortOrder, id")
        .bind(folder_id)
        .fetch_all(pool)
        .await?;
    for (index, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE feeds SET sortOrder = ? WHERE id = ?")
            .bind(((index as i64) + 1) * 10)
            .bind(id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub(crate) async fn update(pool: &SqlitePool, feed_id: i64, url: &str, refresh_interval: Option<i64>) -> Result<()> {
    get(pool, feed_id, FeedFetchOptions::default()).await?;
    sqlx::query("UPDATE feeds SET url = ?, refreshInterval = ? WHERE id = ?")
        .bind(url)
        .bind(refresh_interval)
        .bind(feed_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Copies parsed channel metadata down onto the feed row.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn update_metadata(
    pool: &SqlitePool,
    feed_id: i64,
    guid: &str,
    title: &str,
    subtitle: &str,
    link: &str,
    description: &str,
    language: &str,
    copyright: &str,
    icon_url: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE feeds SET guid = ?, title = ?, subtitle = ?, link = ?, description = ?, language = ?, \
         copyright = ?, iconURL = ? WHERE id = ?",
    )
    .bind(guid)
    .bind(title)
    .bind(subtitle)
    .bind(link)
    .bind(description)
    .bind(language)
    .bind(copyright)
    .bind(icon_url)
    .bind(feed_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn store_conditional_get_info(
    pool: &SqlitePool,
    feed_id: i64,
    info: Option<&ConditionalGetInfo>,
) -> Result<()> {
    let blob = info.map(ConditionalGetInfo::to_blob).unwrap_or_default();
    sqlx::query("UPDATE feeds SET conditionalGETInfo = ? WHERE id = ?")
        .bind(blob)
        .bind(feed_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn conditional_get_info(pool: &SqlitePool, feed_id: i64) -> Result<Option<ConditionalGetInfo>> {
    let blob: Option<String> = sqlx::query_scalar("SELECT conditionalGETInfo FROM feeds WHERE id = ?")
        .bind(feed_id)
        .fetch_optional(pool)
        .await?;
    Ok(blob.as_deref().and_then(ConditionalGetInfo::from_blob))
}

/// Deletes a feed and everything it owns: posts, enclosures, category links,
/// flags, script-folder memberships, categories, logs, and the icon file.
pub(crate) async fn delete(pool: &SqlitePool, icon_dir: Option<&Path>, feed_id: i64) -> Result<()> {
    let feed = get(pool, feed_id, FeedFetchOptions::default()).await?;

    sqlx::query("DELETE FROM post_enclosures WHERE postID IN (SELECT id FROM posts WHERE feedID = ?)")
        .bind(feed_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM post_categories WHERE postID IN (SELECT id FROM posts WHERE feedID = ?)")
        .bind(feed_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM flags WHERE postID IN (SELECT id FROM posts WHERE feedID = ?)")
        .bind(feed_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM scriptfolder_posts WHERE postID IN (SELECT id FROM posts WHERE feedID = ?)")
        .bind(feed_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM posts WHERE feedID = ?").bind(feed_id).execute(pool).await?;
    sqlx::query("DELETE FROM categories WHERE feedID = ?").bind(feed_id).execute(pool).await?;
    sqlx::query("DELETE FROM logs WHERE feedID = ?").bind(feed_id).execute(pool).await?;
    sqlx::query("DELETE FROM feeds WHERE id = ?").bind(feed_id).execute(pool).await?;

    if let Some(icon_dir) = icon_dir {
        let icon = icon_file(icon_dir, feed_id);
        if icon.exists() {
            let _ = tokio::fs::remove_file(icon).await;
        }
    }

    resort_in_folder(pool, feed.folder_id).await?;
    Ok(())
}

pub mod feeds;
pub mod folders;
pub mod logs;
pub mod posts;
pub mod refresh;
pub mod script_folders;
pub mod scripts;
pub mod sources;

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::backend::{Backend, FeedFetchOptions, ScriptData, SortResult};
use crate::error::Result;
use crate::feed_parsing::xml;
use crate::model::{
    Category, Feed, FeedAndPostID, FeedError, FlagColor, Folder, LogEntry, ParentType, Post, PostFilter, Script,
    ScriptFolder, SortMethod, SourceStatus, UnreadCount,
};

/// The engine realisation backed by the embedded store.
pub struct LocalBackend {
    pool: SqlitePool,
    icon_dir: PathBuf,
    /// Serialises create operations whose sort-order computation must not
    /// race with a concurrent insert of a sibling.
    create_mutex: Mutex<()>,
}

impl LocalBackend {
    pub fn new(pool: SqlitePool, icon_dir: PathBuf) -> Self {
        Self {
            pool,
            icon_dir,
            create_mutex: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn icon_dir(&self) -> &std::path::Path {
        &self.icon_dir
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn get_feeds(&self, with_icons: bool) -> Result<Vec<Feed>> {
        feeds::list(&self.pool, &self.icon_dir, with_icons).await
    }

    async fn get_feed(&self, feed_id: i64, options: FeedFetchOptions) -> Result<Feed> {
        feeds::get(&self.pool, feed_id, options).await
    }

    async fn subscribe_feed(&self, url: &str, parent_folder_id: i64) -> Result<Feed> {
        let feed = {
            let _guard = self.create_mutex.lock().await;
            feeds::create(&self.pool, url, parent_folder_id).await?
        };
        // the initial refresh fills in metadata and posts; a failure lands in
        // lastRefreshError rather than undoing the subscription
        refresh::refresh_feed(&self.pool, &self.icon_dir, feed.id).await
    }

    async fn refresh_feed(&self, feed_id: i64) -> Result<Feed> {
        refresh::refresh_feed(&self.pool, &self.icon_dir, feed_id).await
    }

    async fn mark_feed_read(&self, feed_id: i64, max_post_id: u64) -> Result<()> {
        let (clauses, binds) = posts::scope_clauses(&self.pool, &ParentType::Feed(feed_id)).await?;
        posts::mark_scope_read(&self.pool, clauses, binds, max_post_id).await?;
        Ok(())
    }

    async fn move_feed(&self, feed_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
        feeds::move_to(&self.pool, feed_id, parent_folder_id, sort_order).await
    }

    async fn update_feed(&self, feed_id: i64, url: &str, refresh_interval: Option<i64>) -> Result<()> {
        feeds::update(&self.pool, feed_id, url, refresh_interval).await
    }

    async fn delete_feed(&self, feed_id: i64) -> Result<()> {
        feeds::delete(&self.pool, Some(&self.icon_dir), feed_id).await
    }

    async fn get_folders(&self, parent_folder_id: i64) -> Result<Vec<Folder>> {
        folders::list(&self.pool, parent_folder_id).await
    }

    async fn get_folder(&self, folder_id: i64) -> Result<Folder> {
        folders::get(&self.pool, folder_id).await
    }

    async fn add_folder(&self, title: &str, parent_folder_id: i64) -> Result<Folder> {
        let _guard = self.create_mutex.lock().await;
        folders::add(&self.pool, title, parent_folder_id).await
    }

    async fn update_folder(&self, folder_id: i64, title: &str) -> Result<()> {
        folders::update_title(&self.pool, folder_id, title).await
    }

    async fn move_folder(&self, folder_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
        folders::move_to(&self.pool, folder_id, parent_folder_id, sort_order).await
    }

    async fn sort_folder(&self, folder_id: i64, method: SortMethod) -> Result<SortResult> {
        match method {
            SortMethod::AlphabeticallyAscending => folders::sort_alphabetically(&self.pool, folder_id).await,
        }
    }

    async fn delete_folder(&self, folder_id: i64) -> Result<()> {
        folders::delete(&self.pool, Some(&self.icon_dir), folder_id).await
    }

    async fn mark_folder_read(&self, folder_id: i64, max_post_id: u64) -> Result<Vec<i64>> {
        let (clauses, binds) = posts::scope_clauses(&self.pool, &ParentType::Folder(folder_id)).await?;
        posts::mark_scope_read(&self.pool, clauses, binds, max_post_id).await
    }

    async fn get_posts(&self, filter: &PostFilter) -> Result<(u64, Vec<Post>)> {
        posts::query_filtered(&self.pool, filter).await
    }

    async fn get_post(&self, feed_id: i64, post_id: i64) -> Result<Post> {
        posts::get(&self.pool, feed_id, post_id).await
    }

    async fn mark_source_read(&self, max_post_id: u64) -> Result<()> {
        posts::mark_scope_read(&self.pool, Vec::new(), Vec::new(), max_post_id).await?;
        Ok(())
    }

    async fn set_posts_read_status(&self, mark_as_read: bool, pairs: &[FeedAndPostID]) -> Result<()> {
        posts::set_read_status(&self.pool, mark_as_read, pairs).await
    }

    async fn set_posts_flag_status(&self, mark_flagged: bool, colors: &[FlagColor], pairs: &[FeedAndPostID]) -> Result<()> {
        posts::set_flag_status(&self.pool, mark_flagged, colors, pairs).await
    }

    async fn used_flag_colors(&self) -> Result<Vec<FlagColor>> {
        posts::used_flag_colors(&self.pool).await
    }

    async fn get_categories(&self, parent: ParentType) -> Result<Vec<Category>> {
        posts::list_categories(&self.pool, &parent).await
    }

    async fn get_script_folders(&self) -> Result<Vec<ScriptFolder>> {
        script_folders::list(&self.pool).await
    }

    async fn get_script_folder(&self, script_folder_id: i64) -> Result<ScriptFolder> {
        script_folders::get(&self.pool, script_folder_id).await
    }

    async fn add_script_folder(&self, title: &str, show_total: bool, show_unread: bool) -> Result<ScriptFolder> {
        let _guard = self.create_mutex.lock().await;
        script_folders::add(&self.pool, title, show_total, show_unread).await
    }

    async fn update_script_folder(&self, script_folder_id: i64, title: &str, show_total: bool, show_unread: bool) -> Result<()> {
        script_folders::update(&self.pool, script_folder_id, title, show_total, show_unread).await
    }

    async fn delete_script_folder(&self, script_folder_id: i64) -> Result<()> {
        script_folders::delete(&self.pool, script_folder_id).await
    }

    async fn mark_script_folder_read(&self, script_folder_id: i64, max_post_id: u64) -> Result<Vec<i64>> {
        script_folders::mark_read(&self.pool, script_folder_id, max_post_id).await
    }

    async fn assign_posts_to_script_folder(&self, script_folder_id: i64, assign: bool, pairs: &[FeedAndPostID]) -> Result<()> {
        script_folders::assign_posts(&self.pool, script_folder_id, assign, pairs).await
    }

    async fn get_scripts(&self) -> Result<Vec<Script>> {
        scripts::list(&self.pool).await
    }

    async fn add_script(&self, data: &ScriptData) -> Result<Script> {
        let _guard = self.create_mutex.lock().await;
        scripts::add(&self.pool, data).await
    }

    async fn update_script(&self, script_id: i64, data: &ScriptData) -> Result<()> {
        scripts::update(&self.pool, script_id, data).await
    }

    async fn delete_script(&self, script_id: i64) -> Result<()> {
        scripts::delete(&self.pool, script_id).await
    }

    async fn get_status(&self) -> Result<SourceStatus> {
        let error_rows = sqlx::query("SELECT id, lastRefreshError FROM feeds WHERE lastRefreshError IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        let feed_errors = error_rows
            .iter()
            .map(|row| FeedError {
                feed_id: row.get("id"),
                error: row.get("lastRefreshError"),
            })
            .collect();

        let highest_post_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM posts").fetch_one(&self.pool).await?;

        Ok(SourceStatus {
            feed_errors,
            highest_post_id: highest_post_id.unwrap_or(0),
            unread_counts: self.get_unread_counts().await?,
        })
    }

    async fn get_unread_counts(&self) -> Result<Vec<UnreadCount>> {
        let rows = sqlx::query(
            "SELECT feedID, COUNT(*) AS unreadCount FROM posts WHERE isRead = FALSE GROUP BY feedID",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| UnreadCount {
                feed_id: row.get("feedID"),
                unread_count: row.get("unreadCount"),
            })
            .collect())
    }

    async fn get_logs(&self, parent: ParentType, per_page: u64, page: u64) -> Result<(u64, Vec<LogEntry>)> {
        logs::query(&self.pool, &parent, per_page, page).await
    }

    async fn clear_logs(&self, parent: ParentType) -> Result<()> {
        logs::clear(&self.pool, &parent).await
    }

    async fn import_opml(&self, opml: &str, parent_folder_id: i64) -> Result<Vec<i64>> {
        let doc = xml::parse_document(opml)?;
        let mut feed_ids = Vec::new();
        for outline in doc.descendants("outline") {
            let feed_url = outline.attr("xmlUrl").unwrap_or_default();
            if feed_url.is_empty() {
                continue;
            }
            let feed = self.subscribe_feed(feed_url, parent_folder_id).await?;
            feed_ids.push(feed.id);
        }
        Ok(feed_ids)
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    Category, Feed, FeedAndPostID, FlagColor, Folder, LogEntry, ParentType, Post, PostFilter, Script, ScriptEvent,
    ScriptFolder, SortMethod, SourceStatus, UnreadCount,
};

/// What to load alongside the feed record itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedFetchOptions {
    pub with_statistics: bool,
    pub with_unread_count: bool,
}

/// New sort orders handed back by a folder sort, keyed by entity id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortResult {
    #[serde(rename = "folderSortOrders")]
    pub folder_sort_orders: BTreeMap<i64, i64>,
    #[serde(rename = "feedSortOrders")]
    pub feed_sort_orders: BTreeMap<i64, i64>,
}

/// Fields of a script as supplied by the caller on add/update.
#[derive(Debug, Clone)]
pub struct ScriptData {
    pub typ: String,
    pub title: String,
    pub is_enabled: bool,
    pub run_on_events: Vec<ScriptEvent>,
    pub run_on_feed_ids: Option<Vec<i64>>,
    pub script: String,
}

/// The engine's public operations. `LocalBackend` drives the embedded store
/// and the refresh pipeline; `RemoteBackend` translates every call into one
/// HTTP request against a peer engine. Client code treats the two
/// interchangeably; the owning source's type picks the realisation.
///
/// `max_post_id` arguments treat `u64::MAX` as "no upper bound".
#[async_trait]
pub trait Backend: Send + Sync {
    // feeds
    async fn get_feeds(&self, with_icons: bool) -> Result<Vec<Feed>>;
    async fn get_feed(&self, feed_id: i64, options: FeedFetchOptions) -> Result<Feed>;
    async fn subscribe_feed(&self, url: &str, parent_folder_id: i64) -> Result<Feed>;
    async fn refresh_feed(&self, feed_id: i64) -> Result<Feed>;
    async fn mark_feed_read(&self, feed_id: i64, max_post_id: u64) -> Result<()>;
    async fn move_feed(&self, feed_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()>;
    async fn update_feed(&self, feed_id: i64, url: &str, refresh_interval: Option<i64>) -> Result<()>;
    async fn delete_feed(&self, feed_id: i64) -> Result<()>;

    // folders
    async fn get_folders(&self, parent_folder_id: i64) -> Result<Vec<Folder>>;
    async fn get_folder(&self, folder_id: i64) -> Result<Folder>;
    async fn add_folder(&self, title: &str, parent_folder_id: i64) -> Result<Folder>;
    async fn update_folder(&self, folder_id: i64, title: &str) -> Result<()>;
    async fn move_folder(&self, folder_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()>;
    async fn sort_folder(&self, folder_id: i64, method: SortMethod) -> Result<SortResult>;
    async fn delete_folder(&self, folder_id: i64) -> Result<()>;
    /// Returns the ids of the feeds that owned at least one flipped post.
    async fn mark_folder_read(&self, folder_id: i64, max_post_id: u64) -> Result<Vec<i64>>;

    // posts
    /// Returns `(totalCountMatchingFilter, pageOfPosts)`.
    async fn get_posts(&self, filter: &PostFilter) -> Result<(u64, Vec<Post>)>;
    async fn get_post(&self, feed_id: i64, post_id: i64) -> Result<Post>;
    async fn mark_source_read(&self, max_post_id: u64) -> Result<()>;
    async fn set_posts_read_status(&self, mark_as_read: bool, pairs: &[FeedAndPostID]) -> Result<()>;
    async fn set_posts_flag_status(&self, mark_flagged: bool, colors: &[FlagColor], pairs: &[FeedAndPostID]) -> Result<()>;
    async fn used_flag_colors(&self) -> Result<Vec<FlagColor>>;
    /// Lists the categories of the scope, deduplicated by title.
    async fn get_categories(&self, parent: ParentType) -> Result<Vec<Category>>;

    // script folders
    async fn get_script_folders(&self) -> Result<Vec<ScriptFolder>>;
    async fn get_script_folder(&self, script_folder_id: i64) -> Result<ScriptFolder>;
    async fn add_script_folder(&self, title: &str, show_total: bool, show_unread: bool) -> Result<ScriptFolder>;
    async fn update_script_folder(&self, script_folder_id: i64, title: &str, show_total: bool, show_unread: bool) -> Result<()>;
    async fn delete_script_folder(&self, script_folder_id: i64) -> Result<()>;
    /// Returns the ids of the feeds that owned at least one flipped post.
    async fn mark_script_folder_read(&self, script_folder_id: i64, max_post_id: u64) -> Result<Vec<i64>>;
    async fn assign_posts_to_script_folder(&self, script_folder_id: i64, assign: bool, pairs: &[FeedAndPostID]) -> Result<()>;

    // scripts
    async fn get_scripts(&self) -> Result<Vec<Script>>;
    async fn add_script(&self, data: &ScriptData) -> Result<Script>;
    async fn update_script(&self, script_id: i64, data: &ScriptData) -> Result<()>;
    async fn delete_script(&self, script_id: i64) -> Result<()>;

    // source level
    async fn get_status(&self) -> Result<SourceStatus>;
    async fn get_unread_counts(&self) -> Result<Vec<UnreadCount>>;
    async fn get_logs(&self, parent: ParentType, per_page: u64, page: u64) -> Result<(u64, Vec<LogEntry>)>;
    async fn clear_logs(&self, parent: ParentType) -> Result<()>;
    /// Subscribes to every feed in the OPML document; returns the new feed ids.
    async fn import_opml(&self, opml: &str, parent_folder_id: i64) -> Result<Vec<i64>>;
}

/// Clamps a wire-side `maxPostID` to a rowid bound; `u64::MAX` means "all".
pub fn clamp_max_post_id(max_post_id: u64) -> i64 {
    if max_post_id >= i64::MAX as u64 {
        i64::MAX
    } else {
        max_post_id as i64
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dates are persisted and exchanged as ISO-8601 UTC with this format.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats a UTC timestamp in the canonical ISO-8601 form.
pub fn format_date(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

/// Parses a stored ISO-8601 UTC timestamp; inputs with an offset are normalised to UTC.
pub fn parse_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&chrono::Utc))
        .ok()
}

/// Whether a source is backed by the embedded store or by a peer engine over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Remote,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Local => "local",
            SourceType::Remote => "remote",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(SourceType::Local),
            "remote" => Ok(SourceType::Remote),
            _ => Err(Error::Parse(format!("Unknown source type: {s}"))),
        }
    }
}

/// The fixed flag palette. `Gray` is the sentinel for "no flag filter" and is
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagColor {
    Gray,
    Blue,
    Green,
    Yellow,
    Orange,
    Red,
    Purple,
}

impl FlagColor {
    pub fn id(&self) -> i64 {
        match self {
            FlagColor::Gray => 0,
            FlagColor::Blue => 1,
            FlagColor::Green => 2,
            FlagColor::Yellow => 3,
            FlagColor::Orange => 4,
            FlagColor::Red => 5,
            FlagColor::Purple => 6,
        }
    }

    pub fn from_id(id: i64) -> Result<Self> {
        match id {
            0 => Ok(FlagColor::Gray),
            1 => Ok(FlagColor::Blue),
            2 => Ok(FlagColor::Green),
            3 => Ok(FlagColor::Yellow),
            4 => Ok(FlagColor::Orange),
            5 => Ok(FlagColor::Red),
            6 => Ok(FlagColor::Purple),
            _ => Err(Error::ConstraintViolation(format!("Unknown flag color id: {id}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlagColor::Gray => "gray",
            FlagColor::Blue => "blue",
            FlagColor::Green => "green",
            FlagColor::Yellow => "yellow",
            FlagColor::Orange => "orange",
            FlagColor::Red => "red",
            FlagColor::Purple => "purple",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "gray" => Ok(FlagColor::Gray),
            "blue" => Ok(FlagColor::Blue),
            "green" => Ok(FlagColor::Green),
            "yellow" => Ok(FlagColor::Yellow),
            "orange" => Ok(FlagColor::Orange),
            "red" => Ok(FlagColor::Red),
            "purple" => Ok(FlagColor::Purple),
            _ => Err(Error::ConstraintViolation(format!("Unknown flag color: {name}"))),
        }
    }

    /// All assignable colors (everything but the Gray sentinel).
    pub fn all_assignable() -> &'static [FlagColor] {
        &[
            FlagColor::Blue,
            FlagColor::Green,
            FlagColor::Yellow,
            FlagColor::Orange,
            FlagColor::Red,
            FlagColor::Purple,
        ]
    }
}

/// Events a post script can be triggered on. The wire identifiers are protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptEvent {
    #[serde(rename = "newpost")]
    NewPost,
    #[serde(rename = "updatepost")]
    UpdatePost,
}

impl ScriptEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptEvent::NewPost => "newpost",
            ScriptEvent::UpdatePost => "updatepost",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "newpost" => Some(ScriptEvent::NewPost),
            "updatepost" => Some(ScriptEvent::UpdatePost),
            _ => None,
        }
    }
}

/// Scope selector for post and log listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentType {
    Source,
    Folder(i64),
    Feed(i64),
    ScriptFolder(i64),
}

impl ParentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentType::Source => "source",
            ParentType::Folder(_) => "folder",
            ParentType::Feed(_) => "feed",
            ParentType::ScriptFolder(_) => "scriptfolder",
        }
    }

    pub fn parent_id(&self) -> i64 {
        match self {
            ParentType::Source => 0,
            ParentType::Folder(id) | ParentType::Feed(id) | ParentType::ScriptFolder(id) => *id,
        }
    }

    pub fn from_parts(parent_type: &str, parent_id: i64) -> Result<Self> {
        match parent_type {
            "source" => Ok(ParentType::Source),
            "folder" => Ok(ParentType::Folder(parent_id)),
            "feed" => Ok(ParentType::Feed(parent_id)),
            "scriptfolder" => Ok(ParentType::ScriptFolder(parent_id)),
            _ => Err(Error::Parse(format!("Unknown parent type: {parent_type}"))),
        }
    }
}

/// Log severities, stored numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn id(&self) -> i64 {
        match self {
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warning => 3,
            LogLevel::Error => 4,
        }
    }

    pub fn from_id(id: i64) -> Self {
        match id {
            1 => LogLevel::Debug,
            3 => LogLevel::Warning,
            4 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// A logical origin of feeds: the single local store, or a remote peer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "sourceID")]
    pub id: i64,
    #[serde(rename = "type")]
    pub typ: SourceType,
    pub title: String,
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,
    /// Opaque JSON blob; for remote sources: host, port, login, password, useHTTPS.
    #[serde(rename = "configData")]
    pub config_data: Option<String>,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

/// Connection settings stored in a remote source's config blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSourceSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    #[serde(rename = "useHTTPS")]
    pub use_https: bool,
}

impl Source {
    pub fn remote_settings(&self) -> Result<RemoteSourceSettings> {
        let blob = self
            .config_data
            .as_deref()
            .ok_or_else(|| Error::ConstraintViolation("Remote source has no connection settings".into()))?;
        Ok(serde_json::from_str(blob)?)
    }
}

/// Hierarchical grouping of feeds within a source; parent id 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "folderID")]
    pub id: i64,
    #[serde(rename = "parentFolderID")]
    pub parent_id: i64,
    pub title: String,
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,
}

/// Aggregate fetch statistics for a feed or source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "postCount")]
    pub post_count: i64,
    #[serde(rename = "flaggedPostCount")]
    pub flagged_post_count: i64,
    #[serde(rename = "oldestPost")]
    pub oldest_post: Option<String>,
    #[serde(rename = "newestPost")]
    pub newest_post: Option<String>,
}

/// A subscription with its channel-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    #[serde(rename = "feedID")]
    pub id: i64,
    #[serde(rename = "folderID")]
    pub folder_id: i64,
    pub url: String,
    pub guid: String,
    pub title: String,
    pub subtitle: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub copyright: String,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
    #[serde(rename = "iconHash")]
    pub icon_hash: String,
    #[serde(rename = "iconLastFetched")]
    pub icon_last_fetched: String,
    #[serde(rename = "lastChecked")]
    pub last_checked: String,
    #[serde(rename = "lastRefreshError")]
    pub last_refresh_error: Option<String>,
    /// Per-feed refresh interval in seconds; absent means the global default applies.
    #[serde(rename = "refreshInterval")]
    pub refresh_interval: Option<i64>,
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,
    #[serde(rename = "unreadCount", default)]
    pub unread_count: i64,
    /// Base64 of the icon bytes; only populated when a listing asks for icons.
    #[serde(rename = "icon", default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "statistics", default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// A media attachment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    #[serde(rename = "enclosureURL")]
    pub url: String,
    #[serde(rename = "enclosureMimeType")]
    pub mime_type: String,
    #[serde(rename = "enclosureSize")]
    pub size: u64,
}

/// A per-feed label; posts of that feed reference it through the join table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "categoryID")]
    pub id: i64,
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    pub title: String,
}

/// One item parsed out of a feed refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "postID")]
    pub id: i64,
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    #[serde(rename = "feedTitle", default)]
    pub feed_title: String,
    #[serde(rename = "isRead")]
    pub is_read: bool,
    pub title: String,
    pub link: String,
    pub content: String,
    pub author: String,
    #[serde(rename = "commentsURL")]
    pub comments_url: String,
    pub guid: String,
    #[serde(rename = "datePublished")]
    pub date_published: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub enclosures: Vec<Enclosure>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(rename = "flagColors", default)]
    pub flag_colors: Vec<FlagColor>,
    #[serde(rename = "scriptFolderIDs", default)]
    pub script_folder_ids: Vec<i64>,
}

/// A user-maintained bucket of posts, populated by scripts or direct assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptFolder {
    #[serde(rename = "scriptFolderID")]
    pub id: i64,
    pub title: String,
    #[serde(rename = "showTotal")]
    pub show_total: bool,
    #[serde(rename = "showUnread")]
    pub show_unread: bool,
    #[serde(rename = "totalPostCount", default)]
    pub total_post_count: i64,
    #[serde(rename = "totalUnreadCount", default)]
    pub total_unread_count: i64,
}

/// The only script type currently understood.
pub const SCRIPT_TYPE_LUA: &str = "lua";

/// A per-post transformation, triggered on insert/update events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(rename = "scriptID")]
    pub id: i64,
    #[serde(rename = "type")]
    pub typ: String,
    pub title: String,
    #[serde(rename = "isEnabled")]
    pub is_enabled: bool,
    #[serde(rename = "runOnEvents")]
    pub run_on_events: Vec<ScriptEvent>,
    /// Absent means the script applies to all feeds.
    #[serde(rename = "runOnFeedIDs")]
    pub run_on_feed_ids: Option<Vec<i64>>,
    pub script: String,
}

impl Script {
    /// Whether this script should run for the given feed and event.
    pub fn applies_to(&self, feed_id: i64, event: ScriptEvent) -> bool {
        if !self.is_enabled || !self.run_on_events.contains(&event) {
            return false;
        }
        match &self.run_on_feed_ids {
            Some(ids) => ids.contains(&feed_id),
            None => true,
        }
    }
}

/// A diagnostic record, optionally tied to a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "logID")]
    pub id: i64,
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(rename = "feedID")]
    pub feed_id: Option<i64>,
    #[serde(rename = "feedTitle", default)]
    pub feed_title: Option<String>,
}

/// Per-feed error as reported by the source status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedError {
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    pub error: String,
}

/// Snapshot returned by `/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStatus {
    #[serde(rename = "feedErrors")]
    pub feed_errors: Vec<FeedError>,
    #[serde(rename = "highestPostID")]
    pub highest_post_id: i64,
    #[serde(rename = "unreadCounts")]
    pub unread_counts: Vec<UnreadCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    #[serde(rename = "unreadCount")]
    pub unread_count: i64,
}

/// A `(feedID, postID)` pair as used by the bulk read/flag/assign operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedAndPostID {
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    #[serde(rename = "postID")]
    pub post_id: i64,
}

/// Filter for post listings; composed identically across all parent scopes.
#[derive(Debug, Clone)]
pub struct PostFilter {
    pub parent: ParentType,
    pub per_page: u64,
    pub page: u64,
    pub show_only_unread: bool,
    pub search_filter: String,
    pub flag_color: FlagColor,
    pub category_id: Option<i64>,
}

impl PostFilter {
    pub fn new(parent: ParentType, per_page: u64, page: u64) -> Self {
        Self {
            parent,
            per_page,
            page,
            show_only_unread: false,
            search_filter: String::new(),
            flag_color: FlagColor::Gray,
            category_id: None,
        }
    }
}

/// Sort methods accepted by the folder sort operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMethod {
    AlphabeticallyAscending,
}

impl SortMethod {
    pub fn as_str(&self) -> &'static str {
        "alphaAsc"
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "alphaAsc" => Ok(SortMethod::AlphabeticallyAscending),
            _ => Err(Error::Parse(format!("Unknown sort method: {s}"))),
        }
    }
}

pub mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Backend, FeedFetchOptions, ScriptData, SortResult};
use crate::error::{Error, Result};
use crate::model::{
    Category, Feed, FeedAndPostID, FlagColor, Folder, LogEntry, ParentType, Post, PostFilter, Script, ScriptFolder,
    SortMethod, Source, SourceStatus, UnreadCount,
};

use client::{bool_param, ApiClient};

/// The engine realisation that delegates every operation to a peer engine
/// over its HTTP API. Behaviourally interchangeable with `LocalBackend`.
pub struct RemoteBackend {
    api: ApiClient,
}

impl RemoteBackend {
    pub fn from_source(source: &Source) -> Result<Self> {
        let settings = source.remote_settings()?;
        Ok(Self {
            api: ApiClient::from_settings(&settings)?,
        })
    }
}

fn params(pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

fn parent_params(parent: &ParentType) -> Vec<(&'static str, String)> {
    vec![
        ("parentType", parent.as_str().to_string()),
        ("parentID", parent.parent_id().to_string()),
    ]
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn get_feeds(&self, with_icons: bool) -> Result<Vec<Feed>> {
        let value = self
            .api
            .get("/feeds", &params(&[("getIcons", bool_param(with_icons))]))
            .await?;
        from_value(value)
    }

    async fn get_feed(&self, feed_id: i64, options: FeedFetchOptions) -> Result<Feed> {
        let value = self
            .api
            .get(
                &format!("/feed/{feed_id}"),
                &params(&[
                    ("getData", bool_param(true)),
                    ("getStatistics", bool_param(options.with_statistics)),
                    ("getUnreadCount", bool_param(options.with_unread_count)),
                ]),
            )
            .await?;
        from_value(value)
    }

    async fn subscribe_feed(&self, url: &str, parent_folder_id: i64) -> Result<Feed> {
        let value = self
            .api
            .post(
                "/feed",
                &params(&[("url", url.to_string()), ("parentFolderID", parent_folder_id.to_string())]),
            )
            .await?;
        from_value(value)
    }

    async fn refresh_feed(&self, feed_id: i64) -> Result<Feed> {
        self.api.post(&format!("/feed/{feed_id}/refresh"), &BTreeMap::new()).await?;
        self.get_feed(
            feed_id,
            FeedFetchOptions {
                with_unread_count: true,
                ..FeedFetchOptions::default()
            },
        )
        .await
    }

    async fn mark_feed_read(&self, feed_id: i64, max_post_id: u64) -> Result<()> {
        self.api
            .post(
                &format!("/feed/{feed_id}/mark-as-read"),
                &params(&[("maxPostID", max_post_id.to_string())]),
            )
            .await?;
        Ok(())
    }

    async fn move_feed(&self, feed_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
        self.api
            .post(
                &format!("/feed/{feed_id}/move"),
                &params(&[
                    ("sortOrder", sort_order.to_string()),
                    ("parentFolderID", parent_folder_id.to_string()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn update_feed(&self, feed_id: i64, url: &str, refresh_interval: Option<i64>) -> Result<()> {
        let mut p = params(&[("url", url.to_string())]);
        if let Some(interval) = refresh_interval {
            p.insert("refreshInterval".to_string(), interval.to_string());
        }
        self.api.patch(&format!("/feed/{feed_id}"), &p).await?;
        Ok(())
    }

    async fn delete_feed(&self, feed_id: i64) -> Result<()> {
        self.api.delete(&format!("/feed/{feed_id}"), &BTreeMap::new()).await?;
        Ok(())
    }

    async fn get_folders(&self, parent_folder_id: i64) -> Result<Vec<Folder>> {
        let value = self
            .api
            .get("/folders", &params(&[("parentFolderID", parent_folder_id.to_string())]))
            .await?;
        from_value(value)
    }

    async fn get_folder(&self, folder_id: i64) -> Result<Folder> {
        let value = self.api.get(&format!("/folder/{folder_id}"), &BTreeMap::new()).await?;
        from_value(value)
    }

    async fn add_folder(&self, title: &str, parent_folder_id: i64) -> Result<Folder> {
        let value = self
            .api
            .post(
                "/folder",
                &params(&[
                    ("title", title.to_string()),
                    ("parentFolderID", parent_folder_id.to_string()),
                ]),
            )
            .await?;
        from_value(value)
    }

    async fn update_folder(&self, folder_id: i64, title: &str) -> Result<()> {
        self.api
            .patch(&format!("/folder/{folder_id}"), &params(&[("title", title.to_string())]))
            .await?;
        Ok(())
    }

    async fn move_folder(&self, folder_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
        self.api
            .post(
                &format!("/folder/{folder_id}/move"),
                &params(&[
                    ("sortOrder", sort_order.to_string()),
                    ("parentFolderID", parent_folder_id.to_string()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn sort_folder(&self, folder_id: i64, method: SortMethod) -> Result<SortResult> {
        let value = self
            .api
            .post(
                &format!("/folder/{folder_id}/sort"),
                &params(&[("sortMethod", method.as_str().to_string())]),
            )
            .await?;
        from_value(value)
    }

    async fn delete_folder(&self, folder_id: i64) -> Result<()> {
        self.api.delete(&format!("/folder/{folder_id}"), &BTreeMap::new()).await?;
        Ok(())
    }

    async fn mark_folder_read(&self, folder_id: i64, max_post_id: u64) -> Result<Vec<i64>> {
        let value = self
            .api
            .post(
                &format!("/folder/{folder_id}/mark-as-read"),
                &params(&[("maxPostID", max_post_id.to_string())]),
            )
            .await?;
        let ids = value.get("feedIDs").cloned().unwrap_or(Value::Array(Vec::new()));
        from_value(ids)
    }

    async fn get_posts(&self, filter: &PostFilter) -> Result<(u64, Vec<Post>)> {
        let mut p = parent_params(&filter.parent);
        p.push(("perPage", filter.per_page.to_string()));
        p.push(("page", filter.page.to_string()));
        p.push(("showOnlyUnread", bool_param(filter.show_only_unread)));
        p.push(("searchFilter", filter.search_filter.clone()));
        p.push(("flagColor", filter.flag_color.name().to_string()));
        if let Some(category_id) = filter.category_id {
            p.push(("categoryFilterID", category_id.to_string()));
        }
        let value = self.api.get("/posts", &params(&p)).await?;

        let count = value.get("count").and_then(Value::as_u64).unwrap_or(0);
        let posts = value.get("posts").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok((count, from_value(posts)?))
    }

    async fn get_post(&self, feed_id: i64, post_id: i64) -> Result<Post> {
        let value = self
            .api
            .get(&format!("/post/{post_id}"), &params(&[("feedID", feed_id.to_string())]))
            .await?;
        from_value(value)
    }

    async fn mark_source_read(&self, max_post_id: u64) -> Result<()> {
        self.api
            .post("/mark-as-read", &params(&[("maxPostID", max_post_id.to_string())]))
            .await?;
        Ok(())
    }

    async fn set_posts_read_status(&self, mark_as_read: bool, pairs: &[FeedAndPostID]) -> Result<()> {
        self.api
            .post(
                "/set-posts-read-status",
                &params(&[
                    ("feedsAndPostIDs", serde_json::to_string(pairs)?),
                    ("markAsRead", bool_param(mark_as_read)),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn set_posts_flag_status(&self, mark_flagged: bool, colors: &[FlagColor], pairs: &[FeedAndPostID]) -> Result<()> {
        let color_names: Vec<&str> = colors.iter().map(|c| c.name()).collect();
        self.api
            .post(
                "/set-posts-flag-status",
                &params(&[
                    ("feedsAndPostIDs", serde_json::to_string(pairs)?),
                    ("markFlagged", bool_param(mark_flagged)),
                    ("flagColors", serde_json::to_string(&color_names)?),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn used_flag_colors(&self) -> Result<Vec<FlagColor>> {
        let value = self.api.get("/used-flag-colors", &BTreeMap::new()).await?;
        let names: Vec<String> = from_value(value)?;
        names.iter().map(|name| FlagColor::from_name(name)).collect()
    }

    async fn get_categories(&self, parent: ParentType) -> Result<Vec<Category>> {
        let value = self.api.get("/categories", &params(&parent_params(&parent))).await?;
        from_value(value)
    }

    async fn get_script_folders(&self) -> Result<Vec<ScriptFolder>> {
        let value = self.api.get("/scriptfolders", &BTreeMap::new()).await?;
        from_value(value)
    }

    async fn get_script_folder(&self, script_folder_id: i64) -> Result<ScriptFolder> {
        let value = self
            .api
            .get(&format!("/scriptfolder/{script_folder_id}"), &BTreeMap::new())
            .await?;
        from_value(value)
    }

    async fn add_script_folder(&self, title: &str, show_total: bool, show_unread: bool) -> Result<ScriptFolder> {
        let value = self
            .api
            .post(
                "/scriptfolder",
                &params(&[
                    ("title", title.to_string()),
                    ("showTotal", bool_param(show_total)),
                    ("showUnread", bool_param(show_unread)),
                ]),
            )
            .await?;
        from_value(value)
    }

    async fn update_script_folder(&self, script_folder_id: i64, title: &str, show_total: bool, show_unread: bool) -> Result<()> {
        self.api
            .patch(
                &format!("/scriptfolder/{script_folder_id}"),
                &params(&[
                    ("title", title.to_string()),
                    ("showTotal", bool_param(show_total)),
                    ("showUnread", bool_param(show_unread)),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn delete_script_folder(&self, script_folder_id: i64) -> Result<()> {
        self.api
            .delete(&format!("/scriptfolder/{script_folder_id}"), &BTreeMap::new())
            .await?;
        Ok(())
    }

    async fn mark_script_folder_read(&self, script_folder_id: i64, max_post_id: u64) -> Result<Vec<i64>> {
        let value = self
            .api
            .post(
                &format!("/scriptfolder/{script_folder_id}/mark-as-read"),
                &params(&[("maxPostID", max_post_id.to_string())]),
            )
            .await?;
        let ids = value.get("feedIDs").cloned().unwrap_or(Value::Array(Vec::new()));
        from_value(ids)
    }

    async fn assign_posts_to_script_folder(&self, script_folder_id: i64, assign: bool, pairs: &[FeedAndPostID]) -> Result<()> {
        self.api
            .post(
                &format!("/scriptfolder/{script_folder_id}/assign-posts"),
                &params(&[
                    ("feedsAndPostIDs", serde_json::to_string(pairs)?),
                    ("assign", bool_param(assign)),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn get_scripts(&self) -> Result<Vec<Script>> {
        let value = self.api.get("/scripts", &BTreeMap::new()).await?;
        from_value(value)
    }

    async fn add_script(&self, data: &ScriptData) -> Result<Script> {
        let value = self.api.post("/script", &script_params(data)?).await?;
        from_value(value)
    }

    async fn update_script(&self, script_id: i64, data: &ScriptData) -> Result<()> {
        self.api.patch(&format!("/script/{script_id}"), &script_params(data)?).await?;
        Ok(())
    }

    async fn delete_script(&self, script_id: i64) -> Result<()> {
        self.api.delete(&format!("/script/{script_id}"), &BTreeMap::new()).await?;
        Ok(())
    }

    async fn get_status(&self) -> Result<SourceStatus> {
        let value = self.api.get("/status", &BTreeMap::new()).await?;
        from_value(value)
    }

    async fn get_unread_counts(&self) -> Result<Vec<UnreadCount>> {
        let value = self.api.get("/unread-counts", &BTreeMap::new()).await?;
        let map: BTreeMap<String, i64> = from_value(value)?;
        map.into_iter()
            .map(|(feed_id, unread_count)| {
                let feed_id = feed_id
                    .parse()
                    .map_err(|_| Error::Parse(format!("Invalid feed id in unread counts: {feed_id}")))?;
                Ok(UnreadCount { feed_id, unread_count })
            })
            .collect()
    }

    async fn get_logs(&self, parent: ParentType, per_page: u64, page: u64) -> Result<(u64, Vec<LogEntry>)> {
        let mut p = parent_params(&parent);
        p.push(("perPage", per_page.to_string()));
        p.push(("page", page.to_string()));
        let value = self.api.get("/logs", &params(&p)).await?;

        let count = value.get("count").and_then(Value::as_u64).unwrap_or(0);
        let logs = value.get("logs").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok((count, from_value(logs)?))
    }

    async fn clear_logs(&self, parent: ParentType) -> Result<()> {
        let path = match parent {
            ParentType::Feed(feed_id) => format!("/feed/{feed_id}/logs"),
            ParentType::Folder(folder_id) => format!("/folder/{folder_id}/logs"),
            ParentType::Source | ParentType::ScriptFolder(_) => "/source/logs".to_string(),
        };
        self.api.delete(&path, &BTreeMap::new()).await?;
        Ok(())
    }

    async fn import_opml(&self, opml: &str, parent_folder_id: i64) -> Result<Vec<i64>> {
        let value = self
            .api
            .post(
                "/import-opml",
                &params(&[
                    ("opml", opml.to_string()),
                    ("parentFolderID", parent_folder_id.to_string()),
                ]),
            )
            .await?;
        from_value(value)
    }
}

fn script_params(data: &ScriptData) -> Result<BTreeMap<String, String>> {
    let events: Vec<&str> = data.run_on_events.iter().map(|e| e.as_str()).collect();
    let mut p = params(&[
        ("type", data.typ.clone()),
        ("title", data.title.clone()),
        ("isEnabled", bool_param(data.is_enabled)),
        ("runOnEvents", events.join(",")),
        ("script", data.script.clone()),
    ]);
    if let Some(feed_ids) = &data.run_on_feed_ids {
        let joined = feed_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        p.insert("runOnFeedIDs".to_string(), joined);
    }
    Ok(p)
}

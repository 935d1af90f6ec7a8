use std::collections::BTreeMap;
use std::path::Path;

use reqwest::Method;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::backend::FeedFetchOptions;
use crate::error::Result;
use crate::feed_parsing::{self, FeedParser};
use crate::fetch::{self, BodyEncoding, Credentials};
use crate::model::{format_date, Feed, LogLevel, Post, ScriptEvent, Source, SourceType};
use crate::scripting;

use super::{feeds, logs, posts, scripts, sources};

/// Icons are re-checked at most once a week.
const ICON_RECHECK_HOURS: i64 = 24 * 7;

/// Refreshes a single feed: fetch, parse, upsert posts, dispatch scripts,
/// refresh the icon, recompute the unread count. Every error is contained
/// here: it lands in `lastRefreshError` and the log, never in the caller.
pub(crate) async fn refresh_feed(pool: &SqlitePool, icon_dir: &Path, feed_id: i64) -> Result<Feed> {
    // propagate only "no such feed"; everything after is contained
    let feed = feeds::get(pool, feed_id, FeedFetchOptions::default()).await?;

    info!(feed_id, "refreshing feed");
    logs::insert(pool, LogLevel::Info, "Refreshing feed", Some(feed_id)).await;

    let now = format_date(chrono::Utc::now());
    sqlx::query("UPDATE feeds SET lastRefreshError = NULL, lastChecked = ? WHERE id = ?")
        .bind(&now)
        .bind(feed_id)
        .execute(pool)
        .await?;

    if let Err(e) = do_refresh(pool, icon_dir, &feed).await {
        let message = e.to_string();
        sqlx::query("UPDATE feeds SET lastRefreshError = ? WHERE id = ?")
            .bind(&message)
            .bind(feed_id)
            .execute(pool)
            .await?;
        logs::insert(pool, LogLevel::Error, &message, Some(feed_id)).await;
    }

    feeds::get(
        pool,
        feed_id,
        FeedFetchOptions {
            with_unread_count: true,
            ..FeedFetchOptions::default()
        },
    )
    .await
}

async fn do_refresh(pool: &SqlitePool, icon_dir: &Path, feed: &Feed) -> Result<()> {
    let prior_cgi = feeds::conditional_get_info(pool, feed.id).await?;

    let response = fetch::request(
        Some(pool),
        &feed.url,
        Method::GET,
        &Credentials::default(),
        &BTreeMap::new(),
        BodyEncoding::FormUrlEncoded,
        Some(feed.id),
        prior_cgi.as_ref(),
    )
    .await?;
    feeds::store_conditional_get_info(pool, feed.id, response.conditional_get.as_ref()).await?;

    // empty body: a 304, nothing to do (lastChecked has already advanced)
    let body = response.text();
    let parser = match feed_parsing::parse_feed(&body, &feed.url)? {
        Some(parser) => parser,
        None => return Ok(()),
    };

    feeds::update_metadata(
        pool,
        feed.id,
        &parser.guid(),
        &parser.title(),
        &parser.subtitle(),
        &parser.link(),
        &parser.description(),
        &parser.language(),
        &parser.copyright(),
        &parser.icon_url(),
    )
    .await?;

    process_items(pool, feed, parser.as_ref()).await?;
    refresh_icon(pool, icon_dir, feed.id).await?;
    Ok(())
}

async fn process_items(pool: &SqlitePool, feed: &Feed, parser: &dyn FeedParser) -> Result<()> {
    let all_scripts = scripts::list(pool).await?;
    let on_new: Vec<_> = all_scripts
        .iter()
        .filter(|s| s.applies_to(feed.id, ScriptEvent::NewPost))
        .collect();
    let on_update: Vec<_> = all_scripts
        .iter()
        .filter(|s| s.applies_to(feed.id, ScriptEvent::UpdatePost))
        .collect();

    let source = local_source(pool).await?;

    for item in parser.items() {
        match posts::get_by_guid(pool, feed.id, &item.guid).await? {
            Some(existing) => {
                let changed = posts::update_from_item(pool, &existing, &item).await?;
                // only trigger the update script(s) in case one of the fields is different
                if changed && !on_update.is_empty() {
                    let mut updated = posts::get(pool, feed.id, existing.id).await?;
                    run_scripts(pool, &source, feed, &mut updated, &on_update).await?;
                }
            }
            None => {
                let post_id = posts::create_from_item(pool, feed.id, &item).await?;
                if !on_new.is_empty() {
                    let mut created = posts::get(pool, feed.id, post_id).await?;
                    run_scripts(pool, &source, feed, &mut created, &on_new).await?;
                }
            }
        }
    }
    Ok(())
}

/// Runs the applicable scripts sequentially. A failing script is logged and
/// skipped; mutations from the scripts before it are kept.
async fn run_scripts(
    pool: &SqlitePool,
    source: &Source,
    feed: &Feed,
    post: &mut Post,
    applicable: &[&crate::model::Script],
) -> Result<()> {
    for script in applicable {
        if let Err(e) = scripting::run_post_script(&script.script, source, feed, post) {
            let message = format!("Script '{}' failed: {e}", script.title);
            logs::insert(pool, LogLevel::Error, &message, Some(feed.id)).await;
        }
    }
    posts::apply_script_mutations(pool, post).await
}

async fn local_source(pool: &SqlitePool) -> Result<Source> {
    let mut list = sources::list(pool, Some(SourceType::Local)).await?;
    list.pop()
        .ok_or_else(|| crate::error::Error::NotFound("No local source configured".into()))
}

/// Fetches and stores the feed icon unless it was checked within the last
/// week. Icon download failures never put the feed in an error state.
pub(crate) async fn refresh_icon(pool: &SqlitePool, icon_dir: &Path, feed_id: i64) -> Result<()> {
    let feed = feeds::get(pool, feed_id, FeedFetchOptions::default()).await?;

    if let Some(last_fetched) = crate::model::parse_date(&feed.icon_last_fetched) {
        if (chrono::Utc::now() - last_fetched).num_hours() < ICON_RECHECK_HOURS {
            return Ok(());
        }
    }

    let icon_url = if feed.icon_url.is_empty() {
        // no icon in the feed details: look on the page the feed links to,
        // or the index page of the host serving the feed
        let mut link = feed.link.clone();
        if link.is_empty() {
            if let Ok(mut index) = url::Url::parse(&feed.url) {
                index.set_path("/");
                index.set_query(None);
                link = index.to_string();
            }
        }
        feed_parsing::favicon::fav_icon(Some(pool), &link, Some(feed_id)).await
    } else {
        feed.icon_url.clone()
    };

    let mut icon_data = Vec::new();
    if !icon_url.is_empty() {
        match fetch::get(Some(pool), &icon_url, Some(feed_id)).await {
            Ok(response) => icon_data = response.body,
            Err(_) => {
                debug!(feed_id, "failed to download feed icon: {icon_url}");
            }
        }
    }

    let mut icon_hash = String::new();
    if !icon_data.is_empty() {
        let _ = tokio::fs::create_dir_all(icon_dir).await;
        let path = feeds::icon_file(icon_dir, feed_id);
        if let Err(e) = tokio::fs::write(&path, &icon_data).await {
            debug!(feed_id, "failed to store feed icon: {e}");
        } else {
            icon_hash = feed_parsing::md5_hex_bytes(&icon_data);
        }
    }

    let now = format_date(chrono::Utc::now());
    sqlx::query("UPDATE feeds SET iconLastFetched = ?, iconHash = ? WHERE id = ?")
        .bind(&now)
        .bind(&icon_hash)
        .bind(feed_id)
        .execute(pool)
        .await?;

    Ok(())
}

use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{format_date, LogEntry, LogLevel, ParentType};

use super::folders;
use super::posts::{bind_all, bind_all_scalar, Bind};

/// Appends a diagnostic record. Failures are swallowed: logging must never
/// take down the operation being logged.
pub async fn insert(pool: &SqlitePool, level: LogLevel, message: &str, feed_id: Option<i64>) {
    let timestamp = format_date(chrono::Utc::now());
    let result = sqlx::query("INSERT INTO logs (timestamp, level, message, feedID) VALUES (?, ?, ?, ?)")
        .bind(&timestamp)
        .bind(level.id())
        .bind(message)
        .bind(feed_id)
        .execute(pool)
        .await;
    if let Err(e) = result {
        tracing::warn!("failed to persist log record: {e}");
    }
}

async fn scope_clauses(pool: &SqlitePool, parent: &ParentType) -> Result<(Vec<String>, Vec<Bind>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    match parent {
        ParentType::Source | ParentType::ScriptFolder(_) => {}
        ParentType::Feed(feed_id) => {
            clauses.push("logs.feedID = ?".to_string());
            binds.push(Bind::Int(*feed_id));
        }
        ParentType::Folder(folder_id) => {
            let folder_ids = folders::subtree_ids(pool, *folder_id).await?;
            let joined = folder_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
            clauses.push(format!("logs.feedID IN (SELECT id FROM feeds WHERE folder IN ({joined}))"));
        }
    }
    Ok((clauses, binds))
}

/// Returns `(totalCount, pageOfLogs)`, newest first, feed titles joined in.
pub(crate) async fn query(pool: &SqlitePool, parent: &ParentType, per_page: u64, page: u64) -> Result<(u64, Vec<LogEntry>)> {
    let (clauses, binds) = scope_clauses(pool, parent).await?;
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM logs{where_sql}");
    let count: i64 = bind_all_scalar(sqlx::query_scalar(&count_sql), &binds)
        .fetch_one(pool)
        .await?;

    let per_page = per_page.max(1) as i64;
    let offset = per_page * (page.max(1) as i64 - 1);
    let page_sql = format!(
        "SELECT logs.id, logs.timestamp, logs.level, logs.message, logs.feedID, feeds.title AS feedTitle \
         FROM logs LEFT JOIN feeds ON feeds.id = logs.feedID{where_sql} \
         ORDER BY logs.id DESC LIMIT ? OFFSET ?"
    );
    let mut page_binds = binds;
    page_binds.push(Bind::Int(per_page));
    page_binds.push(Bind::Int(offset));

    let rows = bind_all(sqlx::query(&page_sql), &page_binds).fetch_all(pool).await?;
    let logs = rows
        .iter()
        .map(|row| LogEntry {
            id: row.get("id"),
            timestamp: row.get("timestamp"),
            level: LogLevel::from_id(row.get("level")),
            message: row.get("message"),
            feed_id: row.get("feedID"),
            feed_title: row.try_get("feedTitle").ok(),
        })
        .collect();

    Ok((count.max(0) as u64, logs))
}

pub(crate) async fn clear(pool: &SqlitePool, parent: &ParentType) -> Result<()> {
    let (clauses, binds) = scope_clauses(pool, parent).await?;
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("DELETE FROM logs{where_sql}");
    bind_all(sqlx::query(&sql), &binds).execute(pool).await?;
    Ok(())
}

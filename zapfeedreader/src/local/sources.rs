use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::model::{RemoteSourceSettings, Source, SourceType};

fn row_to_source(row: &sqlx::sqlite::SqliteRow) -> Result<Source> {
    Ok(Source {
        id: row.get("id"),
        typ: SourceType::from_str(&row.get::<String, _>("type"))?,
        title: row.get("title"),
        sort_order: row.get("sortOrder"),
        config_data: row.get("configData"),
        last_error: row.get("lastError"),
    })
}

/// Enumerates the configured sources, optionally restricted by type.
pub async fn list(pool: &SqlitePool, type_filter: Option<SourceType>) -> Result<Vec<Source>> {
    let rows = match type_filter {
        Some(typ) => {
            sqlx::query("SELECT id, type, title, sortOrder, configData, lastError FROM sources WHERE type = ? ORDER BY sortOrder")
                .bind(typ.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT id, type, title, sortOrder, configData, lastError FROM sources ORDER BY sortOrder")
                .fetch_all(pool)
                .await?
        }
    };
    rows.iter().map(row_to_source).collect()
}

pub async fn get(pool: &SqlitePool, source_id: i64) -> Result<Source> {
    let row = sqlx::query("SELECT id, type, title, sortOrder, configData, lastError FROM sources WHERE id = ?")
        .bind(source_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Source {source_id} not found")))?;
    row_to_source(&row)
}

/// Registers a remote peer engine as a source.
pub async fn add_remote(pool: &SqlitePool, title: &str, settings: &RemoteSourceSettings) -> Result<Source> {
    let max_sort_order: Option<i64> = sqlx::query_scalar("SELECT MAX(sortOrder) FROM sources")
        .fetch_one(pool)
        .await?;
    let blob = serde_json::to_string(settings)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO sources (type, title, sortOrder, configData) VALUES ('remote', ?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(max_sort_order.unwrap_or(0) + 10)
    .bind(blob)
    .fetch_one(pool)
    .await?;
    get(pool, id).await
}

/// Removes a source. The local source cannot be deleted; asking to is a no-op.
pub async fn delete(pool: &SqlitePool, source_id: i64) -> Result<()> {
    let source = get(pool, source_id).await?;
    if source.typ == SourceType::Local {
        return Ok(());
    }
    sqlx::query("DELETE FROM sources WHERE id = ?").bind(source_id).execute(pool).await?;
    Ok(())
}

pub async fn set_last_error(pool: &SqlitePool, source_id: i64, error: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE sources SET lastError = ? WHERE id = ?")
        .bind(error)
        .bind(source_id)
        .execute(pool)
        .await?;
    Ok(())
}

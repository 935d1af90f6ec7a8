use sqlx::{Row, SqlitePool};

use crate::backend::ScriptData;
use crate::error::{Error, Result};
use crate::model::{Script, ScriptEvent, SCRIPT_TYPE_LUA};

fn events_to_column(events: &[ScriptEvent]) -> String {
    events.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(",")
}

fn events_from_column(column: &str) -> Vec<ScriptEvent> {
    column.split(',').filter_map(ScriptEvent::from_str).collect()
}

fn feed_ids_to_column(ids: Option<&[i64]>) -> Option<String> {
    ids.map(|ids| ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(","))
}

fn feed_ids_from_column(column: Option<String>) -> Option<Vec<i64>> {
    column.map(|c| c.split(',').filter_map(|part| part.trim().parse().ok()).collect())
}

fn row_to_script(row: &sqlx::sqlite::SqliteRow) -> Script {
    Script {
        id: row.get("id"),
        typ: row.get("type"),
        title: row.get("title"),
        is_enabled: row.get("isEnabled"),
        run_on_events: events_from_column(&row.get::<String, _>("runOnEvents")),
        run_on_feed_ids: feed_ids_from_column(row.get("runOnFeedIDs")),
        script: row.get("script"),
    }
}

fn validate(data: &ScriptData) -> Result<()> {
    if data.typ != SCRIPT_TYPE_LUA {
        return Err(Error::ConstraintViolation(format!("Unknown script type: {}", data.typ)));
    }
    Ok(())
}

pub(crate) async fn list(pool: &SqlitePool) -> Result<Vec<Script>> {
    let rows = sqlx::query("SELECT id, type, title, isEnabled, runOnEvents, runOnFeedIDs, script FROM scripts ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_script).collect())
}

pub(crate) async fn get(pool: &SqlitePool, script_id: i64) -> Result<Script> {
    let row = sqlx::query("SELECT id, type, title, isEnabled, runOnEvents, runOnFeedIDs, script FROM scripts WHERE id = ?")
        .bind(script_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Script {script_id} not found")))?;
    Ok(row_to_script(&row))
}

pub(crate) async fn add(pool: &SqlitePool, data: &ScriptData) -> Result<Script> {
    validate(data)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO scripts (type, title, isEnabled, runOnEvents, runOnFeedIDs, script) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&data.typ)
    .bind(&data.title)
    .bind(data.is_enabled)
    .bind(events_to_column(&data.run_on_events))
    .bind(feed_ids_to_column(data.run_on_feed_ids.as_deref()))
    .bind(&data.script)
    .fetch_one(pool)
    .await?;
    get(pool, id).await
}

pub(crate) async fn update(pool: &SqlitePool, script_id: i64, data: &ScriptData) -> Result<()> {
    validate(data)?;
    get(pool, script_id).await?;
    sqlx::query(
        "UPDATE scripts SET type = ?, title = ?, isEnabled = ?, runOnEvents = ?, runOnFeedIDs = ?, script = ? \
         WHERE id = ?",
    )
    .bind(&data.typ)
    .bind(&data.title)
    .bind(data.is_enabled)
    .bind(events_to_column(&data.run_on_events))
    .bind(feed_ids_to_column(data.run_on_feed_ids.as_deref()))
    .bind(&data.script)
    .bind(script_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &SqlitePool, script_id: i64) -> Result<()> {
    get(pool, script_id).await?;
    sqlx::query("DELETE FROM scripts WHERE id = ?").bind(script_id).execute(pool).await?;
    Ok(())
}

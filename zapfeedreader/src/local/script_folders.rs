use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::model::{FeedAndPostID, ScriptFolder};

use super::posts::{self, Bind};

async fn counters(pool: &SqlitePool, script_folder_id: i64) -> Result<(i64, i64)> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM scriptfolder_posts WHERE scriptFolderID = ?")
            .bind(script_folder_id)
            .fetch_one(pool)
            .await?;
    let unread: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts WHERE isRead = FALSE AND id IN \
         (SELECT postID FROM scriptfolder_posts WHERE scriptFolderID = ?)",
    )
    .bind(script_folder_id)
    .fetch_one(pool)
    .await?;
    Ok((total, unread))
}

fn row_to_script_folder(row: &sqlx::sqlite::SqliteRow) -> ScriptFolder {
    ScriptFolder {
        id: row.get("id"),
        title: row.get("title"),
        show_total: row.get("showTotal"),
        show_unread: row.get("showUnread"),
        total_post_count: 0,
        total_unread_count: 0,
    }
}

pub(crate) async fn list(pool: &SqlitePool) -> Result<Vec<ScriptFolder>> {
    let rows = sqlx::query("SELECT id, title, showTotal, showUnread FROM scriptfolders ORDER BY id")
        .fetch_all(pool)
        .await?;
    let mut folders: Vec<ScriptFolder> = rows.iter().map(row_to_script_folder).collect();
    for folder in &mut folders {
        let (total, unread) = counters(pool, folder.id).await?;
        folder.total_post_count = total;
        folder.total_unread_count = unread;
    }
    Ok(folders)
}

pub(crate) async fn get(pool: &SqlitePool, script_folder_id: i64) -> Result<ScriptFolder> {
    let row = sqlx::query("SELECT id, title, showTotal, showUnread FROM scriptfolders WHERE id = ?")
        .bind(script_folder_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Script folder {script_folder_id} not found")))?;
    let mut folder = row_to_script_folder(&row);
    let (total, unread) = counters(pool, folder.id).await?;
    folder.total_post_count = total;
    folder.total_unread_count = unread;
    Ok(folder)
}

pub(crate) async fn add(pool: &SqlitePool, title: &str, show_total: bool, show_unread: bool) -> Result<ScriptFolder> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO scriptfolders (title, showTotal, showUnread) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(show_total)
    .bind(show_unread)
    .fetch_one(pool)
    .await?;
    get(pool, id).await
}

pub(crate) async fn update(
    pool: &SqlitePool,
    script_folder_id: i64,
    title: &str,
    show_total: bool,
    show_unread: bool,
) -> Result<()> {
    get(pool, script_folder_id).await?;
    sqlx::query("UPDATE scriptfolders SET title = ?, showTotal = ?, showUnread = ? WHERE id = ?")
        .bind(title)
        .bind(show_total)
        .bind(show_unread)
        .bind(script_folder_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &SqlitePool, script_folder_id: i64) -> Result<()> {
    get(pool, script_folder_id).await?;
    sqlx::query("DELETE FROM scriptfolder_posts WHERE scriptFolderID = ?")
        .bind(script_folder_id)
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM scriptfolders WHERE id = ?")
        .bind(script_folder_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn mark_read(pool: &SqlitePool, script_folder_id: i64, max_post_id: u64) -> Result<Vec<i64>> {
    get(pool, script_folder_id).await?;
    posts::mark_scope_read(
        pool,
        vec!["posts.id IN (SELECT postID FROM scriptfolder_posts WHERE scriptFolderID = ?)".to_string()],
        vec![Bind::Int(script_folder_id)],
        max_post_id,
    )
    .await
}

pub(crate) async fn assign_posts(
    pool: &SqlitePool,
    script_folder_id: i64,
    assign: bool,
    pairs: &[FeedAndPostID],
) -> Result<()> {
    get(pool, script_folder_id).await?;
    for pair in pairs {
        if assign {
            sqlx::query("INSERT OR IGNORE INTO scriptfolder_posts (scriptFolderID, postID) VALUES (?, ?)")
                .bind(script_folder_id)
                .bind(pair.post_id)
                .execute(pool)
                .await?;
        } else {
            sqlx::query("DELETE FROM scriptfolder_posts WHERE scriptFolderID = ? AND postID = ?")
                .bind(script_folder_id)
                .bind(pair.post_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

use std::collections::BTreeMap;

use sqlx::{Row, SqlitePool};

use crate::backend::SortResult;
use crate::error::{Error, Result};
use crate::model::Folder;

use super::feeds;

fn row_to_folder(row: &sqlx::sqlite::SqliteRow) -> Folder {
    Folder {
        id: row.get("id"),
        parent_id: row.get("parent"),
        title: row.get("title"),
        sort_order: row.get("sortOrder"),
    }
}

pub(crate) async fn list(pool: &SqlitePool, parent_folder_id: i64) -> Result<Vec<Folder>> {
    let rows = sqlx::query("SELECT id, parent, title, sortOrder FROM folders WHERE parent = ? ORDER BY sortOrder")
        .bind(parent_folder_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_folder).collect())
}

pub(crate) async fn get(pool: &SqlitePool, folder_id: i64) -> Result<Folder> {
    let row = sqlx::query("SELECT id, parent, title, sortOrder FROM folders WHERE id = ?")
        .bind(folder_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Folder {folder_id} not found")))?;
    Ok(row_to_folder(&row))
}

/// The folder itself plus all descendant folder ids.
pub(crate) async fn subtree_ids(pool: &SqlitePool, folder_id: i64) -> Result<Vec<i64>> {
    let mut out = vec![folder_id];
    let mut frontier = vec![folder_id];
    while let Some(current) = frontier.pop() {
        let children: Vec<i64> = sqlx::query_scalar("SELECT id FROM folders WHERE parent = ?")
            .bind(current)
            .fetch_all(pool)
            .await?;
        for child in children {
            // a cycle would make this loop forever; treat it as corruption
            if out.contains(&child) {
                return Err(Error::ConstraintViolation(format!(
                    "Folder hierarchy contains a cycle at folder {child}"
                )));
            }
            out.push(child);
            frontier.push(child);
        }
    }
    Ok(out)
}

/// Reassigns the sort orders of a sibling set in steps of 10.
pub(crate) async fn resort_children(pool: &SqlitePool, parent_folder_id: i64) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM folders WHERE parent = ? ORDER BY sortOrder, id")
        .bind(parent_folder_id)
        .fetch_all(pool)
        .await?;
    for (index, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE folders SET sortOrder = ? WHERE id = ?")
            .bind(((index as i64) + 1) * 10)
            .bind(id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub(crate) async fn add(pool: &SqlitePool, title: &str, parent_folder_id: i64) -> Result<Folder> {
    let max_sort_order: Option<i64> = sqlx::query_scalar("SELECT MAX(sortOrder) FROM folders WHERE parent = ?")
        .bind(parent_folder_id)
        .fetch_one(pool)
        .await?;
    let sort_order = max_sort_order.unwrap_or(0) + 10;

    let id: i64 = sqlx::query_scalar("INSERT INTO folders (parent, title, sortOrder) VALUES (?, ?, ?) RETURNING id")
        .bind(parent_folder_id)
        .bind(title)
        .bind(sort_order)
        .fetch_one(pool)
        .await?;

    Ok(Folder {
        id,
        parent_id: parent_folder_id,
        title: title.to_string(),
        sort_order,
    })
}

pub(crate) async fn update_title(pool: &SqlitePool, folder_id: i64, title: &str) -> Result<()> {
    get(pool, folder_id).await?;
    sqlx::query("UPDATE folders SET title = ? WHERE id = ?")
        .bind(title)
        .bind(folder_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn move_to(pool: &SqlitePool, folder_id: i64, parent_folder_id: i64, sort_order: i64) -> Result<()> {
    let folder = get(pool, folder_id).await?;

    // moving a folder under itself or one of its descendants would detach the subtree
    if parent_folder_id != 0 {
        let subtree = subtree_ids(pool, folder_id).await?;
        if subtree.contains(&parent_folder_id) {
            return Err(Error::ConstraintViolation(
                "Cannot move a folder into its own subtree".into(),
            ));
        }
    }

    let old_parent = folder.parent_id;
    // land just before the requested slot, then renumber both sibling sets
    sqlx::query("UPDATE folders SET parent = ?, sortOrder = ? WHERE id = ?")
        .bind(parent_folder_id)
        .bind(sort_order - 5)
        .bind(folder_id)
        .execute(pool)
        .await?;
    resort_children(pool, parent_folder_id).await?;
    if old_parent != parent_folder_id {
        resort_children(pool, old_parent).await?;
    }
    Ok(())
}

/// Re-sorts the subfolders and feeds of a folder alphabetically and returns
/// the new sort orders per entity.
pub(crate) async fn sort_alphabetically(pool: &SqlitePool, folder_id: i64) -> Result<SortResult> {
    let mut result = SortResult {
        folder_sort_orders: BTreeMap::new(),
        feed_sort_orders: BTreeMap::new(),
    };

    let folder_rows = sqlx::query("SELECT id, title FROM folders WHERE parent = ? ORDER BY title COLLATE NOCASE")
        .bind(folder_id)
        .fetch_all(pool)
        .await?;
    for (index, row) in folder_rows.iter().enumerate() {
        let id: i64 = row.get("id");
        let sort_order = ((index as i64) + 1) * 10;
        sqlx::query("UPDATE folders SET sortOrder = ? WHERE id = ?")
            .bind(sort_order)
            .bind(id)
            .execute(pool)
            .await?;
        result.folder_sort_orders.insert(id, sort_order);
    }

    let feed_rows = sqlx::query("SELECT id, title FROM feeds WHERE folder = ? ORDER BY title COLLATE NOCASE")
        .bind(folder_id)
        .fetch_all(pool)
        .await?;
    for (index, row) in feed_rows.iter().enumerate() {
        let id: i64 = row.get("id");
        let sort_order = ((index as i64) + 1) * 10;
        sqlx::query("UPDATE feeds SET sortOrder = ? WHERE id = ?")
            .bind(sort_order)
            .bind(id)
            .execute(pool)
            .await?;
        result.feed_sort_orders.insert(id, sort_order);
    }

    Ok(result)
}

/// Deletes a folder and everything beneath it: descendant folders, their
/// feeds, and those feeds' posts with all their satellite rows.
pub(crate) async fn delete(pool: &SqlitePool, icon_dir: Option<&std::path::Path>, folder_id: i64) -> Result<()> {
    let folder = get(pool, folder_id).await?;
    let subtree = subtree_ids(pool, folder_id).await?;

    for id in &subtree {
        let feed_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM feeds WHERE folder = ?")
            .bind(id)
            .fetch_all(pool)
            .await?;
        for feed_id in feed_ids {
            feeds::delete(pool, icon_dir, feed_id).await?;
        }
    }

    for id in &subtree {
        sqlx::query("DELETE FROM folders WHERE id = ?").bind(id).execute(pool).await?;
    }

    resort_children(pool, folder.parent_id).await?;
    Ok(())
}

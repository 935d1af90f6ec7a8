use sqlx::{Row, SqlitePool};

use crate::backend::clamp_max_post_id;
use crate::error::{Error, Result};
use crate::feed_parsing::ParsedItem;
use crate::model::{Category, Enclosure, FeedAndPostID, FlagColor, ParentType, Post, PostFilter};

use super::folders;

/// A positional binding for a dynamically composed query.
#[derive(Debug, Clone)]
pub(crate) enum Bind {
    Int(i64),
    Text(String),
}

pub(crate) fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    binds: &[Bind],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Int(i) => query.bind(*i),
            Bind::Text(t) => query.bind(t.clone()),
        };
    }
    query
}

pub(crate) fn bind_all_scalar<'q, T>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, T, sqlx::sqlite::SqliteArguments<'q>>,
    binds: &[Bind],
) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, T, sqlx::sqlite::SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Int(i) => query.bind(*i),
            Bind::Text(t) => query.bind(t.clone()),
        };
    }
    query
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

/// WHERE clauses selecting the posts of a listing scope.
pub(crate) async fn scope_clauses(pool: &SqlitePool, parent: &ParentType) -> Result<(Vec<String>, Vec<Bind>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    match parent {
        ParentType::Source => {}
        ParentType::Feed(feed_id) => {
            clauses.push("posts.feedID = ?".to_string());
            binds.push(Bind::Int(*feed_id));
        }
        ParentType::Folder(folder_id) => {
            let folder_ids = folders::subtree_ids(pool, *folder_id).await?;
            clauses.push(format!(
                "posts.feedID IN (SELECT id FROM feeds WHERE folder IN ({}))",
                join_ids(&folder_ids)
            ));
        }
        ParentType::ScriptFolder(script_folder_id) => {
            clauses.push("posts.id IN (SELECT postID FROM scriptfolder_posts WHERE scriptFolderID = ?)".to_string());
            binds.push(Bind::Int(*script_folder_id));
        }
    }
    Ok((clauses, binds))
}

/// Appends the shared filter clauses: unread, search, flag color, category.
/// The category filter matches by title across all feeds.
async fn filter_clauses(
    pool: &SqlitePool,
    filter: &PostFilter,
    clauses: &mut Vec<String>,
    binds: &mut Vec<Bind>,
) -> Result<()> {
    if filter.show_only_unread {
        clauses.push("posts.isRead = FALSE".to_string());
    }
    if !filter.search_filter.is_empty() {
        let wildcard = format!("%{}%", filter.search_filter);
        clauses.push("(posts.title LIKE ? OR posts.content LIKE ?)".to_string());
        binds.push(Bind::Text(wildcard.clone()));
        binds.push(Bind::Text(wildcard));
    }
    if filter.flag_color != FlagColor::Gray {
        clauses.push("posts.id IN (SELECT DISTINCT(postID) FROM flags WHERE flagID = ?)".to_string());
        binds.push(Bind::Int(filter.flag_color.id()));
    }
    if let Some(category_id) = filter.category_id {
        let title: Option<String> = sqlx::query_scalar("SELECT title FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(pool)
            .await?;
        let title = title.ok_or_else(|| Error::NotFound(format!("Category {category_id} not found")))?;
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE title = ?")
            .bind(&title)
            .fetch_all(pool)
            .await?;
        clauses.push(format!(
            "posts.id IN (SELECT postID FROM post_categories WHERE categoryID IN ({}))",
            join_ids(&ids)
        ));
    }
    Ok(())
}

const POST_COLUMNS: &str = "posts.id, posts.feedID, feeds.title AS feedTitle, posts.isRead, posts.title, \
                            posts.link, posts.content, posts.author, posts.commentsURL, posts.guid, \
                            posts.datePublished, posts.thumbnail";

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        feed_id: row.get("feedID"),
        feed_title: row.try_get("feedTitle").unwrap_or_default(),
        is_read: row.get("isRead"),
        title: row.get("title"),
        link: row.get("link"),
        content: row.get("content"),
        author: row.get("author"),
        comments_url: row.get("commentsURL"),
        guid: row.get("guid"),
        date_published: row.get("datePublished"),
        thumbnail: row.get("thumbnail"),
        enclosures: Vec::new(),
        categories: Vec::new(),
        flag_colors: Vec::new(),
        script_folder_ids: Vec::new(),
    }
}

async fn hydrate(pool: &SqlitePool, post: &mut Post) -> Result<()> {
    let enclosure_rows = sqlx::query("SELECT url, size, mimeType FROM post_enclosures WHERE postID = ? ORDER BY id")
        .bind(post.id)
        .fetch_all(pool)
        .await?;
    post.enclosures = enclosure_rows
        .iter()
        .map(|row| Enclosure {
            url: row.get("url"),
            size: row.get::<i64, _>("size").max(0) as u64,
            mime_type: row.get("mimeType"),
        })
        .collect();

    let category_rows = sqlx::query(
        "SELECT categories.id, categories.feedID, categories.title FROM categories \
         INNER JOIN post_categories ON post_categories.categoryID = categories.id \
         WHERE post_categories.postID = ? ORDER BY categories.title",
    )
    .bind(post.id)
    .fetch_all(pool)
    .await?;
    post.categories = category_rows
        .iter()
        .map(|row| Category {
            id: row.get("id"),
            feed_id: row.get("feedID"),
            title: row.get("title"),
        })
        .collect();

    let flag_ids: Vec<i64> = sqlx::query_scalar("SELECT flagID FROM flags WHERE postID = ? ORDER BY flagID")
        .bind(post.id)
        .fetch_all(pool)
        .await?;
    post.flag_colors = flag_ids.into_iter().filter_map(|id| FlagColor::from_id(id).ok()).collect();

    post.script_folder_ids =
        sqlx::query_scalar("SELECT scriptFolderID FROM scriptfolder_posts WHERE postID = ? ORDER BY scriptFolderID")
            .bind(post.id)
            .fetch_all(pool)
            .await?;

    Ok(())
}

/// Runs a composed post listing: returns `(totalCount, pageOfPosts)`,
/// ordered newest first.
pub(crate) async fn query_filtered(pool: &SqlitePool, filter: &PostFilter) -> Result<(u64, Vec<Post>)> {
    let (mut clauses, mut binds) = scope_clauses(pool, &filter.parent).await?;
    filter_clauses(pool, filter, &mut clauses, &mut binds).await?;

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM posts{where_sql}");
    let count: i64 = bind_all_scalar(sqlx::query_scalar(&count_sql), &binds)
        .fetch_one(pool)
        .await?;

    let per_page = filter.per_page.max(1) as i64;
    let offset = per_page * (filter.page.max(1) as i64 - 1);
    let page_sql = format!(
        "SELECT {POST_COLUMNS} FROM posts INNER JOIN feeds ON feeds.id = posts.feedID{where_sql} \
         ORDER BY posts.datePublished DESC LIMIT ? OFFSET ?"
    );
    let mut page_binds = binds.clone();
    page_binds.push(Bind::Int(per_page));
    page_binds.push(Bind::Int(offset));

    let rows = bind_all(sqlx::query(&page_sql), &page_binds).fetch_all(pool).await?;
    let mut posts: Vec<Post> = rows.iter().map(row_to_post).collect();
    for post in &mut posts {
        hydrate(pool, post).await?;
    }

    Ok((count.max(0) as u64, posts))
}

pub(crate) async fn get(pool: &SqlitePool, feed_id: i64, post_id: i64) -> Result<Post> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts INNER JOIN feeds ON feeds.id = posts.feedID \
         WHERE posts.feedID = ? AND posts.id = ?"
    );
    let row = sqlx::query(&sql)
        .bind(feed_id)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Post {post_id} not found in feed {feed_id}")))?;
    let mut post = row_to_post(&row);
    hydrate(pool, &mut post).await?;
    Ok(post)
}

pub(crate) async fn get_by_guid(pool: &SqlitePool, feed_id: i64, guid: &str) -> Result<Option<Post>> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts INNER JOIN feeds ON feeds.id = posts.feedID \
         WHERE posts.feedID = ? AND posts.guid = ?"
    );
    let row = sqlx::query(&sql).bind(feed_id).bind(guid).fetch_optional(pool).await?;
    match row {
        Some(row) => {
            let mut post = row_to_post(&row);
            hydrate(pool, &mut post).await?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

async fn ensure_category(pool: &SqlitePool, feed_id: i64, title: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO categories (feedID, title) VALUES (?, ?)")
        .bind(feed_id)
        .bind(title)
        .execute(pool)
        .await?;
    let id: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE feedID = ? AND title = ?")
        .bind(feed_id)
        .bind(title)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn store_children(pool: &SqlitePool, post_id: i64, feed_id: i64, item: &ParsedItem) -> Result<()> {
    sqlx::query("DELETE FROM post_enclosures WHERE postID = ?")
        .bind(post_id)
        .execute(pool)
        .await?;
    for enclosure in &item.enclosures {
        sqlx::query("INSERT INTO post_enclosures (postID, url, size, mimeType) VALUES (?, ?, ?, ?)")
            .bind(post_id)
            .bind(&enclosure.url)
            .bind(enclosure.size.min(i64::MAX as u64) as i64)
            .bind(&enclosure.mime_type)
            .execute(pool)
            .await?;
    }

    sqlx::query("DELETE FROM post_categories WHERE postID = ?")
        .bind(post_id)
        .execute(pool)
        .await?;
    for title in &item.categories {
        let category_id = ensure_category(pool, feed_id, title).await?;
        sqlx::query("INSERT OR IGNORE INTO post_categories (postID, categoryID) VALUES (?, ?)")
            .bind(post_id)
            .bind(category_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Inserts a parsed item as a new unread post; returns its id.
pub(crate) async fn create_from_item(pool: &SqlitePool, feed_id: i64, item: &ParsedItem) -> Result<i64> {
    let post_id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (feedID, isRead, title, link, content, author, commentsURL, guid, datePublished, thumbnail) \
         VALUES (?, FALSE, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(feed_id)
    .bind(&item.title)
    .bind(&item.link)
    .bind(&item.content)
    .bind(&item.author)
    .bind(&item.comments_url)
    .bind(&item.guid)
    .bind(&item.date_published)
    .bind(&item.thumbnail)
    .fetch_one(pool)
    .await?;

    store_children(pool, post_id, feed_id, item).await?;
    Ok(post_id)
}

/// Updates an existing post from a re-parsed item. Returns whether any
/// content field actually differed (the UpdatePost script trigger condition).
pub(crate) async fn update_from_item(pool: &SqlitePool, existing: &Post, item: &ParsedItem) -> Result<bool> {
    let changed = existing.title != item.title
        || existing.link != item.link
        || existing.content != item.content
        || existing.author != item.author
        || existing.comments_url != item.comments_url
        || existing.date_published != item.date_published
        || existing.thumbnail.as_deref().unwrap_or_default() != item.thumbnail.as_deref().unwrap_or_default()
        || existing.enclosures != item.enclosures;

    sqlx::query(
        "UPDATE posts SET title = ?, link = ?, content = ?, author = ?, commentsURL = ?, datePublished = ?, thumbnail = ? \
         WHERE id = ?",
    )
    .bind(&item.title)
    .bind(&item.link)
    .bind(&item.content)
    .bind(&item.author)
    .bind(&item.comments_url)
    .bind(&item.date_published)
    .bind(&item.thumbnail)
    .bind(existing.id)
    .execute(pool)
    .await?;

    store_children(pool, existing.id, existing.feed_id, item).await?;
    Ok(changed)
}

/// Writes back the mutations a script made to a post draft.
pub(crate) async fn apply_script_mutations(pool: &SqlitePool, post: &Post) -> Result<()> {
    sqlx::query(
        "UPDATE posts SET title = ?, link = ?, content = ?, author = ?, thumbnail = ?, isRead = ? WHERE id = ?",
    )
    .bind(&post.title)
    .bind(&post.link)
    .bind(&post.content)
    .bind(&post.author)
    .bind(&post.thumbnail)
    .bind(post.is_read)
    .bind(post.id)
    .execute(pool)
    .await?;

    sqlx::query("DELETE FROM flags WHERE postID = ?")
        .bind(post.id)
        .execute(pool)
        .await?;
    for color in &post.flag_colors {
        if *color == FlagColor::Gray {
            continue;
        }
        sqlx::query("INSERT OR IGNORE INTO flags (postID, flagID) VALUES (?, ?)")
            .bind(post.id)
            .bind(color.id())
            .execute(pool)
            .await?;
    }

    sqlx::query("DELETE FROM scriptfolder_posts WHERE postID = ?")
        .bind(post.id)
        .execute(pool)
        .await?;
    for script_folder_id in &post.script_folder_ids {
        sqlx::query("INSERT OR IGNORE INTO scriptfolder_posts (scriptFolderID, postID) VALUES (?, ?)")
            .bind(script_folder_id)
            .bind(post.id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Flips `isRead` for every post in the scope with `id <= maxPostID` and
/// returns the ids of the feeds that owned at least one flipped row.
pub(crate) async fn mark_scope_read(
    pool: &SqlitePool,
    scope_clauses: Vec<String>,
    scope_binds: Vec<Bind>,
    max_post_id: u64,
) -> Result<Vec<i64>> {
    let cap = clamp_max_post_id(max_post_id);

    let mut clauses = scope_clauses;
    let mut binds = scope_binds;
    clauses.push("posts.isRead = FALSE".to_string());
    clauses.push("posts.id <= ?".to_string());
    binds.push(Bind::Int(cap));
    let where_sql = format!(" WHERE {}", clauses.join(" AND "));

    let affected_sql = format!("SELECT DISTINCT(posts.feedID) FROM posts{where_sql}");
    let affected: Vec<i64> = bind_all_scalar(sqlx::query_scalar(&affected_sql), &binds)
        .fetch_all(pool)
        .await?;

    let update_sql = format!("UPDATE posts SET isRead = TRUE WHERE id IN (SELECT posts.id FROM posts{where_sql})");
    bind_all(sqlx::query(&update_sql), &binds).execute(pool).await?;

    Ok(affected)
}

pub(crate) async fn set_read_status(pool: &SqlitePool, mark_as_read: bool, pairs: &[FeedAndPostID]) -> Result<()> {
    for pair in pairs {
        sqlx::query("UPDATE posts SET isRead = ? WHERE feedID = ? AND id = ?")
            .bind(mark_as_read)
            .bind(pair.feed_id)
            .bind(pair.post_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub(crate) async fn set_flag_status(
    pool: &SqlitePool,
    mark_flagged: bool,
    colors: &[FlagColor],
    pairs: &[FeedAndPostID],
) -> Result<()> {
    for color in colors {
        if *color == FlagColor::Gray {
            return Err(Error::ConstraintViolation("Cannot assign the gray sentinel flag".into()));
        }
    }
    for pair in pairs {
        for color in colors {
            if mark_flagged {
                sqlx::query("INSERT OR IGNORE INTO flags (postID, flagID) VALUES (?, ?)")
                    .bind(pair.post_id)
                    .bind(color.id())
                    .execute(pool)
                    .await?;
            } else {
                sqlx::query("DELETE FROM flags WHERE postID = ? AND flagID = ?")
                    .bind(pair.post_id)
                    .bind(color.id())
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Categories visible in a scope, deduplicated by title (first id wins),
/// ordered alphabetically.
pub(crate) async fn list_categories(pool: &SqlitePool, parent: &ParentType) -> Result<Vec<Category>> {
    let rows = match parent {
        ParentType::Feed(feed_id) => {
            sqlx::query("SELECT id, feedID, title FROM categories WHERE feedID = ? ORDER BY title COLLATE NOCASE, id")
                .bind(*feed_id)
                .fetch_all(pool)
                .await?
        }
        ParentType::Folder(folder_id) => {
            let folder_ids = folders::subtree_ids(pool, *folder_id).await?;
            let sql = format!(
                "SELECT id, feedID, title FROM categories WHERE feedID IN \
                 (SELECT id FROM feeds WHERE folder IN ({})) ORDER BY title COLLATE NOCASE, id",
                join_ids(&folder_ids)
            );
            sqlx::query(&sql).fetch_all(pool).await?
        }
        ParentType::Source | ParentType::ScriptFolder(_) => {
            sqlx::query("SELECT id, feedID, title FROM categories ORDER BY title COLLATE NOCASE, id")
                .fetch_all(pool)
                .await?
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut categories = Vec::new();
    for row in rows {
        let category = Category {
            id: row.get("id"),
            feed_id: row.get("feedID"),
            title: row.get("title"),
        };
        if seen.insert(category.title.to_lowercase()) {
            categories.push(category);
        }
    }
    Ok(categories)
}

pub(crate) async fn used_flag_colors(pool: &SqlitePool) -> Result<Vec<FlagColor>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT(flagID) FROM flags ORDER BY flagID")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().filter_map(|id| FlagColor::from_id(id).ok()).collect())
}

use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;

/// Current schema version; bump together with an entry in `apply_upgrades`.
const SCHEMA_VERSION: i64 = 1;

const V1_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        sortOrder INTEGER NOT NULL DEFAULT 0,
        configData TEXT,
        lastError TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS folders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent INTEGER NOT NULL DEFAULT 0,
        title TEXT NOT NULL DEFAULT '',
        sortOrder INTEGER NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        folder INTEGER NOT NULL DEFAULT 0,
        guid TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL DEFAULT '',
        subtitle TEXT NOT NULL DEFAULT '',
        link TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT '',
        copyright TEXT NOT NULL DEFAULT '',
        iconURL TEXT NOT NULL DEFAULT '',
        iconHash TEXT NOT NULL DEFAULT '',
        iconLastFetched TEXT NOT NULL DEFAULT '',
        lastChecked TEXT NOT NULL DEFAULT '',
        lastRefreshError TEXT,
        refreshInterval INTEGER,
        conditionalGETInfo TEXT NOT NULL DEFAULT '',
        sortOrder INTEGER NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feedID INTEGER NOT NULL,
        isRead BOOLEAN NOT NULL DEFAULT FALSE,
        title TEXT NOT NULL DEFAULT '',
        link TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        author TEXT NOT NULL DEFAULT '',
        commentsURL TEXT NOT NULL DEFAULT '',
        guid TEXT NOT NULL DEFAULT '',
        datePublished TEXT NOT NULL DEFAULT '',
        thumbnail TEXT
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_feedID ON posts(feedID);",
    "CREATE INDEX IF NOT EXISTS idx_posts_datePublished ON posts(datePublished);",
    r#"
    CREATE TABLE IF NOT EXISTS post_enclosures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        postID INTEGER NOT NULL,
        url TEXT NOT NULL DEFAULT '',
        size INTEGER NOT NULL DEFAULT 0,
        mimeType TEXT NOT NULL DEFAULT ''
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_post_enclosures_postID ON post_enclosures(postID);",
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feedID INTEGER NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        UNIQUE(feedID, title)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_categories (
        postID INTEGER NOT NULL,
        categoryID INTEGER NOT NULL,
        UNIQUE(postID, categoryID)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS flags (
        postID INTEGER NOT NULL,
        flagID INTEGER NOT NULL,
        UNIQUE(postID, flagID)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scriptfolders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL DEFAULT '',
        showTotal BOOLEAN NOT NULL DEFAULT FALSE,
        showUnread BOOLEAN NOT NULL DEFAULT FALSE
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scriptfolder_posts (
        scriptFolderID INTEGER NOT NULL,
        postID INTEGER NOT NULL,
        UNIQUE(scriptFolderID, postID)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scripts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL DEFAULT 'lua',
        title TEXT NOT NULL DEFAULT '',
        isEnabled BOOLEAN NOT NULL DEFAULT FALSE,
        runOnEvents TEXT NOT NULL DEFAULT '',
        runOnFeedIDs TEXT,
        script TEXT NOT NULL DEFAULT ''
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL DEFAULT '',
        level INTEGER NOT NULL DEFAULT 2,
        message TEXT NOT NULL DEFAULT '',
        feedID INTEGER
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_logs_feedID ON logs(feedID);",
];

/// Installs the schema when absent and applies pending upgrades (idempotent).
/// Also seeds the single local source on a fresh store.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("db: ensuring schema (CREATE TABLE IF NOT EXISTS ...)");

    for stmt in V1_STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }

    let version = sqlx::query_scalar::<_, i64>("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await?;

    match version {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await?;
        }
        Some(v) if v < SCHEMA_VERSION => {
            apply_upgrades(pool, v).await?;
            sqlx::query("UPDATE schema_version SET version = ?")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await?;
        }
        Some(_) => {}
    }

    // Exactly one local source exists per store; seed it on first run.
    let local_sources = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sources WHERE type = 'local'")
        .fetch_one(pool)
        .await?;
    if local_sources == 0 {
        sqlx::query("INSERT INTO sources (type, title, sortOrder) VALUES ('local', 'On this computer', 10)")
            .execute(pool)
            .await?;
        info!("db: seeded local source");
    }

    Ok(())
}

/// Runs the schema upgrades from `from_version` up to the current version.
/// V1 is the initial schema, so nothing to do yet.
async fn apply_upgrades(_pool: &SqlitePool, from_version: i64) -> Result<()> {
    info!(from_version, "db: applying schema upgrades");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_install_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");
        let pool = common::init_db_pool(&db_path.to_string_lossy())
            .await
            .expect("init pool");

        ensure_schema(&pool).await.expect("first install");
        ensure_schema(&pool).await.expect("second install");

        let version: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(&pool)
            .await
            .expect("version row");
        assert_eq!(version, SCHEMA_VERSION);

        // the local source is seeded exactly once
        let locals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources WHERE type='local'")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(locals, 1);
    }
}

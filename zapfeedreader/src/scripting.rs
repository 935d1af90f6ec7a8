use mlua::{Lua, Table, Value};

use crate::error::Result;
use crate::model::{Enclosure, Feed, FlagColor, Post, Source};

/// Runs a Lua post script against a post draft.
///
/// The script sees a global `post` table with the mutable fields (title,
/// link, content, author, thumbnail, isRead, flags, scriptFolders,
/// enclosures, categories) and read-only `feed` and `source` tables. Any
/// change the script makes to `post` is copied back into the draft; the
/// caller persists it. Scripts run single-threaded, one invocation at a time.
pub fn run_post_script(script: &str, source: &Source, feed: &Feed, post: &mut Post) -> Result<()> {
    let lua = Lua::new();
    let globals = lua.globals();

    globals.set("post", post_to_table(&lua, post)?)?;
    globals.set("feed", feed_to_table(&lua, feed)?)?;
    globals.set("source", source_to_table(&lua, source)?)?;

    lua.load(script).exec()?;

    let post_table: Table = globals.get("post")?;
    table_into_post(&post_table, post)?;
    Ok(())
}

fn post_to_table<'lua>(lua: &'lua Lua, post: &Post) -> mlua::Result<Table<'lua>> {
    let table = lua.create_table()?;
    table.set("id", post.id)?;
    table.set("title", post.title.clone())?;
    table.set("link", post.link.clone())?;
    table.set("content", post.content.clone())?;
    table.set("author", post.author.clone())?;
    table.set("thumbnail", post.thumbnail.clone())?;
    table.set("isRead", post.is_read)?;

    let flags = lua.create_table()?;
    for (index, color) in post.flag_colors.iter().enumerate() {
        flags.set(index + 1, color.name())?;
    }
    table.set("flags", flags)?;

    let script_folders = lua.create_table()?;
    for (index, id) in post.script_folder_ids.iter().enumerate() {
        script_folders.set(index + 1, *id)?;
    }
    table.set("scriptFolders", script_folders)?;

    let enclosures = lua.create_table()?;
    for (index, enclosure) in post.enclosures.iter().enumerate() {
        let entry = lua.create_table()?;
        entry.set("url", enclosure.url.clone())?;
        entry.set("mimeType", enclosure.mime_type.clone())?;
        entry.set("size", enclosure.size)?;
        enclosures.set(index + 1, entry)?;
    }
    table.set("enclosures", enclosures)?;

    let categories = lua.create_table()?;
    for (index, category) in post.categories.iter().enumerate() {
        categories.set(index + 1, category.title.clone())?;
    }
    table.set("categories", categories)?;

    Ok(table)
}

fn feed_to_table<'lua>(lua: &'lua Lua, feed: &Feed) -> mlua::Result<Table<'lua>> {
    let table = lua.create_table()?;
    table.set("id", feed.id)?;
    table.set("title", feed.title.clone())?;
    table.set("url", feed.url.clone())?;
    table.set("link", feed.link.clone())?;
    Ok(table)
}

fn source_to_table<'lua>(lua: &'lua Lua, source: &Source) -> mlua::Result<Table<'lua>> {
    let table = lua.create_table()?;
    table.set("id", source.id)?;
    table.set("title", source.title.clone())?;
    table.set("type", source.typ.as_str())?;
    Ok(table)
}

fn table_into_post(table: &Table<'_>, post: &mut Post) -> mlua::Result<()> {
    post.title = table.get("title")?;
    post.link = table.get("link")?;
    post.content = table.get("content")?;
    post.author = table.get("author")?;
    post.thumbnail = table.get("thumbnail")?;
    post.is_read = table.get("isRead")?;

    post.flag_colors.clear();
    if let Value::Table(flags) = table.get("flags")? {
        for name in flags.sequence_values::<String>() {
            let name = name?;
            // unknown colour names are dropped rather than failing the script
            if let Ok(color) = FlagColor::from_name(&name) {
                if color != FlagColor::Gray && !post.flag_colors.contains(&color) {
                    post.flag_colors.push(color);
                }
            }
        }
    }

    post.script_folder_ids.clear();
    if let Value::Table(script_folders) = table.get("scriptFolders")? {
        for id in script_folders.sequence_values::<i64>() {
            let id = id?;
            if !post.script_folder_ids.contains(&id) {
                post.script_folder_ids.push(id);
            }
        }
    }

    if let Value::Table(enclosures) = table.get("enclosures")? {
        post.enclosures.clear();
        for entry in enclosures.sequence_values::<Table>() {
            let entry = entry?;
            post.enclosures.push(Enclosure {
                url: entry.get("url").unwrap_or_default(),
                mime_type: entry.get("mimeType").unwrap_or_default(),
                size: entry.get("size").unwrap_or_default(),
            });
        }
    }

    if let Value::Table(categories) = table.get("categories")? {
        let titles: mlua::Result<Vec<String>> = categories.sequence_values::<String>().collect();
        let titles = titles?;
        post.categories.retain(|c| titles.contains(&c.title));
        for title in titles {
            if !post.categories.iter().any(|c| c.title == title) {
                post.categories.push(crate::model::Category {
                    id: 0,
                    feed_id: post.feed_id,
                    title,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceType, FlagColor};

    fn sample_post() -> Post {
        Post {
            id: 1,
            feed_id: 2,
            feed_title: "Feed".into(),
            is_read: false,
            title: "Original title".into(),
            link: "https://example.com/post".into(),
            content: "body".into(),
            author: "Alice".into(),
            comments_url: String::new(),
            guid: "guid-1".into(),
            date_published: "2023-01-01T00:00:00Z".into(),
            thumbnail: None,
            enclosures: vec![],
            categories: vec![],
            flag_colors: vec![],
            script_folder_ids: vec![],
        }
    }

    fn sample_feed() -> Feed {
        Feed {
            id: 2,
            folder_id: 0,
            url: "https://example.com/feed.xml".into(),
            guid: String::new(),
            title: "Feed".into(),
            subtitle: String::new(),
            link: "https://example.com".into(),
            description: String::new(),
            language: String::new(),
            copyright: String::new(),
            icon_url: String::new(),
            icon_hash: String::new(),
            icon_last_fetched: String::new(),
            last_checked: String::new(),
            last_refresh_error: None,
            refresh_interval: None,
            sort_order: 10,
            unread_count: 0,
            icon: None,
            statistics: None,
        }
    }

    fn sample_source() -> Source {
        Source {
            id: 1,
            typ: SourceType::Local,
            title: "On this computer".into(),
            sort_order: 10,
            config_data: None,
            last_error: None,
        }
    }

    #[test]
    fn scripts_can_mutate_post_fields() {
        let mut post = sample_post();
        run_post_script(
            r#"post.title = "[" .. feed.title .. "] " .. post.title
               post.isRead = true"#,
            &sample_source(),
            &sample_feed(),
            &mut post,
        )
        .unwrap();
        assert_eq!(post.title, "[Feed] Original title");
        assert!(post.is_read);
    }

    #[test]
    fn scripts_can_flag_and_assign() {
        let mut post = sample_post();
        run_post_script(
            r#"table.insert(post.flags, "red")
               table.insert(post.scriptFolders, 42)"#,
            &sample_source(),
            &sample_feed(),
            &mut post,
        )
        .unwrap();
        assert_eq!(post.flag_colors, vec![FlagColor::Red]);
        assert_eq!(post.script_folder_ids, vec![42]);
    }

    #[test]
    fn script_errors_are_reported() {
        let mut post = sample_post();
        let err = run_post_script("error('boom')", &sample_source(), &sample_feed(), &mut post).unwrap_err();
        assert!(err.to_string().contains("boom"));
        // the draft keeps its pre-script state
        assert_eq!(post.title, "Original title");
    }

    #[test]
    fn scripts_can_edit_categories() {
        let mut post = sample_post();
        run_post_script(
            r#"post.categories = { "rust", "feeds" }"#,
            &sample_source(),
            &sample_feed(),
            &mut post,
        )
        .unwrap();
        let titles: Vec<&str> = post.categories.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["rust", "feeds"]);
    }
}

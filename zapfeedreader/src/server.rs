#![allow(non_snake_case)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use rocket::form::Form;
use rocket::http::{ContentType, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{catch, catchers, delete, get, patch, post, routes, State};
use serde::Serialize;
use serde_json::{json, Value};

use common::Config;

use crate::backend::{Backend, FeedFetchOptions, ScriptData};
use crate::error::{Error, Result};
use crate::local::LocalBackend;
use crate::model::{FeedAndPostID, FlagColor, ParentType, PostFilter, ScriptEvent, SortMethod};

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub backend: Arc<LocalBackend>,
}

/// Request guard enforcing basic auth against the configured account list.
/// An empty account list leaves the API open (trusted-network setups).
pub struct ApiUser;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ApiUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let state = match req.rocket().state::<AppState>() {
            Some(state) => state,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };

        let accounts = &state.config.zapfr.accounts;
        if accounts.is_empty() {
            return Outcome::Success(ApiUser);
        }

        if let Some(header) = req.headers().get_one("Authorization") {
            if let Some(encoded) = header.strip_prefix("Basic ") {
                if let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) {
                    let decoded = String::from_utf8_lossy(&decoded).into_owned();
                    if let Some((login, password)) = decoded.split_once(':') {
                        if accounts.iter().any(|a| a.login == login && a.password == password) {
                            return Outcome::Success(ApiUser);
                        }
                    }
                }
            }
        }
        Outcome::Error((Status::Unauthorized, ()))
    }
}

type ApiResponse = (Status, Json<Value>);

fn respond<T: Serialize>(result: Result<T>) -> ApiResponse {
    match result {
        Ok(value) => (Status::Ok, Json(serde_json::to_value(value).unwrap_or(Value::Null))),
        Err(e) => error_response(e),
    }
}

fn respond_empty(result: Result<()>) -> ApiResponse {
    match result {
        Ok(()) => (Status::Ok, Json(json!({}))),
        Err(e) => error_response(e),
    }
}

fn respond_success(result: Result<()>) -> ApiResponse {
    match result {
        Ok(()) => (Status::Ok, Json(json!({ "success": true }))),
        Err(e) => error_response(e),
    }
}

/// Unauthorized maps to 401, unknown entities to 404, parse/validation
/// problems stay 200 with `{success:false, error}`, the rest is a 500.
fn error_response(e: Error) -> ApiResponse {
    let body = Json(json!({ "success": false, "error": e.to_string() }));
    match e {
        Error::NotFound(_) => (Status::NotFound, body),
        Error::Parse(_) | Error::ConstraintViolation(_) => (Status::Ok, body),
        _ => (Status::InternalServerError, body),
    }
}

fn parse_parent(parent_type: Option<&str>, parent_id: Option<i64>) -> Result<ParentType> {
    ParentType::from_parts(parent_type.unwrap_or("source"), parent_id.unwrap_or(0))
}

fn parse_pairs(raw: &str) -> Result<Vec<FeedAndPostID>> {
    Ok(serde_json::from_str(raw)?)
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({ "success": false, "error": "404 - not found" }))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({ "success": false, "error": "401 - unauthorized" }))
}

#[get("/")]
fn index(state: &State<AppState>) -> (ContentType, String) {
    let name = state.config.zapfr.servername.as_deref().unwrap_or("ZapFeedReader server");
    let uptime = (Utc::now() - state.started_at).num_seconds();
    (
        ContentType::HTML,
        format!(
            "<html><head><title>{name}</title></head><body><h1>{name}</h1>\
             <p>API version {}</p><p>Up for {uptime} seconds</p></body></html>",
            crate::API_VERSION
        ),
    )
}

#[get("/about")]
fn about(state: &State<AppState>, _user: ApiUser) -> Json<Value> {
    let name = state.config.zapfr.servername.as_deref().unwrap_or("ZapFeedReader server");
    Json(json!({ "name": name, "version": crate::API_VERSION }))
}

#[get("/status")]
async fn source_status(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    respond(state.backend.get_status().await)
}

#[get("/unread-counts")]
async fn unread_counts(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    let result = state.backend.get_unread_counts().await.map(|counts| {
        counts
            .into_iter()
            .map(|c| (c.feed_id.to_string(), c.unread_count))
            .collect::<std::collections::BTreeMap<_, _>>()
    });
    respond(result)
}

#[get("/categories?<parentType>&<parentID>")]
async fn categories_list(
    state: &State<AppState>,
    _user: ApiUser,
    parentType: Option<&str>,
    parentID: Option<i64>,
) -> ApiResponse {
    let result = async {
        let parent = parse_parent(parentType, parentID)?;
        state.backend.get_categories(parent).await
    }
    .await;
    respond(result)
}

#[get("/used-flag-colors")]
async fn used_flag_colors(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    let result = state
        .backend
        .used_flag_colors()
        .await
        .map(|colors| colors.iter().map(|c| c.name()).collect::<Vec<_>>());
    respond(result)
}

// ---------------------------------------------------------------- feeds

#[get("/feeds?<getIcons>")]
async fn feeds_list(state: &State<AppState>, _user: ApiUser, getIcons: Option<bool>) -> ApiResponse {
    respond(state.backend.get_feeds(getIcons.unwrap_or(false)).await)
}

#[get("/feed/<id>?<getStatistics>&<getUnreadCount>")]
async fn feed_get(
    state: &State<AppState>,
    _user: ApiUser,
    id: i64,
    getStatistics: Option<bool>,
    getUnreadCount: Option<bool>,
) -> ApiResponse {
    let options = FeedFetchOptions {
        with_statistics: getStatistics.unwrap_or(false),
        with_unread_count: getUnreadCount.unwrap_or(false),
    };
    respond(state.backend.get_feed(id, options).await)
}

#[derive(rocket::FromForm)]
struct FeedAddForm {
    url: String,
    #[field(name = "parentFolderID", default = 0)]
    parent_folder_id: i64,
}

#[post("/feed", data = "<form>")]
async fn feed_add(state: &State<AppState>, _user: ApiUser, form: Form<FeedAddForm>) -> ApiResponse {
    respond(state.backend.subscribe_feed(&form.url, form.parent_folder_id).await)
}

#[post("/feed/<id>/refresh")]
async fn feed_refresh(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    match state.backend.refresh_feed(id).await {
        Ok(feed) => {
            let mut body = json!({ "success": feed.last_refresh_error.is_none(), "unreadCount": feed.unread_count });
            if let Some(error) = feed.last_refresh_error {
                body["error"] = Value::String(error);
            }
            (Status::Ok, Json(body))
        }
        Err(e) => error_response(e),
    }
}

#[derive(rocket::FromForm)]
struct MarkAsReadForm {
    #[field(name = "maxPostID", default = u64::MAX)]
    max_post_id: u64,
}

#[post("/feed/<id>/mark-as-read", data = "<form>")]
async fn feed_mark_as_read(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<MarkAsReadForm>) -> ApiResponse {
    respond_empty(state.backend.mark_feed_read(id, form.max_post_id).await)
}

#[derive(rocket::FromForm)]
struct MoveForm {
    #[field(name = "sortOrder")]
    sort_order: i64,
    #[field(name = "parentFolderID", default = 0)]
    parent_folder_id: i64,
}

#[post("/feed/<id>/move", data = "<form>")]
async fn feed_move(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<MoveForm>) -> ApiResponse {
    respond_success(state.backend.move_feed(id, form.parent_folder_id, form.sort_order).await)
}

#[derive(rocket::FromForm)]
struct FeedUpdateForm {
    url: String,
    #[field(name = "refreshInterval")]
    refresh_interval: Option<i64>,
}

#[patch("/feed/<id>", data = "<form>")]
async fn feed_update(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<FeedUpdateForm>) -> ApiResponse {
    respond_success(state.backend.update_feed(id, &form.url, form.refresh_interval).await)
}

#[delete("/feed/<id>")]
async fn feed_remove(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.delete_feed(id).await)
}

#[delete("/feed/<id>/logs")]
async fn feed_delete_logs(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.clear_logs(ParentType::Feed(id)).await)
}

// ---------------------------------------------------------------- folders

#[get("/folders?<parentFolderID>")]
async fn folders_list(state: &State<AppState>, _user: ApiUser, parentFolderID: Option<i64>) -> ApiResponse {
    respond(state.backend.get_folders(parentFolderID.unwrap_or(0)).await)
}

#[get("/folder/<id>")]
async fn folder_get(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond(state.backend.get_folder(id).await)
}

#[derive(rocket::FromForm)]
struct FolderAddForm {
    title: String,
    #[field(name = "parentFolderID", default = 0)]
    parent_folder_id: i64,
}

#[post("/folder", data = "<form>")]
async fn folder_add(state: &State<AppState>, _user: ApiUser, form: Form<FolderAddForm>) -> ApiResponse {
    respond(state.backend.add_folder(&form.title, form.parent_folder_id).await)
}

#[derive(rocket::FromForm)]
struct FolderUpdateForm {
    title: String,
}

#[patch("/folder/<id>", data = "<form>")]
async fn folder_update(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<FolderUpdateForm>) -> ApiResponse {
    respond_success(state.backend.update_folder(id, &form.title).await)
}

#[post("/folder/<id>/move", data = "<form>")]
async fn folder_move(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<MoveForm>) -> ApiResponse {
    respond_success(state.backend.move_folder(id, form.parent_folder_id, form.sort_order).await)
}

#[derive(rocket::FromForm)]
struct SortForm {
    #[field(name = "sortMethod")]
    sort_method: String,
}

#[post("/folder/<id>/sort", data = "<form>")]
async fn folder_sort(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<SortForm>) -> ApiResponse {
    let result = match SortMethod::from_str(&form.sort_method) {
        Ok(method) => state.backend.sort_folder(id, method).await,
        Err(e) => Err(e),
    };
    respond(result)
}

#[post("/folder/<id>/mark-as-read", data = "<form>")]
async fn folder_mark_as_read(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<MarkAsReadForm>) -> ApiResponse {
    respond(
        state
            .backend
            .mark_folder_read(id, form.max_post_id)
            .await
            .map(|feed_ids| json!({ "feedIDs": feed_ids })),
    )
}

#[delete("/folder/<id>")]
async fn folder_remove(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.delete_folder(id).await)
}

#[delete("/folder/<id>/logs")]
async fn folder_delete_logs(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.clear_logs(ParentType::Folder(id)).await)
}

// ---------------------------------------------------------------- posts

#[get("/posts?<parentType>&<parentID>&<perPage>&<page>&<showOnlyUnread>&<searchFilter>&<flagColor>&<categoryFilterID>")]
async fn posts_list(
    state: &State<AppState>,
    _user: ApiUser,
    parentType: Option<&str>,
    parentID: Option<i64>,
    perPage: Option<u64>,
    page: Option<u64>,
    showOnlyUnread: Option<bool>,
    searchFilter: Option<&str>,
    flagColor: Option<&str>,
    categoryFilterID: Option<i64>,
) -> ApiResponse {
    let result = async {
        let parent = parse_parent(parentType, parentID)?;
        let mut filter = PostFilter::new(parent, perPage.unwrap_or(100), page.unwrap_or(1));
        filter.show_only_unread = showOnlyUnread.unwrap_or(false);
        filter.search_filter = searchFilter.unwrap_or_default().to_string();
        filter.flag_color = match flagColor {
            Some(name) if !name.is_empty() => FlagColor::from_name(name)?,
            _ => FlagColor::Gray,
        };
        filter.category_id = categoryFilterID;

        let (count, posts) = state.backend.get_posts(&filter).await?;
        Ok(json!({ "count": count, "posts": posts }))
    }
    .await;
    respond(result)
}

#[get("/post/<id>?<feedID>")]
async fn post_get(state: &State<AppState>, _user: ApiUser, id: i64, feedID: i64) -> ApiResponse {
    respond(state.backend.get_post(feedID, id).await)
}

#[post("/mark-as-read", data = "<form>")]
async fn source_mark_as_read(state: &State<AppState>, _user: ApiUser, form: Form<MarkAsReadForm>) -> ApiResponse {
    respond_success(state.backend.mark_source_read(form.max_post_id).await)
}

#[derive(rocket::FromForm)]
struct PostsReadStatusForm {
    #[field(name = "feedsAndPostIDs")]
    feeds_and_post_ids: String,
    #[field(name = "markAsRead")]
    mark_as_read: bool,
}

#[post("/set-posts-read-status", data = "<form>")]
async fn set_posts_read_status(state: &State<AppState>, _user: ApiUser, form: Form<PostsReadStatusForm>) -> ApiResponse {
    let result = async {
        let pairs = parse_pairs(&form.feeds_and_post_ids)?;
        state.backend.set_posts_read_status(form.mark_as_read, &pairs).await
    }
    .await;
    respond_success(result)
}

#[derive(rocket::FromForm)]
struct PostsFlagStatusForm {
    #[field(name = "feedsAndPostIDs")]
    feeds_and_post_ids: String,
    #[field(name = "markFlagged")]
    mark_flagged: bool,
    #[field(name = "flagColors")]
    flag_colors: String,
}

#[post("/set-posts-flag-status", data = "<form>")]
async fn set_posts_flag_status(state: &State<AppState>, _user: ApiUser, form: Form<PostsFlagStatusForm>) -> ApiResponse {
    let result = async {
        let pairs = parse_pairs(&form.feeds_and_post_ids)?;
        let names: Vec<String> = serde_json::from_str(&form.flag_colors)?;
        let colors = names
            .iter()
            .map(|n| FlagColor::from_name(n))
            .collect::<Result<Vec<_>>>()?;
        state.backend.set_posts_flag_status(form.mark_flagged, &colors, &pairs).await
    }
    .await;
    respond_success(result)
}

// ---------------------------------------------------------------- script folders

#[get("/scriptfolders")]
async fn scriptfolders_list(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    respond(state.backend.get_script_folders().await)
}

#[get("/scriptfolder/<id>")]
async fn scriptfolder_get(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond(state.backend.get_script_folder(id).await)
}

#[derive(rocket::FromForm)]
struct ScriptFolderForm {
    title: String,
    #[field(name = "showTotal", default = false)]
    show_total: bool,
    #[field(name = "showUnread", default = false)]
    show_unread: bool,
}

#[post("/scriptfolder", data = "<form>")]
async fn scriptfolder_add(state: &State<AppState>, _user: ApiUser, form: Form<ScriptFolderForm>) -> ApiResponse {
    respond(
        state
            .backend
            .add_script_folder(&form.title, form.show_total, form.show_unread)
            .await,
    )
}

#[patch("/scriptfolder/<id>", data = "<form>")]
async fn scriptfolder_update(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<ScriptFolderForm>) -> ApiResponse {
    respond_success(
        state
            .backend
            .update_script_folder(id, &form.title, form.show_total, form.show_unread)
            .await,
    )
}

#[delete("/scriptfolder/<id>")]
async fn scriptfolder_remove(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.delete_script_folder(id).await)
}

#[post("/scriptfolder/<id>/mark-as-read", data = "<form>")]
async fn scriptfolder_mark_as_read(
    state: &State<AppState>,
    _user: ApiUser,
    id: i64,
    form: Form<MarkAsReadForm>,
) -> ApiResponse {
    respond(
        state
            .backend
            .mark_script_folder_read(id, form.max_post_id)
            .await
            .map(|feed_ids| json!({ "feedIDs": feed_ids })),
    )
}

#[derive(rocket::FromForm)]
struct AssignPostsForm {
    #[field(name = "feedsAndPostIDs")]
    feeds_and_post_ids: String,
    assign: bool,
}

#[post("/scriptfolder/<id>/assign-posts", data = "<form>")]
async fn scriptfolder_assign_posts(
    state: &State<AppState>,
    _user: ApiUser,
    id: i64,
    form: Form<AssignPostsForm>,
) -> ApiResponse {
    let result = async {
        let pairs = parse_pairs(&form.feeds_and_post_ids)?;
        state.backend.assign_posts_to_script_folder(id, form.assign, &pairs).await
    }
    .await;
    respond_success(result)
}

// ---------------------------------------------------------------- scripts

#[get("/scripts")]
async fn scripts_list(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    respond(state.backend.get_scripts().await)
}

#[derive(rocket::FromForm)]
struct ScriptForm {
    #[field(name = "type", default = String::from("lua"))]
    typ: String,
    title: String,
    #[field(name = "isEnabled", default = false)]
    is_enabled: bool,
    #[field(name = "runOnEvents", default = String::new())]
    run_on_events: String,
    #[field(name = "runOnFeedIDs")]
    run_on_feed_ids: Option<String>,
    #[field(default = String::new())]
    script: String,
}

impl ScriptForm {
    fn to_data(&self) -> ScriptData {
        ScriptData {
            typ: self.typ.clone(),
            title: self.title.clone(),
            is_enabled: self.is_enabled,
            run_on_events: self.run_on_events.split(',').filter_map(ScriptEvent::from_str).collect(),
            run_on_feed_ids: self
                .run_on_feed_ids
                .as_ref()
                .map(|raw| raw.split(',').filter_map(|part| part.trim().parse().ok()).collect()),
            script: self.script.clone(),
        }
    }
}

#[post("/script", data = "<form>")]
async fn script_add(state: &State<AppState>, _user: ApiUser, form: Form<ScriptForm>) -> ApiResponse {
    respond(state.backend.add_script(&form.to_data()).await)
}

#[patch("/script/<id>", data = "<form>")]
async fn script_update(state: &State<AppState>, _user: ApiUser, id: i64, form: Form<ScriptForm>) -> ApiResponse {
    respond_success(state.backend.update_script(id, &form.to_data()).await)
}

#[delete("/script/<id>")]
async fn script_remove(state: &State<AppState>, _user: ApiUser, id: i64) -> ApiResponse {
    respond_empty(state.backend.delete_script(id).await)
}

// ---------------------------------------------------------------- logs & misc

#[get("/logs?<parentType>&<parentID>&<perPage>&<page>")]
async fn logs_list(
    state: &State<AppState>,
    _user: ApiUser,
    parentType: Option<&str>,
    parentID: Option<i64>,
    perPage: Option<u64>,
    page: Option<u64>,
) -> ApiResponse {
    let result = async {
        let parent = parse_parent(parentType, parentID)?;
        let (count, logs) = state
            .backend
            .get_logs(parent, perPage.unwrap_or(100), page.unwrap_or(1))
            .await?;
        Ok(json!({ "count": count, "logs": logs }))
    }
    .await;
    respond(result)
}

#[delete("/source/logs")]
async fn source_delete_logs(state: &State<AppState>, _user: ApiUser) -> ApiResponse {
    respond_empty(state.backend.clear_logs(ParentType::Source).await)
}

#[derive(rocket::FromForm)]
struct ImportOpmlForm {
    opml: String,
    #[field(name = "parentFolderID", default = 0)]
    parent_folder_id: i64,
}

#[post("/import-opml", data = "<form>")]
async fn import_opml(state: &State<AppState>, _user: ApiUser, form: Form<ImportOpmlForm>) -> ApiResponse {
    respond(state.backend.import_opml(&form.opml, form.parent_folder_id).await)
}

// ---------------------------------------------------------------- dummy feeds (debug)

static DUMMY_POST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn dummy_post_count() -> u64 {
    DUMMY_POST_COUNTER.fetch_add(1, Ordering::SeqCst) % 10 + 1
}

#[get("/dummy-feed/rss20")]
fn dummy_feed_rss20(_user: ApiUser) -> (ContentType, String) {
    let count = dummy_post_count();
    let mut items = String::new();
    for i in 1..=count {
        items.push_str(&format!(
            "<item><title>Dummy post {i}</title><link>https://example.com/dummy/{i}</link>\
             <guid>dummy-{i}</guid><description>Dummy body {i}</description></item>"
        ));
    }
    (
        ContentType::new("application", "rss+xml"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Dummy RSS 2.0 feed</title><link>https://example.com/</link><description>Test data</description>{items}</channel></rss>"#
        ),
    )
}

#[get("/dummy-feed/atom10")]
fn dummy_feed_atom10(_user: ApiUser) -> (ContentType, String) {
    let count = dummy_post_count();
    let mut entries = String::new();
    for i in 1..=count {
        entries.push_str(&format!(
            r#"<entry><id>dummy-{i}</id><title>Dummy post {i}</title><link rel="alternate" href="https://example.com/dummy/{i}"/><updated>2024-01-01T00:00:00Z</updated><summary>Dummy body {i}</summary></entry>"#
        ));
    }
    (
        ContentType::new("application", "atom+xml"),
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom"><id>urn:dummy</id><title>Dummy Atom 1.0 feed</title><updated>2024-01-01T00:00:00Z</updated>{entries}</feed>"#
        ),
    )
}

#[get("/dummy-feed/json11")]
fn dummy_feed_json11(_user: ApiUser) -> (ContentType, String) {
    let count = dummy_post_count();
    let items: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "id": format!("dummy-{i}"),
                "url": format!("https://example.com/dummy/{i}"),
                "title": format!("Dummy post {i}"),
                "content_html": format!("<p>Dummy body {i}</p>")
            })
        })
        .collect();
    let body = json!({
        "version": "https://jsonfeed.org/version/1.1",
        "title": "Dummy JSON 1.1 feed",
        "items": items
    });
    (ContentType::new("application", "feed+json"), body.to_string())
}

/// Builds and launches the Rocket server; returns when Rocket shuts down.
pub async fn launch_rocket(backend: Arc<LocalBackend>, config: Arc<Config>) -> anyhow::Result<()> {
    let mut figment = rocket::Config::figment()
        .merge(("address", config.bind().to_string()))
        .merge(("port", config.port()))
        .merge(("ident", "ZapFeedReader"));

    // TLS only when both halves of the keypair are configured
    if let (Some(cert), Some(key)) = (config.zapfr.ssl_pubcert.clone(), config.zapfr.ssl_privkey.clone()) {
        figment = figment.merge(("tls.certs", cert)).merge(("tls.key", key));
    }

    let state = AppState {
        started_at: Utc::now(),
        config,
        backend,
    };

    rocket::custom(figment)
        .manage(state)
        .register("/", catchers![not_found, unauthorized])
        .mount(
            "/",
            routes![
                index,
                about,
                source_status,
                unread_counts,
                categories_list,
                used_flag_colors,
                feeds_list,
                feed_get,
                feed_add,
                feed_refresh,
                feed_mark_as_read,
                feed_move,
                feed_update,
                feed_remove,
                feed_delete_logs,
                folders_list,
                folder_get,
                folder_add,
                folder_update,
                folder_move,
                folder_sort,
                folder_mark_as_read,
                folder_remove,
                folder_delete_logs,
                posts_list,
                post_get,
                source_mark_as_read,
                set_posts_read_status,
                set_posts_flag_status,
                scriptfolders_list,
                scriptfolder_get,
                scriptfolder_add,
                scriptfolder_update,
                scriptfolder_remove,
                scriptfolder_mark_as_read,
                scriptfolder_assign_posts,
                scripts_list,
                script_add,
                script_update,
                script_remove,
                logs_list,
                source_delete_logs,
                import_opml,
                dummy_feed_rss20,
                dummy_feed_atom10,
                dummy_feed_json11,
            ],
        )
        .launch()
        .await?;

    Ok(())
}

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::model::LogLevel;

/// Redirect chains longer than this fail with `TooManyRedirects`.
pub const REDIRECT_CAP: usize = 10;

const REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// ETag / Last-Modified pair used for conditional GET. Persisted on the feed
/// row as JSON so a 304 short-circuit survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalGetInfo {
    #[serde(default)]
    pub etag: String,
    #[serde(rename = "lastModified", default)]
    pub last_modified: String,
}

impl ConditionalGetInfo {
    pub fn is_empty(&self) -> bool {
        self.etag.is_empty() && self.last_modified.is_empty()
    }

    pub fn to_blob(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_blob(blob: &str) -> Option<Self> {
        if blob.is_empty() {
            return None;
        }
        serde_json::from_str(blob).ok()
    }
}

/// Basic-auth credentials; an empty pair means "none supplied".
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.login.is_empty() && self.password.is_empty()
    }
}

/// How POST/PATCH parameters are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    FormUrlEncoded,
    Multipart,
}

/// The outcome of a request: raw body bytes plus any cache validators the
/// server handed back. A 304 yields an empty body so callers can skip parsing.
#[derive(Debug)]
pub struct FetchResponse {
    pub body: Vec<u8>,
    pub conditional_get: Option<ConditionalGetInfo>,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// TLS verification is permissive: remote sources are commonly self-signed.
fn shared_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .user_agent(format!("ZapFeedReader/{}", crate::API_VERSION))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("failed to build reqwest client")
    })
}

/// Performs an HTTP request with manual redirect handling, optional basic
/// auth, form parameters and conditional GET.
///
/// Parameters ride the query string for GET/DELETE and the body for
/// POST/PATCH. Redirects (301/302) are resolved against the request URI and
/// followed up to `REDIRECT_CAP` times; each hop is logged against
/// `associated_feed_id` when a pool is given. A 401 is retried once with the
/// supplied credentials. Any final status outside 200-299 is an error.
pub async fn request(
    pool: Option<&SqlitePool>,
    uri: &str,
    method: Method,
    credentials: &Credentials,
    parameters: &BTreeMap<String, String>,
    encoding: BodyEncoding,
    associated_feed_id: Option<i64>,
    conditional_get: Option<&ConditionalGetInfo>,
) -> Result<FetchResponse> {
    let mut url = parse_supported_url(uri)?;
    let mut redirects_followed = 0usize;

    loop {
        let response = send_once(&url, &method, None, parameters, encoding, conditional_get).await?;
        let status = response.status();

        if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
            if redirects_followed >= REDIRECT_CAP {
                return Err(Error::TooManyRedirects(uri.to_string()));
            }
            redirects_followed += 1;

            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::Network(format!("Redirect without Location header for {url}")))?;
            let new_url = resolve_redirect(&url, location)?;
            let verb = if status == StatusCode::MOVED_PERMANENTLY {
                "Moved permanently"
            } else {
                "Moved temporarily"
            };
            log_redirect(pool, associated_feed_id, &format!("{verb} to {new_url}")).await;
            url = new_url;
            continue;
        }

        if status == StatusCode::UNAUTHORIZED {
            if credentials.is_empty() {
                return Err(Error::AuthRequired);
            }
            let retried = send_once(&url, &method, Some(credentials), parameters, encoding, conditional_get).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(Error::AuthFailed);
            }
            return finish(retried, &method, &url, conditional_get).await;
        }

        return finish(response, &method, &url, conditional_get).await;
    }
}

/// Convenience wrapper: a plain GET without parameters or credentials.
pub async fn get(pool: Option<&SqlitePool>, uri: &str, associated_feed_id: Option<i64>) -> Result<FetchResponse> {
    request(
        pool,
        uri,
        Method::GET,
        &Credentials::default(),
        &BTreeMap::new(),
        BodyEncoding::FormUrlEncoded,
        associated_feed_id,
        None,
    )
    .await
}

fn parse_supported_url(uri: &str) -> Result<Url> {
    let url = Url::parse(uri)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(Error::UnknownScheme(uri.to_string())),
    }
}

/// Redirect targets may be relative; resolve them against the request URI.
fn resolve_redirect(base: &Url, location: &str) -> Result<Url> {
    if location.starts_with("http") {
        parse_supported_url(location)
    } else {
        Ok(base.join(location)?)
    }
}

async fn send_once(
    url: &Url,
    method: &Method,
    credentials: Option<&Credentials>,
    parameters: &BTreeMap<String, String>,
    encoding: BodyEncoding,
    conditional_get: Option<&ConditionalGetInfo>,
) -> Result<reqwest::Response> {
    let client = shared_client();
    let mut builder = client.request(method.clone(), url.clone());

    if !parameters.is_empty() {
        if *method == Method::POST || *method == Method::PATCH {
            match encoding {
                BodyEncoding::FormUrlEncoded => {
                    builder = builder.form(parameters);
                }
                BodyEncoding::Multipart => {
                    let mut form = reqwest::multipart::Form::new();
                    for (k, v) in parameters {
                        form = form.text(k.clone(), v.clone());
                    }
                    builder = builder.multipart(form);
                }
            }
        } else {
            builder = builder.query(parameters);
        }
    }

    if let Some(creds) = credentials {
        builder = builder.basic_auth(&creds.login, Some(&creds.password));
    }

    if let Some(cgi) = conditional_get {
        if !cgi.etag.is_empty() {
            builder = builder.header(reqwest::header::IF_NONE_MATCH, &cgi.etag);
        }
        if !cgi.last_modified.is_empty() {
            builder = builder.header(reqwest::header::IF_MODIFIED_SINCE, &cgi.last_modified);
        }
    }

    Ok(builder.send().await?)
}

async fn finish(
    response: reqwest::Response,
    method: &Method,
    url: &Url,
    prior: Option<&ConditionalGetInfo>,
) -> Result<FetchResponse> {
    let status = response.status();

    if status == StatusCode::NOT_MODIFIED {
        // nothing changed; hand the caller an empty body and keep the validators
        return Ok(FetchResponse {
            body: Vec::new(),
            conditional_get: prior.cloned(),
        });
    }

    if !status.is_success() {
        return Err(Error::HttpStatus(status.as_u16(), method.to_string(), url.to_string()));
    }

    let mut new_info = ConditionalGetInfo::default();
    if let Some(etag) = response.headers().get(reqwest::header::ETAG).and_then(|v| v.to_str().ok()) {
        new_info.etag = etag.to_string();
    }
    if let Some(lm) = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
    {
        new_info.last_modified = lm.to_string();
    }

    let body = response.bytes().await?.to_vec();
    Ok(FetchResponse {
        body,
        conditional_get: if new_info.is_empty() { None } else { Some(new_info) },
    })
}

async fn log_redirect(pool: Option<&SqlitePool>, feed_id: Option<i64>, message: &str) {
    info!(?feed_id, "{message}");
    if let Some(pool) = pool {
        crate::local::logs::insert(pool, LogLevel::Info, message, feed_id).await;
    }
}

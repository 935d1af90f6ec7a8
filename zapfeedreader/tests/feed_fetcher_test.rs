use std::collections::BTreeMap;

use reqwest::Method;
use zapfeedreader::error::Error;
use zapfeedreader::fetch::{self, BodyEncoding, ConditionalGetInfo, Credentials};

fn no_params() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[tokio::test]
async fn plain_get_returns_the_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_body("<rss version=\"2.0\"><channel><title>t</title></channel></rss>")
        .create_async()
        .await;

    let response = fetch::get(None, &format!("{}/feed.xml", server.url()), None)
        .await
        .expect("fetch");
    assert!(response.text().starts_with("<rss"));
    mock.assert_async().await;
}

#[tokio::test]
async fn redirects_are_followed_and_resolved() {
    let mut server = mockito::Server::new_async().await;
    let _redirect = server
        .mock("GET", "/old")
        .with_status(301)
        .with_header("Location", "/new")
        .create_async()
        .await;
    let target = server
        .mock("GET", "/new")
        .with_status(200)
        .with_body("arrived")
        .create_async()
        .await;

    let response = fetch::get(None, &format!("{}/old", server.url()), None).await.expect("fetch");
    assert_eq!(response.text(), "arrived");
    target.assert_async().await;
}

#[tokio::test]
async fn redirect_loops_hit_the_cap() {
    let mut server = mockito::Server::new_async().await;
    let _loop_mock = server
        .mock("GET", "/loop")
        .with_status(302)
        .with_header("Location", "/loop")
        .expect_at_least(1)
        .create_async()
        .await;

    let err = fetch::get(None, &format!("{}/loop", server.url()), None).await.unwrap_err();
    assert!(matches!(err, Error::TooManyRedirects(_)));
}

#[tokio::test]
async fn unauthorized_without_credentials_is_an_auth_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/private").with_status(401).create_async().await;

    let err = fetch::get(None, &format!("{}/private", server.url()), None).await.unwrap_err();
    assert!(matches!(err, Error::AuthRequired));
}

#[tokio::test]
async fn unauthorized_with_credentials_retries_once() {
    let mut server = mockito::Server::new_async().await;
    // first attempt carries no Authorization header and gets challenged
    let _challenge = server
        .mock("GET", "/private")
        .match_header("Authorization", mockito::Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;
    let authed = server
        .mock("GET", "/private")
        .match_header("Authorization", mockito::Matcher::Regex("Basic .+".to_string()))
        .with_status(200)
        .with_body("secret")
        .create_async()
        .await;

    let creds = Credentials {
        login: "alice".into(),
        password: "hunter2".into(),
    };
    let response = fetch::request(
        None,
        &format!("{}/private", server.url()),
        Method::GET,
        &creds,
        &no_params(),
        BodyEncoding::FormUrlEncoded,
        None,
        None,
    )
    .await
    .expect("authenticated fetch");
    assert_eq!(response.text(), "secret");
    authed.assert_async().await;
}

#[tokio::test]
async fn failing_statuses_are_reported() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/gone").with_status(410).create_async().await;

    let err = fetch::get(None, &format!("{}/gone", server.url()), None).await.unwrap_err();
    match err {
        Error::HttpStatus(status, method, _) => {
            assert_eq!(status, 410);
            assert_eq!(method, "GET");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn conditional_get_round_trip() {
    let mut server = mockito::Server::new_async().await;

    // first fetch hands out validators
    let _first = server
        .mock("GET", "/feed.xml")
        .match_header("If-None-Match", mockito::Matcher::Missing)
        .with_status(200)
        .with_header("ETag", "\"v1\"")
        .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
        .with_body("body-v1")
        .create_async()
        .await;

    let url = format!("{}/feed.xml", server.url());
    let first = fetch::get(None, &url, None).await.expect("first fetch");
    let cgi = first.conditional_get.clone().expect("validators");
    assert_eq!(cgi.etag, "\"v1\"");

    // second fetch presents them and gets a 304 with an empty body
    let _second = server
        .mock("GET", "/feed.xml")
        .match_header("If-None-Match", "\"v1\"")
        .with_status(304)
        .create_async()
        .await;

    let second = fetch::request(
        None,
        &url,
        Method::GET,
        &Credentials::default(),
        &no_params(),
        BodyEncoding::FormUrlEncoded,
        None,
        Some(&cgi),
    )
    .await
    .expect("conditional fetch");
    assert!(second.body.is_empty());
    // the caller keeps its validators for the next round
    assert_eq!(second.conditional_get, Some(cgi));
}

#[tokio::test]
async fn unknown_schemes_are_rejected() {
    let err = fetch::get(None, "gopher://example.com/feed", None).await.unwrap_err();
    assert!(matches!(err, Error::UnknownScheme(_)));
}

#[test]
fn conditional_get_blob_survives_persistence() {
    let info = ConditionalGetInfo {
        etag: "\"abc\"".into(),
        last_modified: "Thu, 01 Jun 2023 10:00:00 GMT".into(),
    };
    assert_eq!(ConditionalGetInfo::from_blob(&info.to_blob()), Some(info));
}

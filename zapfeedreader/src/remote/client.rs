use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::{self, BodyEncoding, Credentials};
use crate::model::RemoteSourceSettings;

/// HTTP client for a peer engine's API. One call per engine operation;
/// parameters are form/query encoded strings, responses are JSON.
pub struct ApiClient {
    base: Url,
    credentials: Credentials,
}

impl ApiClient {
    pub fn from_settings(settings: &RemoteSourceSettings) -> Result<Self> {
        let scheme = if settings.use_https { "https" } else { "http" };
        let base = Url::parse(&format!("{}://{}:{}/", scheme, settings.host, settings.port))?;
        Ok(Self {
            base,
            credentials: Credentials {
                login: settings.login.clone(),
                password: settings.password.clone(),
            },
        })
    }

    pub async fn get(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        self.call(Method::GET, path, params).await
    }

    pub async fn post(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        self.call(Method::POST, path, params).await
    }

    pub async fn patch(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        self.call(Method::PATCH, path, params).await
    }

    pub async fn delete(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        self.call(Method::DELETE, path, params).await
    }

    async fn call(&self, method: Method, path: &str, params: &BTreeMap<String, String>) -> Result<Value> {
        let url = self.base.join(path)?;
        let response = fetch::request(
            None,
            url.as_str(),
            method,
            &self.credentials,
            params,
            BodyEncoding::FormUrlEncoded,
            None,
            None,
        )
        .await
        .map_err(|e| match e {
            Error::HttpStatus(404, _, _) => Error::NotFound(format!("{path} not found on remote source")),
            other => other,
        })?;

        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(&response.body)?;

        // validation failures come back as 200 with {success:false, error}
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Remote operation failed")
                .to_string();
            return Err(Error::ConstraintViolation(message));
        }

        Ok(value)
    }
}

/// Wire encoding for boolean parameters: the strings "true" / "false".
pub fn bool_param(value: bool) -> String {
    if value {
        "true".to_string()
    } else {
        "false".to_string()
    }
}

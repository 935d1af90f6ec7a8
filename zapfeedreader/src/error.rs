use thiserror::Error;

/// Error taxonomy of the engine. Refresh jobs catch all of these per feed;
/// CRUD operations surface them to the caller with the store unchanged.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown scheme in URL: {0}")]
    UnknownScheme(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status 401 Unauthorized; no credentials provided")]
    AuthRequired,

    #[error("HTTP status 401 Unauthorized; credentials rejected")]
    AuthFailed,

    #[error("HTTP status {0} received for {1} {2}")]
    HttpStatus(u16, String, String),

    #[error("Too many redirects for {0}")]
    TooManyRedirects(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Schema(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Script error: {0}")]
    ScriptRuntime(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unknown exception")]
    Unknown,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<mlua::Error> for Error {
    fn from(e: mlua::Error) -> Self {
        Error::ScriptRuntime(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

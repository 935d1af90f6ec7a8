// Library interface for zapfeedreader modules
// This allows tests and the server binary to import modules

pub mod agent;
pub mod autorefresh;
pub mod backend;
pub mod db;
pub mod error;
pub mod feed_parsing;
pub mod fetch;
pub mod local;
pub mod model;
pub mod remote;
pub mod scripting;
pub mod server;

/// Version of the HTTP API; also reported in the User-Agent header.
pub const API_VERSION: &str = "1.0.0";

use std::path::Path;

use sqlx::SqlitePool;

use backend::Backend;
use error::Result;
use model::{Source, SourceType};

/// Picks the backend realisation matching a source's type.
pub fn backend_for_source(pool: &SqlitePool, icon_dir: &Path, source: &Source) -> Result<Box<dyn Backend>> {
    match source.typ {
        SourceType::Local => Ok(Box::new(local::LocalBackend::new(
            pool.clone(),
            icon_dir.to_path_buf(),
        ))),
        SourceType::Remote => Ok(Box::new(remote::RemoteBackend::from_source(source)?)),
    }
}

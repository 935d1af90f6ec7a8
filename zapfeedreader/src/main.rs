/*
zapfeedreader - single-binary main.rs
This binary starts the Rocket HTTP server and runs the job agent plus the
auto-refresh loop inside the same process.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::{init_db_pool, Config};
use zapfeedreader::agent::Agent;
use zapfeedreader::autorefresh::AutoRefresh;
use zapfeedreader::local::LocalBackend;
use zapfeedreader::server::launch_rocket;

#[derive(Parser, Debug)]
#[command(name = "zapfeedreader", about = "ZapFeedReader single-binary server + worker")]
struct Args {
    /// Path to the JSON server configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the data directory (database and icons)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Disable the auto-refresh loop (serve requests only)
    #[arg(long)]
    no_autorefresh: bool,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve config path
    let config = if let Some(path) = &args.config {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }
        Config::from_file(path).await?
    } else {
        let default_path = PathBuf::from("zapfeedreader-server.conf");
        if default_path.exists() {
            Config::from_file(&default_path).await?
        } else {
            serde_json::from_str(r#"{ "zapfr": {} }"#).context("default configuration")?
        }
    };

    // Initialize logging; CLI wins over the config loglevel
    let filter_directive = args.log_level.clone().unwrap_or_else(|| config.log_filter().to_string());
    let filter = EnvFilter::try_new(&filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
    info!("configuration loaded");

    // Privileged resources (the config file itself, certificates) are open by
    // now; drop root before touching the data directory.
    #[cfg(unix)]
    let home_override = drop_privileges(&config)?;
    #[cfg(not(unix))]
    let home_override: Option<PathBuf> = None;

    // Resolve the data directory under the (possibly new) user's home
    let data_dir = if let Some(dir) = args.data_dir {
        dir
    } else {
        let base = home_override
            .map(|home| home.join(".local/share"))
            .or_else(dirs::data_dir)
            .context("could not determine a data directory")?;
        base.join("zapfeedreader")
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let db_path = data_dir.join("zapfeedreader.db");
    info!(db_path = %db_path.display(), "resolved DB path");

    let pool = match init_db_pool(&db_path.to_string_lossy()).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(%e, "failed to initialize database pool");
            return Err(e);
        }
    };
    zapfeedreader::db::ensure_schema(&pool).await?;

    let icon_dir = data_dir.join("icons");
    let backend = Arc::new(LocalBackend::new(pool.clone(), icon_dir.clone()));

    // Prepare a shutdown notifier for the background loops
    let shutdown_notify = Arc::new(Notify::new());

    let agent = Agent::new(pool.clone(), icon_dir);

    let autorefresh = AutoRefresh::start(
        pool.clone(),
        agent.clone(),
        shutdown_notify.clone(),
        config.auto_refresh_enabled() && !args.no_autorefresh,
        config.auto_refresh_interval(),
        |result| match result {
            Ok(feed) => info!(feed_id = feed.id, unread = feed.unread_count, "feed refreshed"),
            Err(e) => error!(%e, "feed refresh failed"),
        },
    );
    if autorefresh.is_enabled() {
        info!("auto-refresh loop enabled");
    } else {
        info!("auto-refresh loop disabled");
    }

    // Launch the Rocket server (blocks until Rocket shuts down on SIGINT/SIGTERM)
    info!("launching HTTP server on {}:{}", config.bind(), config.port());
    if let Err(e) = launch_rocket(backend, Arc::new(config)).await {
        error!(%e, "HTTP server failed");
    }

    // When the server stops, notify the loops and drain the agent with a grace period.
    info!("HTTP server stopped; draining job agent");
    shutdown_notify.notify_waiters();
    if tokio::time::timeout(Duration::from_secs(20), agent.shutdown()).await.is_err() {
        info!("timed out waiting for running jobs; continuing shutdown");
    }

    info!("shutdown complete");
    Ok(())
}

/// Drops root to the configured user/group. Returns the new home directory
/// when a switch happened, so the data dir lands under the target user.
#[cfg(unix)]
fn drop_privileges(config: &Config) -> Result<Option<PathBuf>> {
    let user = match config.zapfr.user.as_deref() {
        Some(user) if !user.is_empty() => user,
        _ => return Ok(None),
    };

    // only root can switch; for anyone else the setting is ignored
    if unsafe { libc::geteuid() } != 0 {
        return Ok(None);
    }

    let user_cstr = std::ffi::CString::new(user).context("invalid user name")?;
    let passwd = unsafe { libc::getpwnam(user_cstr.as_ptr()) };
    if passwd.is_null() {
        return Err(anyhow::anyhow!("unknown user: {user}"));
    }
    let (uid, gid, home) = unsafe {
        let p = &*passwd;
        let home = std::ffi::CStr::from_ptr(p.pw_dir).to_string_lossy().into_owned();
        (p.pw_uid, p.pw_gid, home)
    };

    let mut target_gid = gid;
    if let Some(group) = config.zapfr.group.as_deref() {
        if !group.is_empty() {
            let group_cstr = std::ffi::CString::new(group).context("invalid group name")?;
            let grp = unsafe { libc::getgrnam(group_cstr.as_ptr()) };
            if grp.is_null() {
                return Err(anyhow::anyhow!("unknown group: {group}"));
            }
            target_gid = unsafe { (*grp).gr_gid };
        }
    }

    // group first; setuid would make setgid impossible afterwards
    if unsafe { libc::setgid(target_gid) } != 0 {
        return Err(anyhow::anyhow!("setgid({target_gid}) failed"));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return Err(anyhow::anyhow!("setuid({uid}) failed"));
    }

    std::env::set_var("HOME", &home);
    info!(user, "dropped privileges");
    Ok(Some(PathBuf::from(home)))
}

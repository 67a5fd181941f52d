//! Server commands: `vivo-site serve` and `vivo-site init-db`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::error;

use vivo_site::site::server::{ServerConfig, open_database, start_server};
use vivo_site::site_config::SiteToml;

pub async fn cmd_serve(config_path: &Path, port: Option<u16>, dev: bool, open: bool) -> Result<()> {
    let site = SiteToml::load_or_default(config_path)?;
    let problems = site.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!(%problem, "configuration problem");
        }
        anyhow::bail!(
            "{} configuration problem(s) in {}: {}",
            problems.len(),
            config_path.display(),
            problems.join("; ")
        );
    }

    let port = port.unwrap_or(site.server.port);
    let dev_mode = dev || site.server.dev_mode;

    // Skip in dev mode (no browser inside containers)
    if open && !dev_mode {
        let url = format!("http://localhost:{}{}", port, site.patpass.landing_path);
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                eprintln!("Failed to open browser: {}", e);
            }
        });
    }

    start_server(ServerConfig {
        port,
        dev_mode,
        site,
    })
    .await
}

pub fn cmd_init_db(config_path: &Path, db_path: Option<PathBuf>) -> Result<()> {
    let site = SiteToml::load_or_default(config_path)?;
    let db_path = db_path.unwrap_or(site.server.db_path);
    open_database(&db_path)
        .with_context(|| format!("Failed to initialize {}", db_path.display()))?;
    println!("Site database initialized at {}", db_path.display());
    Ok(())
}

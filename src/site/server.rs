use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use super::api::{self, AppState};
use super::db::{DbHandle, SiteDb};
use crate::contact::{ContactRateLimiter, Mailer, SmtpMailer};
use crate::enrollment::EnrollmentService;
use crate::enrollment::clock::{SystemClock, TokioDelay};
use crate::enrollment::store::{MemoryPendingStore, PendingStore, SqlitePendingStore};
use crate::kitchen::HuggingFaceGenerator;
use crate::site_config::{MailCredentials, PendingBackend, SiteToml, image_token_from_env};

const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration for the site server.
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
    pub site: SiteToml,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let site = SiteToml::default();
        Self {
            port: site.server.port,
            dev_mode: site.server.dev_mode,
            site,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Open the pending-enrollment store selected in `[server]`.
pub fn open_pending_store(site: &SiteToml) -> Result<Arc<dyn PendingStore>> {
    match site.server.pending_backend {
        PendingBackend::Memory => Ok(Arc::new(MemoryPendingStore::new())),
        PendingBackend::Sqlite => {
            let db = open_database(&site.server.db_path)?;
            Ok(Arc::new(SqlitePendingStore::new(DbHandle::new(db))))
        }
    }
}

/// Create parent directories and open the site database, running migrations.
pub fn open_database(path: &std::path::Path) -> Result<SiteDb> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    SiteDb::new(path).context("Failed to initialize site database")
}

/// Assemble the application state from configuration and secrets.
pub fn build_state(
    site: &SiteToml,
    credentials: Option<MailCredentials>,
    image_token: Option<String>,
) -> Result<AppState> {
    let problems = site.validate();
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration: {}", problems.join("; "));
    }

    let store = open_pending_store(site)?;
    let enrollment = EnrollmentService::from_config(
        &site.patpass,
        store,
        Arc::new(SystemClock),
        Arc::new(TokioDelay),
    )
    .context("Invalid [patpass] configuration")?;

    let mailer: Option<Arc<dyn Mailer>> = match credentials {
        Some(credentials) => Some(Arc::new(
            SmtpMailer::new(&site.mail, credentials).context("Failed to set up SMTP transport")?,
        )),
        None => {
            info!("mail credentials not set; contact form will report a configuration error");
            None
        }
    };

    Ok(AppState {
        enrollment,
        rate_limiter: ContactRateLimiter::new(site.mail.rate_limit, site.mail.rate_window()),
        mailer,
        images: Arc::new(
            HuggingFaceGenerator::new(site.image.clone(), image_token)
                .context("Failed to set up image client")?,
        ),
        mail_subject: site.mail.subject.clone(),
    })
}

/// Start the site server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = Arc::new(build_state(
        &config.site,
        MailCredentials::from_env(),
        image_token_from_env(),
    )?);
    info!(
        backend = %config.site.server.pending_backend,
        success_rate = config.site.patpass.success_rate,
        "site state ready"
    );

    spawn_rate_limit_pruner(state.clone());

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    println!("Vivo site running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

fn spawn_rate_limit_pruner(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let dropped = state.rate_limiter.prune_at(Instant::now());
            if dropped > 0 {
                debug!(dropped, "pruned idle rate-limit entries");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}

//! Site configuration read from `site.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Secrets never live in the file; they are read from the environment
//! (optionally populated from `.env` by `dotenvy` at startup).
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 3000
//! db_path = ".vivo/site.db"
//! pending_backend = "sqlite"
//!
//! [patpass]
//! commerce_code = "597055555532"
//! public_base_url = "http://localhost:3000"
//! landing_path = "/Services"
//! success_rate = 0.9
//! init_delay_ms = 1000
//! confirm_delay_ms = 2000
//!
//! [mail]
//! smtp_host = "smtp-relay.brevo.com"
//! smtp_port = 587
//! rate_limit = 3
//! rate_window_secs = 120
//!
//! [image]
//! model_url = "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev"
//! num_inference_steps = 30
//! guidance_scale = 7.5
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SMTP_USER: &str = "BREVO_SMTP_USER";
pub const ENV_SMTP_KEY: &str = "BREVO_SMTP_KEY";
pub const ENV_RECIPIENT_1: &str = "EMAIL_1";
pub const ENV_RECIPIENT_2: &str = "EMAIL_2";
pub const ENV_IMAGE_TOKEN: &str = "HF_TOKEN";

/// Where the pending enrollment slot lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingBackend {
    /// Process memory; lost on restart.
    Memory,
    /// `settings` table of the site database.
    #[default]
    Sqlite,
}

impl std::fmt::Display for PendingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingBackend::Memory => write!(f, "memory"),
            PendingBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind 0.0.0.0 and enable permissive CORS
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub pending_backend: PendingBackend,
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".vivo/site.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            dev_mode: false,
            db_path: default_db_path(),
            pending_backend: PendingBackend::default(),
        }
    }
}

/// PatPass (Webpay recurring payments) simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatPassSection {
    /// Commerce code sent in the init payload (integration environment)
    #[serde(default = "default_commerce_code")]
    pub commerce_code: String,
    #[serde(default = "default_commerce_name")]
    pub commerce_name: String,
    /// Base URL of the payment enabler, used to synthesize the init URL
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,
    /// Public origin of this site; redirects are built against it
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_return_path")]
    pub return_path: String,
    /// Page the callback route forwards the browser to
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
    #[serde(default = "default_logo_path")]
    pub logo_path: String,
    /// Probability that the mock gateway confirms an enrollment
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default = "default_init_delay_ms")]
    pub init_delay_ms: u64,
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,
}

fn default_commerce_code() -> String {
    "597055555532".to_string()
}

fn default_commerce_name() -> String {
    "Vivo Muebles - Recolección Sustentable".to_string()
}

fn default_gateway_base_url() -> String {
    "https://pagoautomaticocontarjetasint.transbank.cl".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_return_path() -> String {
    "/api/patpass/callback".to_string()
}

fn default_landing_path() -> String {
    "/Services".to_string()
}

fn default_logo_path() -> String {
    "/logo-slogan.png".to_string()
}

fn default_success_rate() -> f64 {
    0.9
}

fn default_init_delay_ms() -> u64 {
    1000
}

fn default_confirm_delay_ms() -> u64 {
    2000
}

impl Default for PatPassSection {
    fn default() -> Self {
        Self {
            commerce_code: default_commerce_code(),
            commerce_name: default_commerce_name(),
            gateway_base_url: default_gateway_base_url(),
            public_base_url: default_public_base_url(),
            return_path: default_return_path(),
            landing_path: default_landing_path(),
            logo_path: default_logo_path(),
            success_rate: default_success_rate(),
            init_delay_ms: default_init_delay_ms(),
            confirm_delay_ms: default_confirm_delay_ms(),
        }
    }
}

impl PatPassSection {
    pub fn init_delay(&self) -> Duration {
        Duration::from_millis(self.init_delay_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

/// Contact mailer settings. Credentials come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSection {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Messages accepted per client inside one window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
}

fn default_smtp_host() -> String {
    "smtp-relay.brevo.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_subject() -> String {
    "New contact message from the website".to_string()
}

fn default_rate_limit() -> u32 {
    3
}

fn default_rate_window_secs() -> u64 {
    120
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            subject: default_subject(),
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window_secs(),
        }
    }
}

impl MailSection {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}

/// Kitchen image generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSection {
    #[serde(default = "default_model_url")]
    pub model_url: String,
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,
    #[serde(default = "default_num_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    /// Upper bound on one generation request, connect to last byte
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_url() -> String {
    "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-dev".to_string()
}

fn default_negative_prompt() -> String {
    "blurry, low quality, distorted, ugly, bad anatomy".to_string()
}

fn default_num_inference_steps() -> u32 {
    30
}

fn default_guidance_scale() -> f64 {
    7.5
}

fn default_image_timeout_secs() -> u64 {
    120
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            model_url: default_model_url(),
            negative_prompt: default_negative_prompt(),
            num_inference_steps: default_num_inference_steps(),
            guidance_scale: default_guidance_scale(),
            timeout_secs: default_image_timeout_secs(),
        }
    }
}

impl ImageSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The complete site.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub patpass: PatPassSection,
    #[serde(default)]
    pub mail: MailSection,
    #[serde(default)]
    pub image: ImageSection,
}

impl SiteToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse site.toml")
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize site.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Return human-readable problems; an empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !(0.0..=1.0).contains(&self.patpass.success_rate) {
            problems.push(format!(
                "Invalid success_rate {}: must be between 0.0 and 1.0",
                self.patpass.success_rate
            ));
        }
        if self.patpass.commerce_code.trim().is_empty() {
            problems.push("commerce_code must not be empty".to_string());
        }
        for (field, value) in [
            ("public_base_url", &self.patpass.public_base_url),
            ("gateway_base_url", &self.patpass.gateway_base_url),
            ("model_url", &self.image.model_url),
        ] {
            if url::Url::parse(value).is_err() {
                problems.push(format!("Invalid {} '{}': must be an absolute URL", field, value));
            }
        }
        for (field, value) in [
            ("return_path", &self.patpass.return_path),
            ("landing_path", &self.patpass.landing_path),
        ] {
            if !value.starts_with('/') {
                problems.push(format!("Invalid {} '{}': must start with '/'", field, value));
            }
        }
        if self.image.timeout_secs == 0 {
            problems.push("image.timeout_secs must be at least 1".to_string());
        }
        if self.mail.rate_limit == 0 {
            problems.push("mail.rate_limit must be at least 1".to_string());
        }

        problems
    }
}

/// SMTP credentials and recipients resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct MailCredentials {
    pub user: String,
    pub key: String,
    pub recipients: [String; 2],
}

impl MailCredentials {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`; `None` if any value is missing or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Some(Self {
            user: get(ENV_SMTP_USER)?,
            key: get(ENV_SMTP_KEY)?,
            recipients: [get(ENV_RECIPIENT_1)?, get(ENV_RECIPIENT_2)?],
        })
    }
}

/// Bearer token for the image API, if configured.
pub fn image_token_from_env() -> Option<String> {
    std::env::var(ENV_IMAGE_TOKEN)
        .ok()
        .filter(|t| !t.trim().is_empty())
}

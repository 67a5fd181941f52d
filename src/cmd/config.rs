//! Configuration view and validation commands: `vivo-site config`.

use std::path::Path;

use anyhow::{Context, Result};

use super::super::ConfigCommands;
use vivo_site::site_config::{
    ENV_IMAGE_TOKEN, ENV_RECIPIENT_1, ENV_RECIPIENT_2, ENV_SMTP_KEY, ENV_SMTP_USER, SiteToml,
};

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Site Configuration");
            println!("==================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No site.toml found at {}", config_path.display());
                println!("Using default configuration:");
            }
            println!();

            let toml = SiteToml::load_or_default(config_path)?;
            let rendered =
                toml::to_string_pretty(&toml).context("Failed to serialize configuration")?;
            println!("{}", rendered);

            println!("Secrets (from environment):");
            for name in [
                ENV_SMTP_USER,
                ENV_SMTP_KEY,
                ENV_RECIPIENT_1,
                ENV_RECIPIENT_2,
                ENV_IMAGE_TOKEN,
            ] {
                let state = match std::env::var(name) {
                    Ok(v) if !v.trim().is_empty() => "set",
                    _ => "not set",
                };
                println!("  {} = {}", name, state);
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let toml = SiteToml::load_or_default(config_path)?;
            let problems = toml.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("Config already exists at {}", config_path.display());
                return Ok(());
            }
            SiteToml::default().save(config_path)?;
            println!("Created default configuration at {}", config_path.display());
        }
    }

    Ok(())
}

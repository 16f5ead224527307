//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use tvm_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync_url": config.sync_url,
                    "status_warning_days": config.status_warning_days,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!(
                "  sync_url:            {}",
                config.sync_url.as_deref().unwrap_or("(not set)")
            );
            println!("  status_warning_days: {}", config.status_warning_days);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, output: &Output) -> Result<()> {
    update(&Config::config_file_path(), key, value)?;
    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Load the config file at `path`, change one key and write it back
fn update(path: &Path, key: &str, value: &str) -> Result<Config> {
    let mut config = Config::load_from_path(path).context("Failed to load configuration")?;
    apply(&mut config, key, value)?;
    config
        .save_to_path(path)
        .context("Failed to save configuration")?;
    Ok(config)
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "sync_url" => {
            config.sync_url = (!unset).then(|| value.to_string());
        }
        "status_warning_days" => {
            config.status_warning_days = value
                .parse()
                .context("Invalid value for status_warning_days. Use a number of days.")?;
        }
        "log_file" => {
            config.log_file = (!unset).then(|| value.into());
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, sync_url, status_warning_days, log_file",
                key
            );
        }
    }

    Ok(())
}

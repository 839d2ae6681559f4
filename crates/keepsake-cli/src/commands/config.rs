//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use keepsake_core::{Compression, Config, MimePolicy};

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str = "data_dir, max_size_mb, allowed_mime_regex, fetch_timeout_secs, \
                    max_redirects, default_compression, user_agent, created_by, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir.display().to_string(),
                    "max_size_mb": config.max_size_mb,
                    "allowed_mime_regex": config.allowed_mime_regex,
                    "fetch_timeout_secs": config.fetch_timeout_secs,
                    "max_redirects": config.max_redirects,
                    "default_compression": config.default_compression.as_str(),
                    "user_agent": config.user_agent,
                    "created_by": config.created_by,
                    "log_file": config.log_file.as_ref().map(|p| p.display().to_string())
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!("  max_size_mb:         {}", config.max_size_mb);
            println!("  allowed_mime_regex:  {}", config.allowed_mime_regex);
            println!("  fetch_timeout_secs:  {}", config.fetch_timeout_secs);
            println!("  max_redirects:       {}", config.max_redirects);
            println!("  default_compression: {}", config.default_compression);
            println!("  user_agent:          {}", config.user_agent);
            println!("  created_by:          {}", config.created_by);
            println!(
                "  log_file:            {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
            println!("Database:    {}", config.sqlite_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Validate `value` and assign it to `key`
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "max_size_mb" => {
            config.max_size_mb = value
                .parse()
                .context("Invalid value for max_size_mb. Use a whole number of megabytes.")?;
        }
        "allowed_mime_regex" => {
            MimePolicy::new(value)
                .with_context(|| format!("Invalid regular expression: {}", value))?;
            config.allowed_mime_regex = value.to_string();
        }
        "fetch_timeout_secs" => {
            config.fetch_timeout_secs = value
                .parse()
                .context("Invalid value for fetch_timeout_secs. Use a whole number of seconds.")?;
        }
        "max_redirects" => {
            config.max_redirects = value
                .parse()
                .context("Invalid value for max_redirects. Use a whole number.")?;
        }
        "default_compression" => {
            config.default_compression = value.parse::<Compression>()?;
        }
        "user_agent" => {
            config.user_agent = value.to_string();
        }
        "created_by" => {
            config.created_by = value.to_string();
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

//! `controlgate config`: configuration management commands.

use super::{load_config, load_store};
use controlgate_config::AppConfig;
use std::path::Path;

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.contracts_dir.is_dir() {
                warnings.push(format!(
                    "Contracts directory {} does not exist",
                    config.contracts_dir.display()
                ));
            } else if load_store(&config).0.is_empty() {
                warnings.push("No contracts loaded; run `controlgate validate` for details".into());
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Contracts: {}", config.contracts_dir.display());
            println!("   Label:     {}", config.product_label);
            println!(
                "   Limits:    {} bytes, depth {}, {} steps, {} elements",
                config.limits.max_expression_len,
                config.limits.max_depth,
                config.limits.max_steps,
                config.limits.max_collection_len
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);
    println!("{}", path.display());
    Ok(())
}

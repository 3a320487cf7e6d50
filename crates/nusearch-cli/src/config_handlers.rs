//! Handlers for `nusearch config {path,show,get,init}`.

use std::path::PathBuf;

use nusearch_core::{Error, Result};

use crate::cli::ConfigAction;
use crate::config::NusearchConfig;

/// Handle a config subcommand.
///
/// Takes the raw `--config` path because `path` and `init` must work before
/// any config file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Show => {
            let config = NusearchConfig::load(config_path)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Get { key } => {
            let config = NusearchConfig::load(config_path)?;
            println!("{}", config_value(&config, &key)?);
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            let path = init_config_file(file.as_deref(), force)?;
            println!("Config file created at {}", path.display());
            Ok(())
        }
    }
}

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    let path = NusearchConfig::resolve_config_path(config_path).ok_or_else(|| {
        Error::config("Could not determine config directory for this platform")
    })?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(file does not exist; run `nusearch config init` to create it)");
    }
    Ok(())
}

/// Render one dotted key of the effective configuration.
pub fn config_value(config: &NusearchConfig, key: &str) -> Result<String> {
    let root = toml::Value::try_from(config).map_err(|e| Error::config(e.to_string()))?;
    let value = key
        .split('.')
        .try_fold(&root, |current, part| current.as_table()?.get(part))
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))?;

    Ok(match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Write the default configuration to `file` (or the XDG path).
pub fn init_config_file(file: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => NusearchConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let rendered = NusearchConfig::default().to_toml_string()?;
    std::fs::write(&path, rendered).map_err(|e| Error::io_with_path(e, &path))?;
    Ok(path)
}

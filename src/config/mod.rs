mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;
    resolve_paths(&mut config, path.parent());

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./trackforge.toml",
        "~/.config/trackforge/config.toml",
        "/etc/trackforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Expand `~` and make relative default paths relative to the config file.
fn resolve_paths(config: &mut Config, base: Option<&Path>) {
    for slot in [&mut config.defaults.policy, &mut config.defaults.snapshots] {
        if let Some(path) = slot.as_mut() {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let expanded = Path::new(&expanded);
            *path = match base {
                Some(dir) if expanded.is_relative() => dir.join(expanded),
                _ => expanded.to_path_buf(),
            };
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let suffix = &config.processing.backup_suffix;
    if suffix.is_empty() {
        anyhow::bail!("processing.backup_suffix cannot be empty");
    }
    if suffix.contains('/') || suffix.contains('\\') {
        anyhow::bail!("processing.backup_suffix must not contain path separators: {:?}", suffix);
    }

    if let Some(filter) = &config.logging.filter {
        if filter.trim().is_empty() {
            anyhow::bail!("logging.filter cannot be empty");
        }
    }

    for (key, path) in [
        ("defaults.policy", &config.defaults.policy),
        ("defaults.snapshots", &config.defaults.snapshots),
    ] {
        if let Some(path) = path {
            if path.as_os_str().is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
        }
    }

    Ok(())
}

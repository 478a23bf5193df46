use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use trackforge_workflow::DEFAULT_BACKUP_SUFFIX;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Files used when a command does not name them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Policy file for `plan` when none is given on the command line
    #[serde(default)]
    pub policy: Option<PathBuf>,

    /// JSON snapshot file describing the files to plan against
    #[serde(default)]
    pub snapshots: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Never hand plans to executors
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Appended to the file name for the pre-modification backup
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

fn default_dry_run() -> bool {
    true
}

fn default_backup_suffix() -> String {
    DEFAULT_BACKUP_SUFFIX.to_string()
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            dry_run: default_dry_run(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter directive, used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

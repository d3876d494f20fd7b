use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;

use crate::logging;

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// The path to the TLS certificate chain (PEM)
    pub cert: String,

    /// The path to the TLS private key (PKCS8 PEM)
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The log level to use, this is a tracing env filter
    pub level: String,

    /// What logging mode we should use
    pub mode: logging::Mode,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            mode: logging::Mode::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// The database URL to use
    pub uri: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432".to_string(),
        }
    }
}

/// Find a config file on disk, either by its exact path or by trying the
/// formats the file source understands.
fn locate(path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    if path.exists() {
        return Some(path.to_path_buf());
    }

    for ext in ["toml", "yaml", "yml", "json"] {
        let candidate = path.with_extension(ext);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

/// Parse the application config.
///
/// A config file set via `<PREFIX>_CONFIG_FILE` must exist; the default file
/// is allowed to be absent. Environment variables (prefixed, `__`-separated
/// per nesting level) override values from the file.
pub fn parse<C: DeserializeOwned>(
    env_prefix: &str,
    default_config_file: Option<String>,
) -> anyhow::Result<(C, Option<String>)> {
    let explicit = std::env::var(format!("{env_prefix}_CONFIG_FILE")).ok();
    let file_required = explicit.is_some();

    let mut builder = Config::builder();
    let mut config_path = None;

    if let Some(path) = explicit.or(default_config_file) {
        match locate(&path) {
            Some(found) => {
                builder = builder.add_source(File::from(found.clone()));
                config_path = Some(
                    std::fs::canonicalize(&found)
                        .unwrap_or(found)
                        .display()
                        .to_string(),
                );
            }
            None if file_required => anyhow::bail!("config file not found: {path}"),
            None => tracing::debug!(file = %path, "no config file found, using defaults"),
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?.try_deserialize()?;

    Ok((config, config_path))
}

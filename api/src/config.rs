use std::net::SocketAddr;

use anyhow::Result;
use common::config::{DatabaseConfig, LoggingConfig, TlsConfig};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
/// The API is the backend for the Happenings service
pub struct AppConfig {
    /// The path to the config file
    pub config_file: Option<String>,

    /// Name of this instance
    pub name: String,

    /// The logging config
    pub logging: LoggingConfig,

    /// API config
    pub api: ApiConfig,

    /// Database config
    pub database: DatabaseConfig,

    /// JWT config
    pub jwt: JwtConfig,

    /// Extractor service config
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address for the API
    pub bind_address: SocketAddr,

    /// If we should use TLS for the API server
    pub tls: Option<TlsConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "[::]:4000".parse().expect("failed to parse bind address"),
            tls: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// JWT secret
    pub secret: String,

    /// JWT issuer
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "happenings".to_string(),
            secret: "happenings".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// The URL of the extraction service
    pub url: String,

    /// How long to wait for one extraction, in seconds. Headless renders can
    /// take a while.
    pub timeout: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/extract".to_string(),
            timeout: 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: Some("config".to_string()),
            name: "happenings-api".to_string(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig {
                uri: "postgres://root@localhost:5432/happenings_dev".to_string(),
            },
            jwt: JwtConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse() -> Result<Self> {
        let (mut config, config_file) =
            common::config::parse::<Self>("HAPN", Self::default().config_file)?;

        config.config_file = config_file;

        Ok(config)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application, and loads the OIDC clients file.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `OIDC_CLIENTS_FILE` | JSON file with client configurations and auth filters | Required |
//! | `TOKEN_CACHE_CAPACITY` | Maximum number of cached validation results | `10000` |
//! | `HTTP_TIMEOUT_SECS` | Timeout for calls to OpenID providers | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Clients File
//!
//! ```json
//! {
//!   "clients": [
//!     {
//!       "id": "rp1",
//!       "validationMethod": "introspect",
//!       "validationEndpointUrl": "https://op.example.com/introspect",
//!       "clientId": "rp1",
//!       "clientSecret": "...",
//!       "issuerIdentifier": "https://op.example.com"
//!     }
//!   ],
//!   "authFilters": []
//! }
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::cache::DEFAULT_CACHE_CAPACITY;
use crate::auth::transport::DEFAULT_HTTP_TIMEOUT;
use crate::auth::{AuthFilter, ClientConfig, ConditionFilter};

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the clients file path.
pub const OIDC_CLIENTS_FILE_ENV: &str = "OIDC_CLIENTS_FILE";

/// Environment variable name for the result cache capacity.
pub const TOKEN_CACHE_CAPACITY_ENV: &str = "TOKEN_CACHE_CAPACITY";

/// Environment variable name for the outbound HTTP timeout.
pub const HTTP_TIMEOUT_SECS_ENV: &str = "HTTP_TIMEOUT_SECS";

/// Environment variable name for the log format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    MissingEnv(&'static str),
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid client configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    pub clients_file: PathBuf,
    pub cache_capacity: usize,
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let clients_file = lookup(OIDC_CLIENTS_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv(OIDC_CLIENTS_FILE_ENV))?;

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            host: lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_var(&lookup, PORT_ENV)?.unwrap_or(DEFAULT_PORT),
            clients_file,
            cache_capacity: parse_var(&lookup, TOKEN_CACHE_CAPACITY_ENV)?.unwrap_or(DEFAULT_CACHE_CAPACITY),
            http_timeout: parse_var(&lookup, HTTP_TIMEOUT_SECS_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
            log_format,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

/// Contents of the clients file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientsFile {
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub auth_filters: Vec<ConditionFilter>,
}

impl ClientsFile {
    /// Filters as trait objects for the registry.
    pub fn filters(&self) -> Vec<Arc<dyn AuthFilter>> {
        self.auth_filters
            .iter()
            .cloned()
            .map(|f| Arc::new(f) as Arc<dyn AuthFilter>)
            .collect()
    }
}

/// Load and check the clients file.
pub fn load_clients_file(path: &Path) -> Result<ClientsFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ClientsFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = std::collections::HashSet::new();
    for client in &file.clients {
        if client.id.is_empty() {
            return Err(ConfigError::Invalid("client without id".to_string()));
        }
        if !seen.insert(client.id.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate client id {}", client.id)));
        }
        if let Some(filter) = client.auth_filter_ref.as_deref() {
            if !file.auth_filters.iter().any(|f| f.id == filter) {
                return Err(ConfigError::Invalid(format!(
                    "client {} references unknown auth filter {filter}",
                    client.id
                )));
            }
        }
    }

    Ok(file)
}

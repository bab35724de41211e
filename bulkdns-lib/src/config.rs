//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and
//! `BULKDNS_*` environment variables, and merging them with proper
//! precedence rules.

use crate::error::BulkDnsError;
use crate::pool::ResolverEndpoint;
use crate::types::Protocol;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Resolver selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolvers: Option<ResolversConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Default concurrency level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Per-query timeout, e.g. "5s" or "500ms"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// "udp" or "tcp"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Emit JSON lines instead of text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

/// Where resolvers come from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolversConfig {
    /// Explicit resolver addresses; when set, discovery is skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,

    /// Alternate resolv.conf to discover from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolv_conf: Option<PathBuf>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// The file is validated after parsing, so a returned config is safe
    /// to apply.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, BulkDnsError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BulkDnsError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            BulkDnsError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            BulkDnsError::config(format!(
                "Failed to parse TOML configuration '{}': {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is the weakest, then the global file in `$HOME`, then a
    /// local file in the working directory. A file that exists but fails
    /// to parse or validate is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, BulkDnsError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                let precedence = if i == loaded_files.len() - 1 {
                    "highest"
                } else {
                    "overridden"
                };
                tracing::info!(path = %path.display(), precedence, "config file loaded");
            }
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./bulkdns.toml", "./.bulkdns.toml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Some(path.to_path_buf());
            }
        }

        None
    }

    /// Get the global configuration file path in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let path = Path::new(&home).join(".bulkdns.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("bulkdns").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(mut lower_defaults), Some(higher_defaults)) => {
                    if higher_defaults.concurrency.is_some() {
                        lower_defaults.concurrency = higher_defaults.concurrency;
                    }
                    if higher_defaults.timeout.is_some() {
                        lower_defaults.timeout = higher_defaults.timeout;
                    }
                    if higher_defaults.protocol.is_some() {
                        lower_defaults.protocol = higher_defaults.protocol;
                    }
                    if higher_defaults.json.is_some() {
                        lower_defaults.json = higher_defaults.json;
                    }
                    Some(lower_defaults)
                }
                (None, Some(higher_defaults)) => Some(higher_defaults),
                (Some(lower_defaults), None) => Some(lower_defaults),
                (None, None) => None,
            },
            resolvers: match (lower.resolvers, higher.resolvers) {
                (Some(mut lower_resolvers), Some(higher_resolvers)) => {
                    if higher_resolvers.servers.is_some() {
                        lower_resolvers.servers = higher_resolvers.servers;
                    }
                    if higher_resolvers.resolv_conf.is_some() {
                        lower_resolvers.resolv_conf = higher_resolvers.resolv_conf;
                    }
                    Some(lower_resolvers)
                }
                (None, Some(higher_resolvers)) => Some(higher_resolvers),
                (Some(lower_resolvers), None) => Some(lower_resolvers),
                (None, None) => None,
            },
        }
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), BulkDnsError> {
        if let Some(defaults) = &config.defaults {
            if defaults.concurrency == Some(0) {
                return Err(BulkDnsError::config("Concurrency must be at least 1"));
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(BulkDnsError::config(format!(
                        "Invalid timeout format '{}'. Use format like '500ms', '5s', '1m'",
                        timeout_str
                    )));
                }
            }

            if let Some(protocol) = &defaults.protocol {
                protocol.parse::<Protocol>()?;
            }
        }

        if let Some(resolvers) = &config.resolvers {
            if let Some(servers) = &resolvers.servers {
                if servers.is_empty() {
                    return Err(BulkDnsError::config(
                        "'servers' must list at least one resolver when present",
                    ));
                }
                for server in servers {
                    ResolverEndpoint::parse(server)?;
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `BULKDNS_*`
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub timeout: Option<String>,
    pub protocol: Option<Protocol>,
    pub resolvers: Option<Vec<String>>,
    pub resolv_conf: Option<PathBuf>,
    pub json: Option<bool>,
    pub config: Option<String>,
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Build an [`EnvConfig`] from an arbitrary variable lookup.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    if let Some(val) = lookup("BULKDNS_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if concurrency > 0 => {
                tracing::debug!(concurrency, "using BULKDNS_CONCURRENCY");
                env_config.concurrency = Some(concurrency);
            }
            _ => tracing::warn!(value = %val, "ignoring invalid BULKDNS_CONCURRENCY, must be at least 1"),
        }
    }

    if let Some(timeout_str) = lookup("BULKDNS_TIMEOUT") {
        if parse_timeout_string(&timeout_str).is_some() {
            tracing::debug!(timeout = %timeout_str, "using BULKDNS_TIMEOUT");
            env_config.timeout = Some(timeout_str);
        } else {
            tracing::warn!(
                value = %timeout_str,
                "ignoring invalid BULKDNS_TIMEOUT, use format like '500ms', '5s', '1m'"
            );
        }
    }

    if let Some(val) = lookup("BULKDNS_PROTOCOL") {
        match val.parse::<Protocol>() {
            Ok(protocol) => {
                tracing::debug!(protocol = %protocol, "using BULKDNS_PROTOCOL");
                env_config.protocol = Some(protocol);
            }
            Err(_) => tracing::warn!(value = %val, "ignoring invalid BULKDNS_PROTOCOL, use udp or tcp"),
        }
    }

    // Comma-separated resolver list
    if let Some(list) = lookup("BULKDNS_RESOLVERS") {
        let resolvers: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        match resolvers.iter().find(|r| ResolverEndpoint::parse(r).is_err()) {
            _ if resolvers.is_empty() => {}
            Some(bad) => tracing::warn!(value = %bad, "ignoring BULKDNS_RESOLVERS, invalid resolver address"),
            None => {
                tracing::debug!(resolvers = %list, "using BULKDNS_RESOLVERS");
                env_config.resolvers = Some(resolvers);
            }
        }
    }

    if let Some(path) = lookup("BULKDNS_RESOLV_CONF") {
        if !path.trim().is_empty() {
            tracing::debug!(path = %path, "using BULKDNS_RESOLV_CONF");
            env_config.resolv_conf = Some(PathBuf::from(path));
        }
    }

    if let Some(val) = lookup("BULKDNS_JSON") {
        match parse_bool(&val) {
            Some(json) => env_config.json = Some(json),
            None => tracing::warn!(value = %val, "ignoring invalid BULKDNS_JSON, use true/false"),
        }
    }

    if let Some(config_path) = lookup("BULKDNS_CONFIG") {
        if !config_path.trim().is_empty() {
            tracing::debug!(path = %config_path, "using BULKDNS_CONFIG");
            env_config.config = Some(config_path);
        }
    }

    env_config
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a timeout string like "500ms", "5s" or "2m".
///
/// A bare number is taken as seconds. Zero is rejected since every query
/// would time out before it is sent.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let duration = if let Some(ms) = timeout_str.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        timeout_str.parse::<u64>().ok().map(Duration::from_secs)
    }?;

    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

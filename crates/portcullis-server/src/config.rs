//! Gateway configuration.
//!
//! Loaded once at startup from a TOML file plus `PORTCULLIS`-prefixed
//! environment overrides; every inconsistency is fatal before serving
//! begins.

use portcullis_auth::{AclRule, AuthConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub acl: AclConfig,
}

impl AppConfig {
    /// Cross-field validation; the returned message is shown to the operator
    /// and aborts startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }

        self.auth.validate().map_err(|e| e.to_string())?;

        for (index, rule) in self.acl.rules.iter().enumerate() {
            if rule.id.is_empty() {
                return Err(format!("acl.rules[{index}] has an empty id"));
            }
            if rule.roles.is_empty() {
                return Err(format!("acl rule '{}' has no roles", rule.id));
            }
            if self.acl.rules[..index].iter().any(|r| r.id == rule.id) {
                return Err(format!("duplicate acl rule id '{}'", rule.id));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(format!("unknown logging.level '{}'", self.logging.level));
        }

        Ok(())
    }

    /// The socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        SocketAddr::new(ip, self.server.port)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// ACL rule set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    pub rules: Vec<AclRule>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    /// Default configuration file looked up in the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "portcullis.toml";

    /// Load and validate configuration.
    ///
    /// Sources, later wins: the TOML file (required when a path is given
    /// explicitly, optional for the default path), then environment variable
    /// overrides, e.g. `PORTCULLIS__SERVER__PORT=9090`.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::new(p, FileFormat::Toml).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("PORTCULLIS")
                .try_parsing(true)
                .separator("__"),
        );

        let cfg: AppConfig = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;

        cfg.validate()?;
        Ok(cfg)
    }
}

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL of the upstream GraphQL server. Required; may also be
    /// given as the first positional argument.
    #[serde(default)]
    pub upstream_server: String,
    #[serde(default = "default_gql_accept_header")]
    pub gql_accept_header: String,
    #[serde(default = "default_healthcheck_path")]
    pub healthcheck_path: String,
    #[serde(default)]
    pub skip_tls_verify: bool,
    /// Upstream request timeout, seconds.
    #[serde(default = "default_graphql_timeout")]
    pub graphql_timeout: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8888
}
fn default_gql_accept_header() -> String {
    "application/graphql-response+json;charset=utf-8, application/json;charset=utf-8".into()
}
fn default_healthcheck_path() -> String {
    "/health".into()
}
fn default_graphql_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream_server: String::new(),
            gql_accept_header: default_gql_accept_header(),
            healthcheck_path: default_healthcheck_path(),
            skip_tls_verify: false,
            graphql_timeout: default_graphql_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be > 0".into());
        }
        if self.upstream_server.is_empty() {
            return Err("no upstream server specified".into());
        }
        url::Url::parse(&self.upstream_server)
            .map_err(|e| format!("invalid upstream server url: {e}"))?;
        if self.graphql_timeout == 0 {
            return Err("graphql_timeout must be > 0".into());
        }
        if !self.healthcheck_path.starts_with('/') {
            return Err("healthcheck_path must start with '/'".into());
        }
        let level = self.log_level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("log_level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.graphql_timeout)
    }

    /// Upstream base with any trailing slash removed, so paths can be
    /// appended verbatim.
    pub fn upstream_base(&self) -> &str {
        self.upstream_server.trim_end_matches('/')
    }
}

pub mod loader {
    use super::GatewayConfig;
    use config::{Config, Environment};

    /// Loads configuration from `RTG_*` environment variables, e.g.
    /// `RTG_PORT=9090`. A positional upstream argument takes precedence
    /// over `RTG_UPSTREAM_SERVER`.
    pub fn load_config(positional_upstream: Option<&str>) -> Result<GatewayConfig, String> {
        let cfg = Config::builder()
            .add_source(Environment::with_prefix("RTG").try_parsing(true))
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: GatewayConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        if let Some(upstream) = positional_upstream {
            merged.upstream_server = upstream.to_string();
        }
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_upstream() -> GatewayConfig {
        GatewayConfig {
            upstream_server: "http://upstream.example:8080".into(),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.healthcheck_path, "/health");
        assert_eq!(config.graphql_timeout, 30);
        assert_eq!(config.log_level, "info");
        assert!(!config.skip_tls_verify);
        assert!(config.gql_accept_header.contains("application/graphql-response+json"));
    }

    #[test]
    fn test_missing_upstream_is_invalid() {
        assert!(GatewayConfig::default().validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(with_upstream().validate().is_ok());
    }

    #[test]
    fn test_invalid_upstream_url() {
        let mut config = with_upstream();
        config.upstream_server = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = with_upstream();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_healthcheck_path_must_be_absolute() {
        let mut config = with_upstream();
        config.healthcheck_path = "health".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upstream_base_trims_trailing_slash() {
        let mut config = with_upstream();
        config.upstream_server = "http://upstream.example:8080/".into();
        assert_eq!(config.upstream_base(), "http://upstream.example:8080");
    }
}

use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::{path::Path, time::Duration};

pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub refresh: RefreshConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverloadPolicy {
    /// answer with a "server busy" envelope and close the connection
    #[default]
    Reject,
    /// stop accepting until a queue slot frees up
    Block,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub workers: usize,
    pub queue_capacity: usize,
    pub overload: OverloadPolicy,
    pub poll_interval_ms: u64,
    pub write_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    /// longest accepted request line, newline excluded
    pub max_line_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes.max(1)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5000,
            workers: 10,
            queue_capacity: 64,
            overload: OverloadPolicy::Reject,
            poll_interval_ms: 250,
            write_timeout_secs: 30,
            shutdown_grace_secs: 10,
            max_line_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_base_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub market: String,
    pub timeout_secs: u64,
    pub artist_search_limit: u32,
}

impl CatalogConfig {
    /// client id and secret, taken from the config file or the environment
    pub fn client_credentials(&self) -> anyhow::Result<(String, String)> {
        let id = Self::value_or_env(&self.client_id, CLIENT_ID_ENV)?;
        let secret = Self::value_or_env(&self.client_secret, CLIENT_SECRET_ENV)?;
        Ok((id, secret))
    }

    fn value_or_env(value: &Option<String>, var: &str) -> anyhow::Result<String> {
        match value.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{var} is not set and the config does not provide it")),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            client_id: None,
            client_secret: None,
            market: "US".to_string(),
            timeout_secs: 10,
            artist_search_limit: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub retry_secs: u64,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs.max(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 55 * 60,
            retry_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[server]
bind_addr = "0.0.0.0"
port = 7000
workers = 4
queue_capacity = 8
overload = "block"

[catalog]
client_id = "my-id"
client_secret = "my-secret"
market = "DE"

[refresh]
interval_secs = 600
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.version, 1);

        assert_eq!(cfg.server.addr(), "0.0.0.0:7000");
        assert_eq!(cfg.server.workers, 4);
        assert_eq!(cfg.server.queue_capacity, 8);
        assert_eq!(cfg.server.overload, OverloadPolicy::Block);
        // untouched fields keep their defaults
        assert_eq!(cfg.server.poll_interval_ms, 250);

        assert_eq!(cfg.catalog.market, "DE");
        assert_eq!(
            cfg.catalog.client_credentials()?,
            ("my-id".to_string(), "my-secret".to_string())
        );
        assert_eq!(cfg.catalog.api_base_url, "https://api.spotify.com/v1");

        assert_eq!(cfg.refresh.interval(), Duration::from_secs(600));
        assert_eq!(cfg.refresh.retry(), Duration::from_secs(60));

        Ok(())
    }

    #[test]
    fn test_empty_config_uses_defaults() -> anyhow::Result<()> {
        let cfg: Config = toml::from_str("")?;

        assert_eq!(cfg.server.addr(), "127.0.0.1:5000");
        assert_eq!(cfg.server.workers, 10);
        assert_eq!(cfg.server.overload, OverloadPolicy::Reject);
        assert_eq!(cfg.catalog.market, "US");
        assert_eq!(cfg.catalog.artist_search_limit, 3);
        assert_eq!(cfg.refresh.interval(), Duration::from_secs(3300));
        assert_eq!(cfg.server.max_line_bytes(), 64 * 1024);

        Ok(())
    }

    #[test]
    fn test_zero_durations_are_clamped() -> anyhow::Result<()> {
        let toml_str = r#"
[server]
poll_interval_ms = 0
max_line_bytes = 0

[refresh]
interval_secs = 0
retry_secs = 0
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.refresh.interval(), Duration::from_secs(1));
        assert_eq!(cfg.refresh.retry(), Duration::from_secs(1));
        assert_eq!(cfg.server.poll_interval(), Duration::from_millis(1));
        assert_eq!(cfg.server.max_line_bytes(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_overload_policy_is_rejected() {
        let toml_str = r#"
[server]
overload = "drop"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "version = 2\n[server]\nport = 6001")?;

        let cfg = Config::load(file.path())?;

        assert_eq!(cfg.version, 2);
        assert_eq!(cfg.server.port, 6001);

        Ok(())
    }

    #[test]
    fn test_example_config_parses() -> anyhow::Result<()> {
        let cfg: Config = toml::from_str(include_str!("../config.example.toml"))?;

        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.server.addr(), "127.0.0.1:5000");
        assert_eq!(cfg.catalog.client_id, None);
        assert_eq!(cfg.server.max_line_bytes(), 65536);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}

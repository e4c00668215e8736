//! Bridge configuration.
//!
//! Configuration can be loaded from:
//! - A TOML configuration file
//! - Environment variables (`LOUNGE_*`, `GOTIFY_*`) for missing keys
//! - Command line flags, applied on top by `main`

use anyhow::{ensure, Context, Result};
use lounge_core::{BridgeSettings, GotifySettings};
use lounge_protocol::Credentials;
use lounge_transport::{Endpoint, SessionConfig, WebSocketConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Paths searched when no `--config` is given.
const CONFIG_PATHS: [&str; 3] = [
    "lounge-bridge.toml",
    "/etc/lounge-bridge/config.toml",
    "~/.config/lounge-bridge/config.toml",
];

/// Bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat server connection.
    #[serde(default)]
    pub lounge: LoungeConfig,

    /// Notification sink.
    #[serde(default)]
    pub gotify: GotifyConfig,

    /// Session timing.
    #[serde(default)]
    pub session: SessionTimingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Chat server configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoungeConfig {
    /// `host[:port]` of the server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Use `https` / `wss`.
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Login name.
    #[serde(default = "default_username")]
    pub username: String,

    /// Login password.
    #[serde(default = "default_password")]
    pub password: String,
}

/// Gotify configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GotifyConfig {
    /// Base URL of the Gotify server.
    #[serde(default = "default_gotify_url")]
    pub url: String,

    /// Application token.
    #[serde(default = "default_gotify_key")]
    pub key: String,
}

/// Session timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimingConfig {
    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_ms: u64,

    /// Dial timeout in milliseconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,

    /// Close handshake grace period in milliseconds.
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn default_host() -> String {
    env_or("LOUNGE_HOST", "")
}

fn default_username() -> String {
    env_or("LOUNGE_USERNAME", "")
}

fn default_password() -> String {
    env_or("LOUNGE_PASSWORD", "")
}

fn default_gotify_url() -> String {
    env_or("GOTIFY_URL", "")
}

fn default_gotify_key() -> String {
    env_or("GOTIFY_KEY", "")
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    25_000
}

fn default_handshake_timeout() -> u64 {
    45_000
}

fn default_close_grace() -> u64 {
    1_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for LoungeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            secure: true,
            username: default_username(),
            password: default_password(),
        }
    }
}

impl Default for GotifyConfig {
    fn default() -> Self {
        Self {
            url: default_gotify_url(),
            key: default_gotify_key(),
        }
    }
}

impl Default for SessionTimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: default_heartbeat_interval(),
            handshake_timeout_ms: default_handshake_timeout(),
            close_grace_ms: default_close_grace(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for LoungeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoungeConfig")
            .field("host", &self.host)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for GotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GotifyConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load configuration from `path`, the first default path that exists,
    /// or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for path in &CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check the configuration and turn it into bridge settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or a duration is zero.
    pub fn into_settings(self) -> Result<BridgeSettings> {
        ensure!(!self.lounge.host.is_empty(), "lounge.host is not set");
        ensure!(!self.gotify.url.is_empty(), "gotify.url is not set");
        ensure!(self.session.heartbeat_ms > 0, "session.heartbeat_ms must be positive");
        ensure!(
            self.session.handshake_timeout_ms > 0,
            "session.handshake_timeout_ms must be positive"
        );

        let endpoint = if self.lounge.secure {
            Endpoint::new(self.lounge.host)
        } else {
            Endpoint::insecure(self.lounge.host)
        };

        Ok(BridgeSettings {
            endpoint,
            credentials: Credentials::new(self.lounge.username, self.lounge.password),
            gotify: GotifySettings {
                url: self.gotify.url,
                key: self.gotify.key,
            },
            websocket: WebSocketConfig {
                handshake_timeout: Duration::from_millis(self.session.handshake_timeout_ms),
            },
            session: SessionConfig {
                heartbeat_interval: Duration::from_millis(self.session.heartbeat_ms),
                close_grace: Duration::from_millis(self.session.close_grace_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [lounge]
        host = "chat.example.org"
        username = "bridge"
        password = "secret"

        [gotify]
        url = "https://push.example.org"
        key = "app-token"

        [session]
        heartbeat_ms = 10000

        [metrics]
        enabled = true
        port = 9300
    "#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.lounge.secure);
        assert_eq!(config.session.heartbeat_ms, 25_000);
        assert_eq!(config.session.handshake_timeout_ms, 45_000);
        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(FULL).unwrap();
        assert_eq!(config.lounge.host, "chat.example.org");
        assert_eq!(config.lounge.username, "bridge");
        assert_eq!(config.gotify.key, "app-token");
        assert_eq!(config.session.heartbeat_ms, 10_000);
        assert_eq!(config.session.close_grace_ms, 1_000);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9300);
    }

    #[test]
    fn test_into_settings() {
        let config: Config = toml::from_str(FULL).unwrap();
        let settings = config.into_settings().unwrap();

        assert_eq!(settings.endpoint.host(), "chat.example.org");
        assert!(settings.endpoint.is_secure());
        assert_eq!(settings.credentials, Credentials::new("bridge", "secret"));
        assert_eq!(settings.gotify.url, "https://push.example.org");
        assert_eq!(settings.session.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(settings.websocket.handshake_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_insecure_endpoint() {
        let mut config: Config = toml::from_str(FULL).unwrap();
        config.lounge.secure = false;
        let settings = config.into_settings().unwrap();
        assert!(!settings.endpoint.is_secure());
    }

    #[test]
    fn test_missing_host_rejected() {
        let mut config: Config = toml::from_str(FULL).unwrap();
        config.lounge.host.clear();
        let err = config.into_settings().unwrap_err();
        assert!(err.to_string().contains("lounge.host"));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let mut config: Config = toml::from_str(FULL).unwrap();
        config.session.heartbeat_ms = 0;
        assert!(config.into_settings().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config: Config = toml::from_str(FULL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("app-token"));
    }

    #[test]
    fn test_load_explicit_path() {
        let path = std::env::temp_dir().join(format!("lounge-bridge-{}.toml", std::process::id()));
        std::fs::write(&path, FULL).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.lounge.host, "chat.example.org");

        std::fs::remove_file(&path).unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}

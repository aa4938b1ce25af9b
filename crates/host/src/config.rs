//! Configuration system for hueport
//!
//! Reads config from ~/.config/hueport/config.toml

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use hueport_protocol::Envelope;

use crate::relay::UnknownTagPolicy;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ws_port: u16,
    pub http_port: u16,
    pub bind: String,
    /// Directory holding the compiled application bundle
    pub app_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_port: 9310,
            http_port: 8090,
            bind: "127.0.0.1".to_string(),
            app_dir: PathBuf::from("./app"),
        }
    }
}

/// Which document store backs the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// No store; outbound messages are logged and dropped
    #[default]
    None,
    Memory,
    File,
    Http,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root directory for the file backend
    pub root: Option<PathBuf>,
    /// Base URL for the http backend
    pub url: Option<String>,
    /// Change poll interval for the http backend, in milliseconds
    pub poll_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::None,
            root: None,
            url: None,
            poll_ms: 1000,
        }
    }
}

/// One message pushed into the application once it reports ready
#[derive(Debug, Clone, Deserialize)]
pub struct StartupMessage {
    pub tag: String,
    #[serde(default)]
    pub data: Value,
}

impl From<StartupMessage> for Envelope {
    fn from(msg: StartupMessage) -> Self {
        Self::new(msg.tag, msg.data)
    }
}

/// Relay configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Collection holding the relayed document
    pub collection: String,
    /// Document id within the collection
    pub document: String,
    pub unknown_tags: UnknownTagPolicy,
    pub startup: Vec<StartupMessage>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            collection: "colors".to_string(),
            document: "mixer".to_string(),
            unknown_tags: UnknownTagPolicy::default(),
            startup: vec![StartupMessage {
                tag: "Get".to_string(),
                data: serde_json::json!({ "foo": "hallo" }),
            }],
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub relay: RelayConfig,
}

impl Config {
    /// Load configuration from default path
    pub fn load() -> Self {
        let config_path = Self::default_config_path();
        Self::load_from_path(&config_path).unwrap_or_default()
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hueport")
            .join("config.toml")
    }

    /// Load from specific path
    pub fn load_from_path(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                None
            }
        }
    }

    /// Create default config file if it doesn't exist
    pub fn create_default_if_missing() {
        let path = Self::default_config_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let default_config = r#"# hueport Configuration

[server]
ws_port = 9310
http_port = 8090
bind = "127.0.0.1"
# Directory holding the compiled application bundle
app_dir = "./app"

[store]
# One of: none, memory, file, http
backend = "none"
# root = "/var/lib/hueport"          # file backend
# url = "https://docs.example.com"   # http backend
poll_ms = 1000

[relay]
collection = "colors"
document = "mixer"
# One of: ignore, warn, fail
unknown_tags = "ignore"

[[relay.startup]]
tag = "Get"
data = { foo = "hallo" }
"#;
            let _ = std::fs::write(&path, default_config);
        }
    }
}

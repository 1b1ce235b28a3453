use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_opt(key).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Errors raised while assembling the runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Top-level config ──────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "color" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_address: String,
    pub listen_port: u16,
    /// Rule files, hot-reloaded when `watch_rules` is set.
    pub rules_files: Vec<PathBuf>,
    pub watch_rules: bool,
    pub log_format: LogFormat,
    pub deduplication: DeduplicationConfig,
    pub broker: BrokerPorts,
    /// Address other replicas use to reach this one; compared against the lease holder.
    pub self_identity: Option<String>,
    /// Result sinks enabled for every outcome, besides the structured log.
    pub default_notifiers: Vec<String>,
    pub notifiers: NotifiersConfig,
    pub kubernetes: KubernetesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 2803,
            rules_files: vec![PathBuf::from("rules.yaml")],
            watch_rules: true,
            log_format: LogFormat::Text,
            deduplication: DeduplicationConfig::default(),
            broker: BrokerPorts::default(),
            self_identity: None,
            default_notifiers: Vec::new(),
            notifiers: NotifiersConfig::default(),
            kubernetes: KubernetesConfig::default(),
        }
    }
}

impl Config {
    /// Build config from defaults, an optional YAML file, then `.env` and environment.
    ///
    /// Not validated: callers apply their own overrides, then call [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        load_dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `WARDEN_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_opt("WARDEN_LISTEN_ADDRESS") {
            self.listen_address = v;
        }
        if let Some(v) = env_parse("WARDEN_LISTEN_PORT") {
            self.listen_port = v;
        }
        if let Some(v) = env_opt("WARDEN_RULES_FILES") {
            self.rules_files = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Some(v) = env_bool("WARDEN_WATCH_RULES") {
            self.watch_rules = v;
        }
        if let Some(v) = env_parse("WARDEN_LOG_FORMAT") {
            self.log_format = v;
        }
        if let Some(v) = env_parse("WARDEN_DEDUPLICATION_WINDOW_SECONDS") {
            self.deduplication.time_window_seconds = v;
        }
        if let Some(v) = env_bool("WARDEN_DEDUPLICATION_LEADER_ELECTION") {
            self.deduplication.leader_election = v;
        }
        if let Some(v) = env_opt("WARDEN_SELF_IDENTITY").or_else(|| env_opt("POD_IP")) {
            self.self_identity = Some(v);
        }
        if let Some(v) = env_opt("WARDEN_WEBHOOK_URL") {
            self.notifiers.webhook.url = Some(v);
        }
        if let Some(v) = env_opt("WARDEN_KUBERNETES_API_URL") {
            self.kubernetes.api_url = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.rules_files.is_empty() {
            return Err(ConfigLoadError::Invalid("at least one rules file is required".into()));
        }
        if self.deduplication.time_window_seconds == 0 {
            return Err(ConfigLoadError::Invalid(
                "deduplication.time_window_seconds must be greater than zero".into(),
            ));
        }
        if self.broker.port == self.broker.delivery_port {
            return Err(ConfigLoadError::Invalid(
                "broker.port and broker.delivery_port must differ".into(),
            ));
        }
        if self.deduplication.leader_election && self.deduplication.lease_name.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "deduplication.lease_name is required with leader election".into(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  http:          {}:{}", self.listen_address, self.listen_port);
        tracing::info!("  rules:         {:?} (watch={})", self.rules_files, self.watch_rules);
        tracing::info!(
            "  dedup:         window={}s, leader_election={}",
            self.deduplication.time_window_seconds,
            self.deduplication.leader_election
        );
        tracing::info!(
            "  broker:        port={}, delivery_port={}",
            self.broker.port,
            self.broker.delivery_port
        );
        tracing::info!("  notifiers:     {:?}", self.default_notifiers);
    }
}

// ── Deduplication ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Window W: identical actions published within it run once.
    pub time_window_seconds: u64,
    /// Route every replica's publishes to the lease holder's broker.
    pub leader_election: bool,
    pub lease_name: String,
    pub lease_namespace: String,
    pub lease_poll_seconds: u64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 5,
            leader_election: false,
            lease_name: "warden".to_string(),
            lease_namespace: "default".to_string(),
            lease_poll_seconds: 2,
        }
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerPorts {
    /// Publishers (local and remote replicas) connect here.
    pub port: u16,
    /// The local consumer reads deduplicated envelopes here (loopback only).
    pub delivery_port: u16,
}

impl Default for BrokerPorts {
    fn default() -> Self {
        Self {
            port: 4222,
            delivery_port: 4223,
        }
    }
}

// ── Notifiers ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifiersConfig {
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub headers: HashMap<String, String>,
}

// ── Kubernetes ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// API server URL; derived from the in-cluster environment when unset.
    pub api_url: Option<String>,
    pub token_file: PathBuf,
    pub ca_file: PathBuf,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            ca_file: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt"),
        }
    }
}

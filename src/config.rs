//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use crate::executor::ExecutionFlags;
use crate::format::NotifType;

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MESSAGE_PATH: &str = "/api/messages";
const DEFAULT_PORT: u16 = 3978;

/// Bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot registration app id. Only logged; token handling lives outside this crate.
    pub app_id: String,

    /// Path of the messaging endpoint.
    pub message_path: String,

    /// Listen address.
    pub bind: String,

    pub port: u16,

    /// Name used in `<at>name</at>` mentions of the bot.
    pub bot_name: String,

    /// Label of the cluster this instance serves.
    pub cluster_name: String,

    pub allow_kubectl: bool,

    pub restrict_access: bool,

    pub notif_type: NotifType,

    /// kubectl binary to invoke.
    pub kubectl_path: String,

    /// Verbs accepted by the kubectl executor.
    pub allowed_verbs: Vec<String>,

    /// Deadline for connector calls (replies, proactive sends, deletions).
    pub request_timeout_secs: u64,

    /// Deadline for the file upload PUT.
    pub upload_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            message_path: DEFAULT_MESSAGE_PATH.into(),
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            bot_name: "BotKube".into(),
            cluster_name: "not-configured".into(),
            allow_kubectl: false,
            restrict_access: false,
            notif_type: NotifType::Short,
            kubectl_path: "kubectl".into(),
            allowed_verbs: [
                "api-resources",
                "api-versions",
                "cluster-info",
                "describe",
                "explain",
                "get",
                "logs",
                "top",
                "auth",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            request_timeout_secs: 30,
            upload_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from defaults and the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        let mut config = Self::from_toml(&raw).map_err(|error| match error {
            crate::Error::Config(ConfigError::Invalid(message)) => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            }
            .into(),
            other => other,
        })?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|error| ConfigError::Invalid(error.to_string()).into())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("TEAMS_APP_ID") {
            self.app_id = value;
        }
        if let Some(value) = lookup("TEAMS_MESSAGE_PATH") {
            self.message_path = value;
        }
        if let Some(value) = lookup("TEAMS_PORT") {
            self.port = value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("TEAMS_PORT is not a port: {value}")))?;
        }
        if let Some(value) = lookup("CLUSTER_NAME") {
            self.cluster_name = value;
        }
        if let Some(value) = lookup("ALLOW_KUBECTL") {
            self.allow_kubectl = parse_bool("ALLOW_KUBECTL", &value)?;
        }
        if let Some(value) = lookup("RESTRICT_ACCESS") {
            self.restrict_access = parse_bool("RESTRICT_ACCESS", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.message_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "message_path must start with '/': {}",
                self.message_path
            ))
            .into());
        }
        if self.request_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()).into());
        }
        Ok(())
    }

    /// Socket address the messaging endpoint listens on.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let raw_bind = self.bind.trim_start_matches('[').trim_end_matches(']');
        let bind_str = if raw_bind.contains(':') {
            format!("[{}]:{}", raw_bind, self.port)
        } else {
            format!("{}:{}", raw_bind, self.port)
        };
        bind_str.parse().map_err(|error| {
            ConfigError::Invalid(format!("invalid bind address '{bind_str}': {error}")).into()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Flags passed to the executor with every command from this bot.
    pub fn execution_flags(&self) -> ExecutionFlags {
        ExecutionFlags {
            allow_kubectl: self.allow_kubectl,
            restrict_access: self.restrict_access,
            cluster_name: self.cluster_name.clone(),
            // Teams has no per-channel authorisation list.
            is_auth_channel: true,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{key} is not a boolean: {value}")).into()),
    }
}

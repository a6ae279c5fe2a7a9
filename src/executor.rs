//! Command execution backend.
//!
//! The bridge hands every non-reserved chat command to a [`CommandExecutor`].
//! [`KubectlExecutor`] is the production implementation: it validates the verb,
//! honours the access flags and shells out to `kubectl`.

use crate::config::Config;
use crate::error::{ExecutorError, Result};

use async_trait::async_trait;
use std::collections::BTreeSet;

const CLUSTER_NAME_FLAG: &str = "--cluster-name";

/// Per-request execution flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFlags {
    pub allow_kubectl: bool,
    pub restrict_access: bool,
    pub cluster_name: String,
    pub is_auth_channel: bool,
}

/// Runs a trimmed chat command and returns its textual output.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    async fn execute(&self, command: &str, flags: &ExecutionFlags) -> Result<String>;
}

/// Executes whitelisted kubectl verbs against the local cluster.
pub struct KubectlExecutor {
    kubectl_path: String,
    allowed_verbs: BTreeSet<String>,
}

impl KubectlExecutor {
    pub fn new(
        kubectl_path: impl Into<String>,
        allowed_verbs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            kubectl_path: kubectl_path.into(),
            allowed_verbs: allowed_verbs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.kubectl_path.clone(), config.allowed_verbs.clone())
    }

    fn help(&self, cluster_name: &str) -> String {
        let verbs = self
            .allowed_verbs
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Cluster: {cluster_name}\nRun `ping` to check connectivity or a kubectl command using one of: {verbs}"
        )
    }
}

#[async_trait]
impl CommandExecutor for KubectlExecutor {
    async fn execute(&self, command: &str, flags: &ExecutionFlags) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(self.help(&flags.cluster_name));
        }
        if command == "ping" {
            return Ok(format!("pong from cluster '{}'", flags.cluster_name));
        }

        if let Some(target) = cluster_name_from_command(command) {
            if target != flags.cluster_name {
                tracing::debug!(%target, "command addressed to another cluster");
                return Ok(String::new());
            }
        }

        let args = kubectl_args(command);
        let Some(verb) = args.first() else {
            return Ok(self.help(&flags.cluster_name));
        };

        if !self.allowed_verbs.contains(*verb) {
            return Ok(format!(
                "Command '{verb}' not supported. {}",
                self.help(&flags.cluster_name)
            ));
        }
        if !flags.allow_kubectl {
            return Ok(format!(
                "Sorry, the admin hasn't given me the permission to execute kubectl command on cluster '{}'.",
                flags.cluster_name
            ));
        }
        if flags.restrict_access && !flags.is_auth_channel {
            return Ok(format!(
                "Sorry, kubectl commands are restricted to the configured channel on cluster '{}'.",
                flags.cluster_name
            ));
        }

        tracing::debug!(program = %self.kubectl_path, ?args, "running kubectl");
        let output = tokio::process::Command::new(&self.kubectl_path)
            .args(&args)
            .output()
            .await
            .map_err(|source| ExecutorError::Spawn {
                program: self.kubectl_path.clone(),
                source,
            })?;

        let stream = if output.status.success() {
            output.stdout
        } else {
            tracing::debug!(status = ?output.status, "kubectl exited unsuccessfully");
            [output.stdout, output.stderr].concat()
        };
        Ok(String::from_utf8_lossy(&stream).into_owned())
    }
}

/// kubectl arguments with the optional `kubectl` prefix and any
/// `--cluster-name` flag removed.
fn kubectl_args(command: &str) -> Vec<&str> {
    let mut tokens = command.split_whitespace().peekable();
    if tokens.peek() == Some(&"kubectl") {
        tokens.next();
    }

    let mut args = Vec::new();
    while let Some(token) = tokens.next() {
        if token == CLUSTER_NAME_FLAG {
            tokens.next();
            continue;
        }
        if token.starts_with("--cluster-name=") {
            continue;
        }
        args.push(token);
    }
    args
}

/// Cluster named by a `--cluster-name` flag, if the command carries one with a value.
pub fn cluster_name_from_command(command: &str) -> Option<&str> {
    let mut tokens = command.split_whitespace();
    while let Some(token) = tokens.next() {
        let value = if token == CLUSTER_NAME_FLAG {
            tokens.next()
        } else {
            token.strip_prefix("--cluster-name=")
        };
        match value {
            Some(name) if !name.is_empty() => return Some(name),
            Some(_) => return None,
            None => {}
        }
    }
    None
}

//! Test doubles shared by unit tests.

use crate::error::{ExecutorError, Result, TransportError};
use crate::executor::{CommandExecutor, ExecutionFlags};
use crate::messaging::Transport;
use crate::{
    Activity, ActivityKind, ChannelAccount, ConversationAccount, ConversationReference,
    OutboundActivity,
};

use async_trait::async_trait;
use axum::http::HeaderMap;
use parking_lot::Mutex;
use std::time::Duration;

/// A message activity as Teams would deliver it.
pub fn activity(text: &str, conversation_type: &str) -> Activity {
    Activity {
        kind: ActivityKind::Message,
        id: Some("msg-1".into()),
        name: None,
        text: text.into(),
        reply_to_id: None,
        service_url: "https://smba.example.com/emea/".into(),
        channel_id: "msteams".into(),
        from: Some(ChannelAccount {
            id: "user-1".into(),
            name: Some("Alex".into()),
        }),
        recipient: Some(ChannelAccount {
            id: "28:bot-app".into(),
            name: Some("BotKube".into()),
        }),
        conversation: ConversationAccount {
            id: "conv-1".into(),
            conversation_type: Some(conversation_type.into()),
            tenant_id: None,
            name: None,
        },
        channel_data: serde_json::Value::Null,
        value: None,
    }
}

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Reply {
        reply_to: Option<String>,
        outbound: OutboundActivity,
    },
    Proactive {
        conversation_id: String,
        outbound: OutboundActivity,
    },
    Delete {
        activity_id: String,
        conversation_id: String,
    },
}

/// Transport that records every outbound call instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_proactive: bool,
    fail_delete: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_proactive() -> Self {
        Self {
            fail_proactive: true,
            ..Self::default()
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn replies(&self) -> Vec<OutboundActivity> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Reply { outbound, .. } => Some(outbound),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Delete { activity_id, .. } => Some(activity_id),
                _ => None,
            })
            .collect()
    }

    /// Poll until `count` deletions were attempted, or panic after a few seconds.
    pub async fn wait_for_deletions(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.deleted_ids().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("deletions should be attempted");
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn parse_request(&self, _headers: &HeaderMap, body: &[u8]) -> Result<Activity> {
        serde_json::from_slice(body).map_err(|error| TransportError::Parse(error.to_string()).into())
    }

    async fn send_activity(
        &self,
        reply_to: &Activity,
        outbound: OutboundActivity,
    ) -> Result<Option<String>> {
        let mut calls = self.calls.lock();
        calls.push(TransportCall::Reply {
            reply_to: reply_to.id.clone(),
            outbound,
        });
        Ok(Some(format!("sent-{}", calls.len())))
    }

    async fn proactive_message(
        &self,
        reference: &ConversationReference,
        outbound: OutboundActivity,
    ) -> Result<()> {
        self.calls.lock().push(TransportCall::Proactive {
            conversation_id: reference.conversation.id.clone(),
            outbound,
        });
        if self.fail_proactive {
            return Err(TransportError::Status {
                status: 503,
                body: "unavailable".into(),
            }
            .into());
        }
        Ok(())
    }

    async fn delete_activity(
        &self,
        activity_id: &str,
        reference: &ConversationReference,
    ) -> Result<()> {
        self.calls.lock().push(TransportCall::Delete {
            activity_id: activity_id.into(),
            conversation_id: reference.conversation.id.clone(),
        });
        if self.fail_delete {
            return Err(TransportError::Status {
                status: 404,
                body: "not found".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// Executor returning canned output and recording the commands it saw.
pub struct StaticExecutor {
    output: Option<String>,
    commands: Mutex<Vec<String>>,
}

impl StaticExecutor {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            output: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandExecutor for StaticExecutor {
    async fn execute(&self, command: &str, _flags: &ExecutionFlags) -> Result<String> {
        self.commands.lock().push(command.to_string());
        match &self.output {
            Some(output) => Ok(output.clone()),
            None => Err(ExecutorError::Other(anyhow::anyhow!("executor unavailable")).into()),
        }
    }
}

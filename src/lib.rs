//! Clusterbridge: routes chat activities to a cluster command backend and
//! delivers the output back to the conversation.

pub mod config;
pub mod consent;
pub mod conversation;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod format;
pub mod messaging;
pub mod notifier;
pub mod router;
pub mod server;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Conversation type the platform reports for one-to-one chats.
pub const CONVERSATION_TYPE_PERSONAL: &str = "personal";

/// Activity kinds the router distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Message,
    Invoke,
    /// Conversation updates, typing indicators and anything else we ignore.
    Other(String),
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "message" => ActivityKind::Message,
            "invoke" => ActivityKind::Invoke,
            _ => ActivityKind::Other(value),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Message => write!(f, "message"),
            ActivityKind::Invoke => write!(f, "invoke"),
            ActivityKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// A user or bot identity on the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Addressing tuple needed to post into a conversation later on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    pub conversation: ConversationAccount,
    /// Platform channel, e.g. `msteams`.
    pub channel_id: String,
    pub service_url: String,
}

/// Inbound activity parsed from a platform request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub id: Option<String>,
    /// Invoke name, e.g. `fileConsent/invoke`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
    pub service_url: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: ConversationAccount,
    #[serde(default)]
    pub channel_data: serde_json::Value,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl Activity {
    /// Reference that addresses the conversation this activity came from.
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// Whether this is a one-to-one chat with the bot.
    pub fn is_personal(&self) -> bool {
        self.conversation.conversation_type.as_deref() == Some(CONVERSATION_TYPE_PERSONAL)
    }
}

/// Card or file attachment on an outbound activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

/// Outbound payload handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundActivity {
    Text(String),
    Attachments(Vec<Attachment>),
}

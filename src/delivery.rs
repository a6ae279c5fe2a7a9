//! Response delivery policy.
//!
//! Decides how command output reaches the chat:
//!
//! 1. Output shorter than [`MAX_MESSAGE_SIZE`] characters is sent inline as a
//!    code block.
//! 2. Longer output in a personal chat starts the file upload handshake: a
//!    file consent card is sent instead of text, carrying the original
//!    command so it can be re-run once the user accepts.
//! 3. Longer output anywhere else (group chats and channels cannot host the
//!    consent card) is cut down to its last [`MAX_MESSAGE_SIZE`] characters
//!    behind a notice.

use crate::error::Result;
use crate::messaging::TransportDyn;
use crate::upload::UploadContext;
use crate::{Activity, Attachment, OutboundActivity};

use serde_json::json;

/// Platform message size ceiling, in characters.
pub const MAX_MESSAGE_SIZE: usize = 15_700;

pub const LONG_RESPONSE_NOTICE: &str = "Response is too long. Sending last few lines. Please send DM to BotKube to get complete response.";

pub const FILE_CONSENT_CONTENT_TYPE: &str = "application/vnd.microsoft.teams.card.file.consent";

/// File name offered in the consent card.
pub const RESPONSE_FILE_NAME: &str = "response.txt";

/// How a response will be delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Inline(String),
    Truncated(String),
    FileConsent(Attachment),
}

impl Delivery {
    pub fn into_outbound(self) -> OutboundActivity {
        match self {
            Delivery::Inline(text) | Delivery::Truncated(text) => OutboundActivity::Text(text),
            Delivery::FileConsent(attachment) => OutboundActivity::Attachments(vec![attachment]),
        }
    }
}

/// Pick the delivery for `payload` in reply to `activity`.
pub fn plan(payload: &str, activity: &Activity, cluster_name: &str) -> Delivery {
    if payload.chars().count() < MAX_MESSAGE_SIZE {
        return Delivery::Inline(code_block(payload));
    }

    if activity.is_personal() {
        return Delivery::FileConsent(file_consent_card(payload, activity));
    }

    let mut text = truncation_header(cluster_name);
    text.push_str(tail_chars(payload, MAX_MESSAGE_SIZE));
    Delivery::Truncated(text)
}

/// Plan and send the response.
pub async fn deliver(
    transport: &dyn TransportDyn,
    activity: &Activity,
    payload: &str,
    cluster_name: &str,
) -> Result<()> {
    let delivery = plan(payload, activity, cluster_name);
    let consent = matches!(delivery, Delivery::FileConsent(_));
    match &delivery {
        Delivery::Inline(_) => {}
        Delivery::Truncated(_) => tracing::info!(
            conversation_id = %activity.conversation.id,
            length = payload.len(),
            "response too long for a group conversation, sending tail"
        ),
        Delivery::FileConsent(_) => tracing::info!(
            conversation_id = %activity.conversation.id,
            length = payload.len(),
            "response too long, requesting file upload consent"
        ),
    }

    let sent_id = transport
        .send_activity(activity, delivery.into_outbound())
        .await?;
    if consent {
        // The invoke answering this card carries the id as replyToId.
        tracing::debug!(prompt_id = ?sent_id, "file consent card posted");
    }
    Ok(())
}

pub fn code_block(text: &str) -> String {
    format!("```\n{text}\n```")
}

/// Notice and cluster label placed in front of truncated output.
///
/// The fence opened here is left open so the message ends exactly with the
/// output tail; Teams renders an unterminated fence to the end of the message.
pub fn truncation_header(cluster_name: &str) -> String {
    format!("{LONG_RESPONSE_NOTICE}\n```\nCluster: {cluster_name}\n")
}

fn file_consent_card(payload: &str, activity: &Activity) -> Attachment {
    let context = UploadContext {
        command: activity.text.clone(),
    };
    Attachment {
        content_type: FILE_CONSENT_CONTENT_TYPE.into(),
        name: Some(RESPONSE_FILE_NAME.into()),
        content_url: None,
        content: Some(json!({
            "description": activity.text,
            "sizeInBytes": payload.len(),
            "acceptContext": context,
        })),
    }
}

/// The last `count` characters of `text`.
fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    match text.char_indices().nth(total - count) {
        Some((byte_index, _)) => &text[byte_index..],
        None => text,
    }
}

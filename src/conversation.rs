//! The single conversation proactive notifications are delivered to.

use crate::{Activity, ConversationReference};

use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Reply sent after a channel registers itself for notifications.
pub const CHANNEL_SET_ACK: &str = "Okay. I'll send notifications to this channel";

/// Message id suffix Teams appends to channel conversation ids.
const MESSAGE_ID_SUFFIX: &str = ";messageid=";

/// Holds at most one destination; the last registration wins.
#[derive(Default)]
pub struct ConversationState {
    current: ArcSwapOption<ConversationReference>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the activity's conversation as the notification destination.
    pub fn register_channel(&self, activity: &Activity) -> &'static str {
        let mut reference = activity.conversation_reference();
        match teams_channel_id(activity) {
            Some(channel_id) => {
                reference.channel_id = channel_id.to_string();
                reference.conversation.id = channel_id.to_string();
            }
            None => reference.conversation.id = strip_message_id(&activity.conversation.id),
        }

        tracing::info!(
            conversation_id = %reference.conversation.id,
            "registered default notification channel"
        );
        self.current.store(Some(Arc::new(reference)));
        CHANNEL_SET_ACK
    }

    pub fn current_destination(&self) -> Option<Arc<ConversationReference>> {
        self.current.load_full()
    }
}

/// Channel addressed by the activity's channel data, if Teams supplied one.
fn teams_channel_id(activity: &Activity) -> Option<&str> {
    let channel_data = &activity.channel_data;
    channel_data
        .get("teamsChannelId")
        .and_then(|value| value.as_str())
        .or_else(|| {
            channel_data
                .get("channel")
                .and_then(|channel| channel.get("id"))
                .and_then(|value| value.as_str())
        })
}

/// Drop the thread suffix so the id addresses the channel itself.
fn strip_message_id(conversation_id: &str) -> String {
    match conversation_id.find(MESSAGE_ID_SUFFIX) {
        Some(index) => conversation_id[..index].to_string(),
        None => conversation_id.to_string(),
    }
}

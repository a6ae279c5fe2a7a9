//! Proactive notifications to the registered channel.

use crate::conversation::ConversationState;
use crate::format::{ClusterEvent, NotifType, format_event};
use crate::messaging::TransportDyn;
use crate::{Attachment, OutboundActivity};

use std::sync::Arc;

pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Result of a notification attempt. Notifications never fail the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// No channel registered yet.
    Skipped,
    Failed,
}

/// Sends unsolicited messages to the stored conversation.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn TransportDyn>,
    conversation: Arc<ConversationState>,
    notif_type: NotifType,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn TransportDyn>,
        conversation: Arc<ConversationState>,
        notif_type: NotifType,
    ) -> Self {
        Self {
            transport,
            conversation,
            notif_type,
        }
    }

    pub async fn notify(&self, outbound: OutboundActivity) -> NotifyOutcome {
        let Some(destination) = self.conversation.current_destination() else {
            tracing::info!("skipping notification since conversation ref not set");
            return NotifyOutcome::Skipped;
        };

        match self.transport.proactive_message(&destination, outbound).await {
            Ok(()) => {
                tracing::debug!(
                    conversation_id = %destination.conversation.id,
                    "notification sent"
                );
                NotifyOutcome::Sent
            }
            Err(error) => {
                tracing::error!(
                    %error,
                    conversation_id = %destination.conversation.id,
                    "failed to send notification"
                );
                NotifyOutcome::Failed
            }
        }
    }

    pub async fn send_message(&self, text: impl Into<String>) -> NotifyOutcome {
        self.notify(OutboundActivity::Text(text.into())).await
    }

    /// Render `event` as an adaptive card and send it.
    pub async fn send_event(&self, event: &ClusterEvent) -> NotifyOutcome {
        let card = Attachment {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE.into(),
            name: None,
            content_url: None,
            content: Some(format_event(event, self.notif_type)),
        };
        let outcome = self.notify(OutboundActivity::Attachments(vec![card])).await;
        tracing::debug!(kind = %event.kind, name = %event.name, ?outcome, "event notification");
        outcome
    }
}

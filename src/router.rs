//! Activity routing: the bot's per-request entry point.

use crate::config::Config;
use crate::consent::ConsentTracker;
use crate::conversation::ConversationState;
use crate::delivery;
use crate::error::Result;
use crate::executor::{CommandExecutor, ExecutionFlags};
use crate::messaging::TransportDyn;
use crate::notifier::Notifier;
use crate::upload::{self, Uploader};
use crate::{Activity, ActivityKind, OutboundActivity};

use std::sync::Arc;

/// Reserved command that registers the current channel for notifications.
pub const CHANNEL_SET_COMMAND: &str = "set default channel";

/// Shared bot state, one instance per process.
pub struct Bot {
    mention: String,
    cluster_name: String,
    flags: ExecutionFlags,
    transport: Arc<dyn TransportDyn>,
    executor: Arc<dyn CommandExecutor>,
    conversation: Arc<ConversationState>,
    consents: ConsentTracker,
    uploader: Uploader,
    notifier: Notifier,
}

impl Bot {
    pub fn new(
        config: &Config,
        transport: Arc<dyn TransportDyn>,
        executor: Arc<dyn CommandExecutor>,
    ) -> anyhow::Result<Self> {
        let conversation = Arc::new(ConversationState::new());
        let notifier = Notifier::new(transport.clone(), conversation.clone(), config.notif_type);
        Ok(Self {
            mention: format!("<at>{}</at>", config.bot_name),
            cluster_name: config.cluster_name.clone(),
            flags: config.execution_flags(),
            transport,
            executor,
            conversation,
            consents: ConsentTracker::new(),
            uploader: Uploader::new(config.upload_timeout())?,
            notifier,
        })
    }

    pub fn transport(&self) -> &Arc<dyn TransportDyn> {
        &self.transport
    }

    pub fn consents(&self) -> &ConsentTracker {
        &self.consents
    }

    pub fn conversation(&self) -> &Arc<ConversationState> {
        &self.conversation
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Handle one inbound activity.
    pub async fn handle_activity(&self, activity: &Activity) -> Result<()> {
        match &activity.kind {
            ActivityKind::Message => self.on_message(activity).await,
            ActivityKind::Invoke => self.on_invoke(activity).await,
            ActivityKind::Other(kind) => {
                tracing::debug!(%kind, "ignoring activity");
                Ok(())
            }
        }
    }

    async fn on_message(&self, activity: &Activity) -> Result<()> {
        let command = self.strip_mention(&activity.text);

        if command == CHANNEL_SET_COMMAND {
            let ack = self.conversation.register_channel(activity);
            self.transport
                .send_activity(activity, OutboundActivity::Text(ack.into()))
                .await?;
            return Ok(());
        }

        tracing::debug!(%command, conversation_id = %activity.conversation.id, "executing command");
        let output = self.executor.execute(command, &self.flags).await?;
        delivery::deliver(
            self.transport.as_ref(),
            activity,
            &output,
            &self.cluster_name,
        )
        .await
    }

    async fn on_invoke(&self, activity: &Activity) -> Result<()> {
        // The invoke replies to the consent card; queue the card for removal
        // whatever the user decided.
        match &activity.reply_to_id {
            Some(prompt_id) => {
                self.consents
                    .track(prompt_id.clone(), activity.conversation_reference());
            }
            None => tracing::debug!("invoke without replyToId, nothing to clean up"),
        }

        let Some(accepted) = upload::accepted_upload(activity.value.as_ref())? else {
            tracing::debug!(name = ?activity.name, "ignoring invoke");
            return Ok(());
        };

        let command = self.strip_mention(&accepted.context.command);
        tracing::info!(%command, "file upload accepted, re-running command");
        let output = self.executor.execute(command, &self.flags).await?;

        self.uploader
            .put(&accepted.info.upload_url, output.into_bytes())
            .await?;

        let card = upload::file_info_attachment(&accepted.info);
        self.transport
            .send_activity(activity, OutboundActivity::Attachments(vec![card]))
            .await?;
        Ok(())
    }

    /// Drop the leading `<at>bot</at>` mention Teams adds to channel messages.
    fn strip_mention<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim();
        text.strip_prefix(self.mention.as_str())
            .unwrap_or(text)
            .trim()
    }
}

//! Microsoft Teams transport over the Bot Framework connector REST API.
//!
//! Inbound requests are Bot Framework activity JSON posted to the messaging
//! endpoint. Outbound traffic goes to the `serviceUrl` carried by the activity
//! (or by a stored conversation reference):
//!
//! - replies: `POST {serviceUrl}/v3/conversations/{id}/activities/{replyToId}`
//! - proactive: `POST {serviceUrl}/v3/conversations/{id}/activities`
//! - deletion: `DELETE {serviceUrl}/v3/conversations/{id}/activities/{activityId}`
//!
//! Connector authentication is handled in front of this adapter.

use crate::error::{Result, TransportError};
use crate::messaging::traits::Transport;
use crate::{
    Activity, Attachment, ChannelAccount, ConversationAccount, ConversationReference,
    OutboundActivity,
};

use anyhow::Context as _;
use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Teams adapter.
pub struct TeamsAdapter {
    app_id: String,
    /// Shared HTTP client, reused across all connector calls.
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingActivity<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_format: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a ChannelAccount>,
    conversation: &'a ConversationAccount,
}

impl<'a> OutgoingActivity<'a> {
    fn new(outbound: OutboundActivity, conversation: &'a ConversationAccount) -> Self {
        let (text, text_format, attachments) = match outbound {
            OutboundActivity::Text(text) => (Some(text), Some("markdown"), Vec::new()),
            OutboundActivity::Attachments(attachments) => (None, None, attachments),
        };
        Self {
            kind: "message",
            text,
            text_format,
            attachments,
            reply_to_id: None,
            from: None,
            recipient: None,
            conversation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    id: Option<String>,
}

impl TeamsAdapter {
    pub fn new(app_id: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build connector HTTP client")?;
        Ok(Self {
            app_id: app_id.into(),
            http,
        })
    }

    async fn post(&self, url: &str, body: &OutgoingActivity<'_>) -> Result<Option<String>> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(TransportError::from)?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await.map_err(TransportError::from)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_slice::<ResourceResponse>(&bytes)
            .ok()
            .and_then(|resource| resource.id))
    }
}

fn activities_url(service_url: &str, conversation_id: &str) -> String {
    format!(
        "{}/v3/conversations/{}/activities",
        service_url.trim_end_matches('/'),
        urlencoding::encode(conversation_id)
    )
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    }
    .into())
}

impl Transport for TeamsAdapter {
    fn name(&self) -> &str {
        "msteams"
    }

    fn parse_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<Activity> {
        if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type
                .to_ascii_lowercase()
                .starts_with("application/json")
            {
                return Err(TransportError::Parse(format!(
                    "unsupported content type: {content_type}"
                ))
                .into());
            }
        }

        let activity: Activity = serde_json::from_slice(body)
            .map_err(|error| TransportError::Parse(error.to_string()))?;
        if activity.service_url.is_empty() {
            return Err(TransportError::Parse("activity has no serviceUrl".into()).into());
        }
        if let Some(recipient) = &activity.recipient {
            if !self.app_id.is_empty() && !recipient.id.ends_with(&self.app_id) {
                tracing::debug!(recipient = %recipient.id, "activity addressed to another bot id");
            }
        }
        Ok(activity)
    }

    async fn send_activity(
        &self,
        reply_to: &Activity,
        outbound: OutboundActivity,
    ) -> Result<Option<String>> {
        let mut url = activities_url(&reply_to.service_url, &reply_to.conversation.id);
        if let Some(id) = &reply_to.id {
            url = format!("{url}/{}", urlencoding::encode(id));
        }

        let mut body = OutgoingActivity::new(outbound, &reply_to.conversation);
        body.reply_to_id = reply_to.id.as_deref();
        body.from = reply_to.recipient.as_ref();
        body.recipient = reply_to.from.as_ref();

        let id = self.post(&url, &body).await?;
        tracing::debug!(conversation_id = %reply_to.conversation.id, ?id, "reply sent");
        Ok(id)
    }

    async fn proactive_message(
        &self,
        reference: &ConversationReference,
        outbound: OutboundActivity,
    ) -> Result<()> {
        let url = activities_url(&reference.service_url, &reference.conversation.id);

        let mut body = OutgoingActivity::new(outbound, &reference.conversation);
        body.from = reference.bot.as_ref();

        self.post(&url, &body).await?;
        tracing::debug!(conversation_id = %reference.conversation.id, "proactive message sent");
        Ok(())
    }

    async fn delete_activity(
        &self,
        activity_id: &str,
        reference: &ConversationReference,
    ) -> Result<()> {
        let url = format!(
            "{}/{}",
            activities_url(&reference.service_url, &reference.conversation.id),
            urlencoding::encode(activity_id)
        );
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(TransportError::from)?;
        check_status(response).await?;
        Ok(())
    }
}

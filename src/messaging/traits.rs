//! Transport trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{Activity, ConversationReference, OutboundActivity};

use axum::http::HeaderMap;
use std::pin::Pin;

/// Static trait for chat platform transports.
/// Use this for type-safe implementations.
pub trait Transport: Send + Sync + 'static {
    /// Unique name for this transport.
    fn name(&self) -> &str;

    /// Parse an inbound HTTP request body into an activity.
    fn parse_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<Activity>;

    /// Reply to an inbound activity. Returns the id of the posted activity, if the
    /// platform reports one.
    fn send_activity(
        &self,
        reply_to: &Activity,
        outbound: OutboundActivity,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Post into a stored conversation without an inbound trigger.
    fn proactive_message(
        &self,
        reference: &ConversationReference,
        outbound: OutboundActivity,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete a previously posted activity.
    fn delete_activity(
        &self,
        activity_id: &str,
        reference: &ConversationReference,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn TransportDyn>` shared across components.
pub trait TransportDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn parse_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<Activity>;

    fn send_activity<'a>(
        &'a self,
        reply_to: &'a Activity,
        outbound: OutboundActivity,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Option<String>>> + Send + 'a>>;

    fn proactive_message<'a>(
        &'a self,
        reference: &'a ConversationReference,
        outbound: OutboundActivity,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn delete_activity<'a>(
        &'a self,
        activity_id: &'a str,
        reference: &'a ConversationReference,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing Transport automatically implements TransportDyn.
impl<T: Transport> TransportDyn for T {
    fn name(&self) -> &str {
        Transport::name(self)
    }

    fn parse_request(&self, headers: &HeaderMap, body: &[u8]) -> Result<Activity> {
        Transport::parse_request(self, headers, body)
    }

    fn send_activity<'a>(
        &'a self,
        reply_to: &'a Activity,
        outbound: OutboundActivity,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(Transport::send_activity(self, reply_to, outbound))
    }

    fn proactive_message<'a>(
        &'a self,
        reference: &'a ConversationReference,
        outbound: OutboundActivity,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Transport::proactive_message(self, reference, outbound))
    }

    fn delete_activity<'a>(
        &'a self,
        activity_id: &'a str,
        reference: &'a ConversationReference,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Transport::delete_activity(self, activity_id, reference))
    }
}

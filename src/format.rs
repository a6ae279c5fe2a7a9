//! Adaptive card rendering for cluster events.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// How much detail event cards carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifType {
    #[default]
    Short,
    Long,
}

/// Severity of a cluster event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    fn color(self) -> &'static str {
        match self {
            Level::Info => "good",
            Level::Warn => "warning",
            Level::Error | Level::Critical => "attention",
        }
    }
}

/// An event raised by the automation backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// `create`, `update`, `delete`, `error`, ...
    pub event_type: String,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub cluster: String,
    #[serde(default)]
    pub time: Option<chrono::DateTime<chrono::Utc>>,
}

impl ClusterEvent {
    fn title(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!(
                "{} {}/{} {}",
                self.kind, namespace, self.name, self.event_type
            ),
            None => format!("{} {} {}", self.kind, self.name, self.event_type),
        }
    }
}

/// Render an event as an adaptive card body.
pub fn format_event(event: &ClusterEvent, notif_type: NotifType) -> Value {
    let mut body = vec![json!({
        "type": "TextBlock",
        "text": event.title(),
        "weight": "bolder",
        "size": "medium",
        "color": event.level.color(),
        "wrap": true,
    })];

    match notif_type {
        NotifType::Short => {
            if let Some(message) = event.messages.first() {
                body.push(text_block(message));
            }
        }
        NotifType::Long => {
            let mut facts = vec![
                fact("Kind", &event.kind),
                fact("Name", &event.name),
            ];
            if let Some(namespace) = &event.namespace {
                facts.push(fact("Namespace", namespace));
            }
            if let Some(reason) = &event.reason {
                facts.push(fact("Reason", reason));
            }
            if let Some(time) = event.time {
                facts.push(fact("Time", &time.to_rfc3339()));
            }
            body.push(json!({ "type": "FactSet", "facts": facts }));

            if !event.messages.is_empty() {
                body.push(text_block(&event.messages.join("\n")));
            }
            if !event.recommendations.is_empty() {
                body.push(text_block(&format!(
                    "Recommendations:\n{}",
                    event.recommendations.join("\n")
                )));
            }
        }
    }

    body.push(json!({
        "type": "TextBlock",
        "text": format!("Cluster: {}", event.cluster),
        "isSubtle": true,
        "size": "small",
    }));

    json!({
        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
        "type": "AdaptiveCard",
        "version": "1.2",
        "body": body,
    })
}

fn text_block(text: &str) -> Value {
    json!({ "type": "TextBlock", "text": text, "wrap": true })
}

fn fact(title: &str, value: &str) -> Value {
    json!({ "title": title, "value": value })
}

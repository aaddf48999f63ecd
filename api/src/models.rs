//! Webhook payload models
//!
//! Raw shapes as the messaging platform posts them (deeply optional nesting),
//! the normalized event the router consumes, and the response bodies returned
//! to the webhook caller. Normalization happens exactly once, here; the
//! router never looks at a raw payload.

use serde::{Deserialize, Serialize};

use followcare_core::FollowUpError;

/// Raw webhook payload as posted by the messaging platform
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Event type tag, e.g. "contact:update" or "message:in:new"
    pub event: Option<String>,
    /// Top-level contact id, present on some event shapes
    pub id: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookData {
    pub phone: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "fromMe")]
    pub from_me: Option<bool>,
    pub contact: Option<WebhookContact>,
    pub chat: Option<WebhookChat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    pub id: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChat {
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Normalized inbound event
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub contact_id: String,
    pub phone_number: String,
    pub kind: EventKind,
}

/// What kind of event arrived
#[derive(Debug, Clone)]
pub enum EventKind {
    /// Contact labels changed; carries the full label set
    LabelApplied { labels: Vec<String> },
    /// A message arrived on the channel
    Message { body: String, from_operator: bool },
    /// Event type this service does not consume
    Other,
}

impl WebhookPayload {
    /// Flatten the raw payload's optional nesting into one normalized event.
    /// A missing contact id or phone number is a malformed event.
    pub fn normalize(self) -> Result<InboundEvent, FollowUpError> {
        let data = self.data.unwrap_or_default();

        let contact_id = self
            .id
            .or_else(|| data.contact.as_ref().and_then(|c| c.id.clone()))
            .ok_or_else(|| FollowUpError::MalformedEvent("missing contact id".to_string()))?;
        let phone_number = data
            .phone
            .clone()
            .or_else(|| data.contact.as_ref().and_then(|c| c.phone.clone()))
            .ok_or_else(|| FollowUpError::MalformedEvent("missing phone number".to_string()))?;

        let kind = match self.event.as_deref() {
            Some("contact:update") => EventKind::LabelApplied {
                labels: data.chat.map(|c| c.labels).unwrap_or_default(),
            },
            Some("message:in:new") => EventKind::Message {
                body: data.content.unwrap_or_default().trim().to_string(),
                from_operator: data.from_me.unwrap_or(false),
            },
            _ => EventKind::Other,
        };

        Ok(InboundEvent {
            contact_id,
            phone_number,
            kind,
        })
    }
}

/// Body returned to the webhook caller
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: String,
}

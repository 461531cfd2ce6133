//! WhatsApp Cloud API payloads
//!
//! Inbound webhook bodies are resolved once into [`InboundMessage`]; the
//! rest of the crate never looks at the raw JSON shape.

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound webhook payload
// =============================================================================

/// Webhook delivery body (`entry[].changes[].value`)
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Contact {
    pub profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessage {
    pub from: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub text: Option<TextMessage>,
    pub interactive: Option<InteractiveMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextMessage {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InteractiveMessage {
    pub button_reply: Option<ButtonReply>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ButtonReply {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
}

/// What the user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Free text, trimmed
    Text(String),
    /// Reply button press
    Button { id: String, title: String },
    /// Any other message category (image, audio, location, ...)
    Unsupported(String),
}

/// A single inbound message resolved from a webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub contact_name: Option<String>,
    pub kind: MessageKind,
}

impl InboundMessage {
    pub fn text(sender: &str, body: &str) -> Self {
        Self {
            sender: sender.to_string(),
            contact_name: None,
            kind: MessageKind::Text(body.trim().to_string()),
        }
    }

    pub fn button(sender: &str, id: &str) -> Self {
        Self {
            sender: sender.to_string(),
            contact_name: None,
            kind: MessageKind::Button {
                id: id.to_string(),
                title: String::new(),
            },
        }
    }

    /// Resolve the first message of a delivery
    ///
    /// Returns `None` for status callbacks, deliveries without a sender and
    /// interactive replies that carry no button id.
    pub fn from_payload(payload: WebhookPayload) -> Option<Self> {
        let value = payload
            .entry
            .into_iter()
            .next()?
            .changes
            .into_iter()
            .next()?
            .value;

        let contact_name = value
            .contacts
            .into_iter()
            .next()
            .and_then(|contact| contact.profile)
            .and_then(|profile| profile.name)
            .filter(|name| !name.is_empty());

        let message = value.messages.into_iter().next()?;
        let sender = message.from.filter(|from| !from.is_empty())?;

        let kind = match message.message_type.as_deref() {
            Some("text") => MessageKind::Text(
                message
                    .text
                    .map(|text| text.body.trim().to_string())
                    .unwrap_or_default(),
            ),
            Some("interactive") => {
                let reply = message.interactive?.button_reply?;
                let id = reply.id.filter(|id| !id.is_empty())?;
                MessageKind::Button {
                    id,
                    title: reply.title,
                }
            }
            other => MessageKind::Unsupported(other.unwrap_or("unknown").to_string()),
        };

        Some(Self {
            sender,
            contact_name,
            kind,
        })
    }
}

// =============================================================================
// Outbound message payload
// =============================================================================

/// A reply option shown as a button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
}

impl ReplyOption {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Body posted to `/{phone_number_id}/messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub messaging_product: &'static str,
    pub to: String,
    #[serde(flatten)]
    pub content: OutboundContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    Text { text: TextContent },
    Interactive { interactive: InteractiveContent },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub body: InteractiveBody,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveBody {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonAction {
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub reply: ReplyOption,
}

impl OutboundMessage {
    pub fn text(to: &str, body: String) -> Self {
        Self {
            messaging_product: "whatsapp",
            to: to.to_string(),
            content: OutboundContent::Text {
                text: TextContent { body },
            },
        }
    }

    pub fn buttons(to: &str, prompt: String, options: Vec<ReplyOption>) -> Self {
        Self {
            messaging_product: "whatsapp",
            to: to.to_string(),
            content: OutboundContent::Interactive {
                interactive: InteractiveContent {
                    kind: "button",
                    body: InteractiveBody { text: prompt },
                    action: ButtonAction {
                        buttons: options
                            .into_iter()
                            .map(|reply| Button {
                                kind: "reply",
                                reply,
                            })
                            .collect(),
                    },
                },
            },
        }
    }
}

//! Notifier gateway
//!
//! Best-effort outbound messaging: payloads are clamped to provider limits,
//! retryable failures are retried with linear backoff, and anything that
//! still fails is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use slotbot_core::WhatsAppConfig;
use tracing::{debug, error, warn};

use crate::api::{CloudApiTransport, DeliveryOutcome, MessageTransport};
use crate::error::Result;
use crate::types::{OutboundMessage, ReplyOption};

/// Longest message body the provider accepts, in characters
pub const MAX_BODY_CHARS: usize = 1024;
/// Longest button title, in characters
pub const MAX_OPTION_TITLE_CHARS: usize = 20;
/// Most buttons on one message
pub const MAX_OPTIONS: usize = 3;

/// Sends replies to users
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, to: &str, body: &str);

    async fn send_options(&self, to: &str, prompt: &str, options: &[ReplyOption]);
}

/// [`Notifier`] backed by a [`MessageTransport`]
pub struct NotifierGateway {
    transport: Option<Arc<dyn MessageTransport>>,
    max_attempts: u32,
    backoff: Duration,
}

impl NotifierGateway {
    /// Gateway over the Cloud API; a no-op when credentials are missing
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self> {
        if !config.has_credentials() {
            warn!("WhatsApp credentials missing; outbound messages will be skipped");
            return Ok(Self::disabled());
        }

        let transport = CloudApiTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.max_retries,
            config.backoff(),
        ))
    }

    pub fn with_transport(transport: Arc<dyn MessageTransport>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            transport: Some(transport),
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Gateway that drops every message
    pub fn disabled() -> Self {
        Self {
            transport: None,
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    async fn deliver(&self, message: OutboundMessage) {
        let Some(transport) = &self.transport else {
            warn!("WhatsApp credentials missing; skipping send to {}", message.to);
            return;
        };

        for attempt in 1..=self.max_attempts {
            match transport.post_message(&message).await {
                DeliveryOutcome::Delivered => {
                    debug!("Delivered message to {} (attempt {})", message.to, attempt);
                    return;
                }
                DeliveryOutcome::Fatal(reason) => {
                    error!("WhatsApp send failed (attempt {}): {}", attempt, reason);
                    return;
                }
                DeliveryOutcome::Retryable(reason) => {
                    error!("WhatsApp send failed (attempt {}): {}", attempt, reason);
                    if attempt == self.max_attempts {
                        error!("Giving up on message to {} after {} attempts", message.to, attempt);
                        return;
                    }
                }
            }
            tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
        }
    }
}

#[async_trait]
impl Notifier for NotifierGateway {
    async fn send_text(&self, to: &str, body: &str) {
        let message = OutboundMessage::text(to, truncate_chars(body, MAX_BODY_CHARS));
        self.deliver(message).await;
    }

    async fn send_options(&self, to: &str, prompt: &str, options: &[ReplyOption]) {
        let options = options
            .iter()
            .take(MAX_OPTIONS)
            .map(|option| ReplyOption {
                id: option.id.clone(),
                title: truncate_chars(&option.title, MAX_OPTION_TITLE_CHARS),
            })
            .collect();
        let message = OutboundMessage::buttons(to, truncate_chars(prompt, MAX_BODY_CHARS), options);
        self.deliver(message).await;
    }
}

/// First `max` characters of `value`
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((index, _)) => value[..index].to_string(),
        None => value.to_string(),
    }
}

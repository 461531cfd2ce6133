//! WhatsApp Cloud API transport

use async_trait::async_trait;
use reqwest::Client;
use slotbot_core::WhatsAppConfig;
use tracing::{debug, info};

use crate::error::{Result, WhatsAppError};
use crate::types::OutboundMessage;

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Worth another attempt (server errors, network failures, timeouts)
    Retryable(String),
    /// Will fail the same way again
    Fatal(String),
}

/// Posts one message to the messaging provider
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn post_message(&self, message: &OutboundMessage) -> DeliveryOutcome;
}

/// Cloud API client bound to one sending phone number
#[derive(Debug, Clone)]
pub struct CloudApiTransport {
    client: Client,
    access_token: String,
    url: String,
}

impl CloudApiTransport {
    /// Create a new transport
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        if !config.has_credentials() {
            return Err(WhatsAppError::CredentialsNotSet);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| WhatsAppError::Config(e.to_string()))?;

        let url = format!(
            "{}/{}/messages",
            config.api_base.trim_end_matches('/'),
            config.phone_number_id
        );
        info!("WhatsApp transport initialized for {}", url);

        Ok(Self {
            client,
            access_token: config.access_token.clone(),
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageTransport for CloudApiTransport {
    async fn post_message(&self, message: &OutboundMessage) -> DeliveryOutcome {
        debug!("Sending WhatsApp message to {}", message.to);

        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(message)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_builder() => return DeliveryOutcome::Fatal(e.to_string()),
            Err(e) => return DeliveryOutcome::Retryable(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return DeliveryOutcome::Delivered;
        }

        let body = response.text().await.unwrap_or_default();
        let reason = WhatsAppError::Api {
            status: status.as_u16(),
            body,
        }
        .to_string();

        if status.is_server_error() {
            DeliveryOutcome::Retryable(reason)
        } else {
            DeliveryOutcome::Fatal(reason)
        }
    }
}

//! Outbound message gateway
//!
//! Thin adapter submitting a single text message to the messaging platform.
//! Delivery failures are reported to the caller; nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use followcare_core::FollowUpError;

/// Sends one text message to a phone number.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(&self, phone_number: &str, text: &str) -> Result<(), FollowUpError>;
}

/// Wassenger HTTP messaging gateway
pub struct WassengerGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

impl WassengerGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MessageGateway for WassengerGateway {
    async fn send_text(&self, phone_number: &str, text: &str) -> Result<(), FollowUpError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let body = SendMessageRequest {
            phone: phone_number,
            message: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FollowUpError::Delivery {
                status: None,
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Gateway rejected send to {phone_number}: {status} {text}");
            return Err(FollowUpError::Delivery {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        debug!("Message sent to {phone_number}");
        Ok(())
    }
}

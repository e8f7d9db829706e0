use std::time::Duration;

use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::auth::Token;
use crate::delivery::{Delivery, DeliverySink};
use crate::error::{DigestError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Posts the digest to an HTTP mail relay.
pub struct WebhookSink {
    client: Client,
    endpoint: Url,
    token: Option<Token>,
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl WebhookSink {
    pub fn new(endpoint: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stale-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| DigestError::Config(format!("Invalid webhook URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(&self, delivery: &Delivery) -> Result<()> {
        let message = RelayMessage {
            to: &delivery.recipients,
            subject: &delivery.subject,
            html: &delivery.document,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DigestError::Delivery(format!("mail relay unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(DigestError::Delivery(format!(
                "mail relay returned {status}: {body}"
            )));
        }

        info!(
            "Mail relay accepted '{}' for {} recipients",
            delivery.subject,
            delivery.recipients.len()
        );
        Ok(())
    }
}

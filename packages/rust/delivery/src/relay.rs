//! Delivery through an HTTP mail relay.

use std::time::Duration;

use async_trait::async_trait;
use inviteboard_shared::{DeliveryConfig, InviteBoardError, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{DeliveryGateway, DeliveryOutcome, Envelope};

/// User-Agent header for relay requests.
const USER_AGENT: &str = concat!("inviteboard/", env!("CARGO_PKG_VERSION"));

/// POSTs each envelope as JSON to a relay endpoint.
pub struct HttpRelayGateway {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpRelayGateway {
    pub fn new(endpoint: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InviteBoardError::Delivery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    /// Gateway for the `[delivery]` config section. The token is read from
    /// the env var the config names.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        Self::new(
            config.relay_endpoint()?,
            config.relay_token(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryGateway for HttpRelayGateway {
    fn name(&self) -> &str {
        "relay"
    }

    async fn deliver(&self, envelope: &Envelope<'_>) -> DeliveryOutcome {
        debug!(to = envelope.to, endpoint = %self.endpoint, "posting to relay");

        let mut request = self.client.post(self.endpoint.clone()).json(&envelope.to_wire());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::failed(format!("relay unreachable: {e}")),
        };

        let status = response.status();
        if status.is_success() {
            DeliveryOutcome::sent(format!("Email sent successfully to {}", envelope.to))
        } else {
            let detail = response.text().await.unwrap_or_default();
            let detail = detail.trim();
            if detail.is_empty() {
                DeliveryOutcome::failed(format!("relay returned HTTP {status}"))
            } else {
                DeliveryOutcome::failed(format!("relay returned HTTP {status}: {detail}"))
            }
        }
    }
}

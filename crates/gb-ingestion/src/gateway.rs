//! Session gateway transport.
//!
//! The gateway is a sidecar that holds the authenticated messaging-account
//! sessions. This module provides `GatewayTransport`, a JSON-over-HTTP client
//! bound to one user's session on that gateway.
//!
//! # Endpoints
//!
//! | Operation              | Request                                           |
//! |------------------------|---------------------------------------------------|
//! | connect                | `POST   sessions/{user_id}` with credentials      |
//! | list current items     | `GET    sessions/{user_id}/gifts`                 |
//! | acquire one unit       | `POST   sessions/{user_id}/gifts/{id}/send`       |
//! | send message           | `POST   sessions/{user_id}/messages`              |
//! | disconnect             | `DELETE sessions/{user_id}`                       |
//!
//! Any non-2xx answer becomes [`TransportError::Rejected`]. Network failures
//! and answers saying the gateway lost the session (401, 404) also mark the
//! handle disconnected, so the detection loop reconnects on its next cycle.

use gb_types::{ChannelTarget, Credentials, ItemRecord, Recipient, UserConfig, UserId};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use crate::{config::GatewayConfig, error::TransportError, Transport, TransportFactory};

#[derive(Serialize)]
struct ConnectRequest<'a> {
    api_id: i64,
    api_hash: &'a str,
    phone_number: &'a str,
    session_path: &'a str,
}

#[derive(Serialize)]
struct SendItemRequest<'a> {
    recipient: &'a Recipient,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat: &'a ChannelTarget,
    text: &'a str,
}

/// Transport handle for one user's session on the gateway.
pub struct GatewayTransport {
    http_client: reqwest::Client,
    base_url: Url,
    user_id: UserId,
    credentials: Credentials,
    connected: AtomicBool,
}

impl GatewayTransport {
    /// Create a handle. No request is made until [`Transport::connect`].
    pub fn new(http_client: reqwest::Client, base_url: Url, config: &UserConfig) -> Self {
        Self {
            http_client,
            base_url,
            user_id: config.user_id,
            credentials: config.credentials.clone(),
            connected: AtomicBool::new(false),
        }
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self
            .base_url
            .join(&format!("sessions/{}{}", self.user_id, path))?)
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    /// Drop the connected flag if `result` shows the session is gone.
    fn track<R>(&self, result: Result<R, TransportError>) -> Result<R, TransportError> {
        if let Err(e) = &result {
            if e.is_session_lost() && self.connected.swap(false, Ordering::AcqRel) {
                tracing::warn!(user_id = self.user_id, "Gateway session lost: {}", e);
            }
        }
        result
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl Transport for GatewayTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let request = ConnectRequest {
            api_id: self.credentials.api_id,
            api_hash: &self.credentials.api_hash,
            phone_number: &self.credentials.phone_number,
            session_path: &self.credentials.session_path,
        };

        let response = self
            .http_client
            .post(self.url("")?)
            .json(&request)
            .send()
            .await?;
        Self::check(response).await?;

        self.connected.store(true, Ordering::Release);
        tracing::debug!(user_id = self.user_id, "Gateway session connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        // Mark disconnected first: the handle is unusable either way.
        self.connected.store(false, Ordering::Release);

        let response = self.http_client.delete(self.url("")?).send().await?;
        Self::check(response).await?;

        tracing::debug!(user_id = self.user_id, "Gateway session released");
        Ok(())
    }

    async fn list_current_items(&self) -> Result<Vec<ItemRecord>, TransportError> {
        self.ensure_connected()?;

        let result: Result<Vec<ItemRecord>, TransportError> = async {
            let response = self.http_client.get(self.url("/gifts")?).send().await?;
            Ok(Self::check(response).await?.json().await?)
        }
        .await;
        let items = self.track(result)?;

        tracing::trace!(user_id = self.user_id, "Listed {} items", items.len());
        Ok(items)
    }

    async fn send_item(&self, item_id: i64, recipient: &Recipient) -> Result<(), TransportError> {
        self.ensure_connected()?;

        let result: Result<(), TransportError> = async {
            let response = self
                .http_client
                .post(self.url(&format!("/gifts/{}/send", item_id))?)
                .json(&SendItemRequest { recipient })
                .send()
                .await?;
            Self::check(response).await.map(drop)
        }
        .await;
        self.track(result)
    }

    async fn send_message(&self, chat: &ChannelTarget, text: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;

        let result: Result<(), TransportError> = async {
            let response = self
                .http_client
                .post(self.url("/messages")?)
                .json(&SendMessageRequest { chat, text })
                .send()
                .await?;
            Self::check(response).await.map(drop)
        }
        .await;
        self.track(result)
    }
}

/// Opens [`GatewayTransport`] handles sharing one HTTP connection pool.
#[derive(Clone)]
pub struct GatewayFactory {
    http_client: reqwest::Client,
    base_url: Url,
}

impl GatewayFactory {
    /// Create a factory for the configured gateway.
    pub fn new(config: GatewayConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
        })
    }

    /// Base URL handles are opened against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl TransportFactory for GatewayFactory {
    type Transport = GatewayTransport;

    fn open(&self, config: &UserConfig) -> Result<GatewayTransport, TransportError> {
        Ok(GatewayTransport::new(
            self.http_client.clone(),
            self.base_url.clone(),
            config,
        ))
    }
}

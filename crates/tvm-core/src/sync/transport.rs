//! Sync transport
//!
//! [`SyncTransport`] is the seam between the sync engine and the network.
//! [`HttpTransport`] speaks the server's HTTP contract:
//!
//! - `POST /export` / `DELETE /export/:id` with `Content-MD5` and
//!   `X-DEVICE-ID`; the server answers with the hash it computed as `ETag`
//! - `GET /import` or `GET /import/all` with `X-DEVICE-ID`; the body is a
//!   snapshot and `ETag` its hash
//! - `DELETE /import/:id` clears this device's pending marker
//! - `PUT /devices/:name` registers (or renames) a device; the assigned id
//!   is the last segment of the `Location` header
//! - `DELETE /devices/:id` forgets a device

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG, LOCATION};
use reqwest::{Client, RequestBuilder, Response, Url};
use thiserror::Error;
use tracing::debug;

use super::message::{
    ExportRequest, ImportMode, ImportResponse, CONTENT_HASH_HEADER, DEVICE_ID_HEADER,
};
use crate::storage::SyncAction;

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 30;

/// Network-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("Invalid sync server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Client side of the sync protocol
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Send one change; returns the server's ETag, if any
    async fn export(
        &self,
        device_id: &str,
        request: &ExportRequest,
    ) -> Result<Option<String>, TransportError>;

    /// Fetch a snapshot
    async fn import(
        &self,
        device_id: &str,
        mode: ImportMode,
    ) -> Result<ImportResponse, TransportError>;

    /// Clear this device's pending marker for an entity
    async fn clear_pending(&self, device_id: &str, id: &str) -> Result<(), TransportError>;

    /// Register a device by name (renaming `current_id` when given);
    /// returns the server-issued id
    async fn register_device(
        &self,
        name: &str,
        current_id: Option<&str>,
    ) -> Result<String, TransportError>;

    async fn unregister_device(&self, device_id: &str) -> Result<(), TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        // Checked in `new`: the base URL can always take path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn header_value(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn export(
        &self,
        device_id: &str,
        request: &ExportRequest,
    ) -> Result<Option<String>, TransportError> {
        let builder = match request.action {
            SyncAction::Modified => self
                .client
                .post(self.url(&["export"]))
                .header(CONTENT_TYPE, "application/json")
                .body(request.body.clone()),
            SyncAction::Deleted => self
                .client
                .delete(self.url(&["export", request.id.as_str()])),
        };

        debug!(entity = %request.entity_type, id = %request.id, action = %request.action, "Exporting change");
        let response = self
            .send(
                builder
                    .header(CONTENT_HASH_HEADER, &request.hash)
                    .header(DEVICE_ID_HEADER, device_id),
            )
            .await?;
        Ok(header_value(&response, ETAG))
    }

    async fn import(
        &self,
        device_id: &str,
        mode: ImportMode,
    ) -> Result<ImportResponse, TransportError> {
        let response = self
            .send(
                self.client
                    .get(self.url(mode.segments()))
                    .header(DEVICE_ID_HEADER, device_id),
            )
            .await?;
        let etag = header_value(&response, ETAG);
        let body = response.bytes().await?.to_vec();
        Ok(ImportResponse { body, etag })
    }

    async fn clear_pending(&self, device_id: &str, id: &str) -> Result<(), TransportError> {
        self.send(
            self.client
                .delete(self.url(&["import", id]))
                .header(DEVICE_ID_HEADER, device_id),
        )
        .await?;
        Ok(())
    }

    async fn register_device(
        &self,
        name: &str,
        current_id: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut builder = self.client.put(self.url(&["devices", name]));
        if let Some(id) = current_id {
            builder = builder.header(DEVICE_ID_HEADER, id);
        }

        let response = self.send(builder).await?;
        header_value(&response, LOCATION)
            .and_then(|location| {
                location
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
            .ok_or(TransportError::MissingHeader("Location"))
    }

    async fn unregister_device(&self, device_id: &str) -> Result<(), TransportError> {
        self.send(
            self.client
                .delete(self.url(&["devices", device_id]))
                .header(DEVICE_ID_HEADER, device_id),
        )
        .await?;
        Ok(())
    }
}

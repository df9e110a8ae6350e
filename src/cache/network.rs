//! Network access for cache misses.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::{AssetRequest, AssetResponse};
use crate::error::Result;

/// Abstraction over fetching a request from the network, for testability.
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs `request`. Non-2xx statuses are returned, not treated as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse>;
}

/// [`Network`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = response.bytes().await?;
        log::debug!("Fetched {} ({status}, {} bytes)", request.url, body.len());

        Ok(AssetResponse {
            url: request.url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

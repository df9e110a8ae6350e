//! Offline asset cache.
//!
//! Sits in front of the network the way a page's service worker does:
//! pre-caches a fixed manifest on install, serves cached copies when
//! present, falls back to the network, and answers failed navigations
//! with a static offline page.

mod manifest;
mod network;
mod offline;
mod storage;

use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::{Method, Url};

use crate::error::{Error, Result};

pub use manifest::{AssetManifest, DEFAULT_ASSETS, DEFAULT_CACHE_NAME};
pub use network::{HttpNetwork, Network};
pub use offline::{OFFLINE_PAGE, offline_response};
pub use storage::{CacheStorage, DiskStorage, MemoryStorage};

/// Number of manifest assets fetched concurrently during install.
const INSTALL_CONCURRENCY: usize = 4;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// A request passing through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl AssetRequest {
    /// A `GET` subresource request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Cors,
        }
    }

    /// A `GET` page navigation.
    #[must_use]
    pub const fn navigate(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Navigate,
        }
    }

    /// Sets the request mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether this request is a page navigation.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response as stored in, or served from, the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetResponse {
    /// URL the response belongs to; the cache key.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl AssetResponse {
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// Sets the `Content-Type`.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// True for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Result of [`OfflineCache::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    /// URLs stored in the bucket.
    pub cached: Vec<String>,
    /// Manifest entries that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    /// True if every manifest entry was cached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Lifecycle driver for the offline cache.
pub struct OfflineCache<S: CacheStorage, N: Network> {
    manifest: AssetManifest,
    origin: Url,
    storage: S,
    network: N,
}

impl<S: CacheStorage, N: Network> OfflineCache<S, N> {
    #[must_use]
    pub const fn new(manifest: AssetManifest, origin: Url, storage: S, network: N) -> Self {
        Self {
            manifest,
            origin,
            storage,
            network,
        }
    }

    #[must_use]
    pub const fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// Fetches every manifest asset and stores the successful ones in the
    /// current bucket.
    ///
    /// Failures are logged and listed in the report; they never fail the
    /// install as a whole.
    pub async fn install(&self) -> InstallReport {
        let cache_name = self.manifest.cache_name.clone();
        log::info!(
            "Caching {} resources into {cache_name}",
            self.manifest.assets.len()
        );

        let mut report = InstallReport {
            cache_name: cache_name.clone(),
            ..InstallReport::default()
        };

        if let Err(e) = self.storage.open_bucket(&cache_name).await {
            log::error!("Cache installation failed: {e}");
            report.failed = self
                .manifest
                .assets
                .iter()
                .map(|asset| (asset.clone(), e.to_string()))
                .collect();
            return report;
        }

        let bucket = cache_name.as_str();
        let results: Vec<_> = stream::iter(self.manifest.resolve(&self.origin))
            .map(|(asset, url)| async move {
                let outcome = match url {
                    Ok(url) => self.cache_one(bucket, url).await,
                    Err(e) => Err(e),
                };
                (asset, outcome)
            })
            .buffered(INSTALL_CONCURRENCY)
            .collect()
            .await;

        for (asset, outcome) in results {
            match outcome {
                Ok(url) => report.cached.push(url),
                Err(e) => {
                    log::error!("Cache installation failed for {asset}: {e}");
                    report.failed.push((asset, e.to_string()));
                }
            }
        }
        report
    }

    async fn cache_one(&self, cache_name: &str, url: Url) -> Result<String> {
        let response = self.network.fetch(&AssetRequest::get(url)).await?;
        if !response.is_success() {
            return Err(Error::Status(response.status));
        }
        self.storage.put(cache_name, &response).await?;
        Ok(response.url)
    }

    /// Deletes every bucket except the current one.
    ///
    /// Returns the names of the deleted buckets.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot list or delete buckets.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.bucket_names().await? {
            if name != self.manifest.cache_name {
                log::info!("Deleting old cache: {name}");
                self.storage.delete_bucket(&name).await?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Serves `request` from the cache, then the network.
    ///
    /// Only `GET` requests are looked up. If the network also fails, page
    /// navigations get the offline page; other requests fail.
    ///
    /// # Errors
    ///
    /// Returns the network error for non-navigation requests that could
    /// not be served.
    pub async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        if request.method == Method::GET {
            match self.storage.match_any(request.url.as_str()).await {
                Ok(Some(cached)) => {
                    log::debug!("Serving {} from cache", request.url);
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Cache lookup failed for {}: {e}", request.url),
            }
        }

        match self.network.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if request.is_navigation() => {
                log::warn!("Navigation to {} failed ({e}), serving offline page", request.url);
                Ok(offline_response(request.url.as_str()))
            }
            Err(e) => Err(e),
        }
    }

    /// Background-sync hook. Currently only logs.
    pub fn sync(&self, tag: &str) {
        if tag == "background-sync" {
            log::info!("Background sync triggered");
        } else {
            log::debug!("Ignoring sync tag '{tag}'");
        }
    }

    /// Push-notification hook. Currently only logs.
    pub fn push(&self, data: Option<&str>) {
        if let Some(data) = data {
            log::info!("Push message received ({} bytes)", data.len());
        }
    }
}

//! The fixed, versioned list of assets kept available offline.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bucket name for the current asset set. Bumping it invalidates older
/// buckets on the next activation.
pub const DEFAULT_CACHE_NAME: &str = "medibot-ai-v2.0.0";

/// Assets pre-cached by default. Relative paths resolve against the origin.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/static/style.css",
    "/static/enhanced-chat.js",
    "/static/manifest.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
    "https://cdn.jsdelivr.net/npm/marked/marked.min.js",
    "https://code.jquery.com/jquery-3.7.1.min.js",
];

/// Named set of asset URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManifest {
    pub cache_name: String,
    pub assets: Vec<String>,
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            assets: DEFAULT_ASSETS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl AssetManifest {
    #[must_use]
    pub fn new(cache_name: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            assets,
        }
    }

    /// Sets the bucket name.
    #[must_use]
    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = cache_name.into();
        self
    }

    /// Resolves each entry against `origin`, keeping the entry alongside
    /// its result so failures can be reported by name.
    #[must_use]
    pub fn resolve(&self, origin: &Url) -> Vec<(String, Result<Url>)> {
        self.assets
            .iter()
            .map(|asset| {
                let url = origin
                    .join(asset)
                    .map_err(|e| Error::Url(format!("{asset}: {e}")));
                (asset.clone(), url)
            })
            .collect()
    }
}

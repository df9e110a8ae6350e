//! Named cache buckets holding request/response pairs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::AssetResponse;
use crate::error::{Error, Result};

/// Abstraction over bucket storage, for testability.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of all existing buckets.
    async fn bucket_names(&self) -> Result<Vec<String>>;

    /// Creates the bucket if it does not exist.
    async fn open_bucket(&self, name: &str) -> Result<()>;

    /// Looks up `url` in one bucket.
    async fn get(&self, bucket: &str, url: &str) -> Result<Option<AssetResponse>>;

    /// Stores `response` in `bucket` under its URL, replacing any previous entry.
    async fn put(&self, bucket: &str, response: &AssetResponse) -> Result<()>;

    /// Deletes a bucket. Returns `false` if it did not exist.
    async fn delete_bucket(&self, name: &str) -> Result<bool>;

    /// Looks up `url` across all buckets, first match wins.
    async fn match_any(&self, url: &str) -> Result<Option<AssetResponse>> {
        for bucket in self.bucket_names().await? {
            if let Some(response) = self.get(&bucket, url).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
struct Bucket {
    name: String,
    entries: Vec<AssetResponse>,
}

/// In-memory [`CacheStorage`]. Buckets are matched in creation order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: Mutex<Vec<Bucket>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buckets<T>(&self, f: impl FnOnce(&mut Vec<Bucket>) -> T) -> Result<T> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| Error::Cache("storage lock poisoned".to_string()))?;
        Ok(f(&mut buckets))
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn bucket_names(&self) -> Result<Vec<String>> {
        self.with_buckets(|buckets| buckets.iter().map(|b| b.name.clone()).collect())
    }

    async fn open_bucket(&self, name: &str) -> Result<()> {
        self.with_buckets(|buckets| {
            if !buckets.iter().any(|b| b.name == name) {
                buckets.push(Bucket {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
            }
        })
    }

    async fn get(&self, bucket: &str, url: &str) -> Result<Option<AssetResponse>> {
        self.with_buckets(|buckets| {
            buckets
                .iter()
                .find(|b| b.name == bucket)
                .and_then(|b| b.entries.iter().find(|e| e.url == url))
                .cloned()
        })
    }

    async fn put(&self, bucket: &str, response: &AssetResponse) -> Result<()> {
        self.with_buckets(|buckets| {
            let Some(b) = buckets.iter_mut().find(|b| b.name == bucket) else {
                return Err(Error::Cache(format!("no such bucket: {bucket}")));
            };
            b.entries.retain(|e| e.url != response.url);
            b.entries.push(response.clone());
            Ok(())
        })?
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool> {
        self.with_buckets(|buckets| {
            let before = buckets.len();
            buckets.retain(|b| b.name != name);
            buckets.len() != before
        })
    }
}

/// Metadata stored next to each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
    stored: DateTime<Utc>,
}

/// On-disk [`CacheStorage`].
///
/// Each bucket is a directory under `root`. An entry is stored as
/// `<sha256(url)>.body` plus a `<sha256(url)>.toml` metadata file.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error::Cache(format!("invalid bucket name: {name:?}")));
        }
        Ok(self.root.join(name))
    }

    fn entry_key(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }
}

/// Writes `contents` to `path` via a temporary file and rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn bucket_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open_bucket(&self, name: &str) -> Result<()> {
        let dir = self.bucket_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn get(&self, bucket: &str, url: &str) -> Result<Option<AssetResponse>> {
        let dir = self.bucket_dir(bucket)?;
        let key = Self::entry_key(url);

        let meta = match tokio::fs::read_to_string(dir.join(format!("{key}.toml"))).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = toml::from_str(&meta)
            .map_err(|e| Error::Cache(format!("corrupt entry for {url}: {e}")))?;
        if meta.url != url {
            return Ok(None);
        }

        let body = match tokio::fs::read(dir.join(format!("{key}.body"))).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(AssetResponse {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            body: body.into(),
        }))
    }

    async fn put(&self, bucket: &str, response: &AssetResponse) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        if !tokio::fs::try_exists(&dir).await? {
            return Err(Error::Cache(format!("no such bucket: {bucket}")));
        }
        let key = Self::entry_key(&response.url);
        let meta = EntryMeta {
            url: response.url.clone(),
            status: response.status,
            content_type: response.content_type.clone(),
            stored: Utc::now(),
        };
        let meta = toml::to_string(&meta).map_err(|e| Error::Cache(e.to_string()))?;

        // Body first so a visible metadata file always has its body.
        write_atomic(&dir.join(format!("{key}.body")), &response.body).await?;
        write_atomic(&dir.join(format!("{key}.toml")), meta.as_bytes()).await?;
        log::debug!("Cached {} in {bucket}", response.url);
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool> {
        let dir = self.bucket_dir(name)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

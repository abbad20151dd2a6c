//! Listing persistence collaborators.

use crate::models::{CanonicalListing, SyncState};
use crate::normalizer::{normalize, RawRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed listing file {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid listing id '{0}'")]
    InvalidId(String),
}

/// Storage contract the publication pipeline is written against
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Load a listing by id
    async fn get(&self, id: &str) -> Result<Option<CanonicalListing>, StoreError>;

    /// Insert or replace a listing
    async fn save(&self, listing: &CanonicalListing) -> Result<(), StoreError>;

    /// All listings currently in the Pending state
    async fn find_all_pending(&self) -> Result<Vec<CanonicalListing>, StoreError>;

    /// Every listing, for reporting
    async fn list(&self) -> Result<Vec<CanonicalListing>, StoreError>;
}

/// Keeps listings in insertion order
#[derive(Default)]
pub struct InMemoryStore {
    listings: RwLock<Vec<CanonicalListing>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<CanonicalListing>, StoreError> {
        let listings = self.listings.read().await;
        Ok(listings.iter().find(|l| l.id == id).cloned())
    }

    async fn save(&self, listing: &CanonicalListing) -> Result<(), StoreError> {
        let mut listings = self.listings.write().await;
        match listings.iter_mut().find(|l| l.id == listing.id) {
            Some(existing) => *existing = listing.clone(),
            None => listings.push(listing.clone()),
        }
        Ok(())
    }

    async fn find_all_pending(&self) -> Result<Vec<CanonicalListing>, StoreError> {
        let listings = self.listings.read().await;
        Ok(listings
            .iter()
            .filter(|l| l.status.state() == SyncState::Pending)
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<CanonicalListing>, StoreError> {
        Ok(self.listings.read().await.clone())
    }
}

/// One `<id>.json` file per listing.
///
/// Files are read back through the normalizer, so records dropped into the
/// directory by other tools may use any of the known field aliases.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(path: &Path) -> Result<CanonicalListing, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawRecord =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        let mut listing = normalize(&raw);
        if listing.id.is_empty() {
            // Files without an id field are keyed by their file name
            listing.id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(listing)
    }
}

#[async_trait]
impl ListingStore for JsonDirStore {
    async fn get(&self, id: &str) -> Result<Option<CanonicalListing>, StoreError> {
        let path = self.path_for(id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read(&path).await.map(Some)
    }

    async fn save(&self, listing: &CanonicalListing) -> Result<(), StoreError> {
        let path = self.path_for(&listing.id)?;
        let json = serde_json::to_string_pretty(listing).map_err(|source| StoreError::Malformed {
            path: path.clone(),
            source,
        })?;
        // Write beside the target then rename, so a crash never leaves a torn file
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io { path, source });
        }
        debug!(listing_id = %listing.id, path = %path.display(), "Saved listing");
        Ok(())
    }

    async fn find_all_pending(&self) -> Result<Vec<CanonicalListing>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|l| l.status.state() == SyncState::Pending)
            .collect())
    }

    async fn list(&self) -> Result<Vec<CanonicalListing>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory order is unspecified; sweep in a stable order
        paths.sort();

        let mut listings = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read(&path).await {
                Ok(listing) => listings.push(listing),
                Err(StoreError::Malformed { path, source }) => {
                    warn!(path = %path.display(), "Skipping malformed listing file: {}", source)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(listings)
    }
}

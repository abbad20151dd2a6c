//! Resolves listing image references to local files the browser can upload.

use crate::models::ImageReference;
use anyhow::{bail, Context, Result};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Image reference the normalizer emits when a record has no images.
pub const PLACEHOLDER_REF: &str = "builtin:placeholder";

const PLACEHOLDER_BYTES: &[u8] = include_bytes!("../assets/placeholder.png");
const PLACEHOLDER_FILE: &str = "placeholder.png";
const DOWNLOAD_PREFIX: &str = "listing-img-";

pub struct ImageResolver {
    client: Client,
    temp_dir: PathBuf,
}

impl ImageResolver {
    /// Create a resolver that downloads into `temp_dir`, each request bounded by `timeout`
    pub fn new(temp_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let temp_dir = temp_dir.into();
        std::fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Failed to create image temp dir {}", temp_dir.display()))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, temp_dir })
    }

    /// Resolve every reference, skipping the ones that fail.
    ///
    /// Never returns an empty list: when nothing resolves the built-in
    /// placeholder is returned instead.
    pub async fn resolve(&self, references: &[String]) -> Vec<ImageReference> {
        let mut resolved = Vec::with_capacity(references.len());

        for original in references {
            if original == PLACEHOLDER_REF {
                continue;
            }
            match self.resolve_one(original).await {
                Ok(image) => {
                    debug!(image = %original, temporary = image.is_temporary, "Resolved image");
                    resolved.push(image);
                }
                Err(e) => warn!(image = %original, "Skipping image: {:#}", e),
            }
        }

        if resolved.is_empty() {
            info!("No usable images, falling back to placeholder");
            resolved.push(ImageReference::local(PLACEHOLDER_REF, self.placeholder().await));
        }

        resolved
    }

    /// Delete every temporary download. Errors are logged, never returned.
    pub async fn cleanup(&self, images: &[ImageReference]) {
        for image in images.iter().filter(|i| i.is_temporary) {
            let Some(path) = &image.resolved_local_path else {
                continue;
            };
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(image = %image.original, path = %path.display(), "Removed temporary image"),
                Err(e) => warn!(
                    image = %image.original,
                    path = %path.display(),
                    "Failed to remove temporary image: {}",
                    e
                ),
            }
        }
    }

    async fn resolve_one(&self, original: &str) -> Result<ImageReference> {
        match Url::parse(original) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let path = self.download(&url).await?;
                Ok(ImageReference::downloaded(original, path))
            }
            _ => {
                let path = PathBuf::from(original);
                let metadata = tokio::fs::metadata(&path)
                    .await
                    .with_context(|| format!("{} is not accessible", path.display()))?;
                if !metadata.is_file() {
                    bail!("{} is not a file", path.display());
                }
                Ok(ImageReference::local(original, path))
            }
        }
    }

    async fn download(&self, url: &Url) -> Result<PathBuf> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("Failed to fetch image")?;

        if !response.status().is_success() {
            bail!("Image request returned status: {}", response.status());
        }

        let bytes = response.bytes().await.context("Failed to read image body")?;

        let path = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .suffix(&extension_of(url))
            .tempfile_in(&self.temp_dir)
            .context("Failed to create temporary image file")?
            .into_temp_path()
            .keep()
            .context("Failed to persist temporary image file")?;

        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e).context("Failed to write image");
        }

        debug!(url = %url, path = %path.display(), bytes = bytes.len(), "Downloaded image");
        Ok(path)
    }

    /// Path of the built-in placeholder, written on first use
    async fn placeholder(&self) -> PathBuf {
        let path = self.temp_dir.join(PLACEHOLDER_FILE);
        if !is_file(&path).await {
            if let Err(e) = tokio::fs::write(&path, PLACEHOLDER_BYTES).await {
                warn!(path = %path.display(), "Failed to write placeholder image: {}", e);
            }
        }
        path
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Portals filter uploads by extension, so keep the one from the URL.
fn extension_of(url: &Url) -> String {
    url.path()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".jpg".to_string())
}

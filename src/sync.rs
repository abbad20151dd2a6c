//! Runs one publication attempt end to end and records its outcome.

use crate::images::ImageResolver;
use crate::models::{CanonicalListing, ImageReference, PublicationStatus, SyncState, TransitionError};
use crate::normalizer::{normalize, RawRecord};
use crate::portal::{DriverReport, PublicationDriver, SessionLauncher};
use crate::store::{ListingStore, StoreError};
use crate::validator::validate;
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to publish: a stored listing, or a raw record to store first
#[derive(Debug, Clone)]
pub enum PublishRequest {
    Id(String),
    Payload(RawRecord),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub listing_id: String,
    pub success: bool,
    pub message: String,
    pub state: SyncState,
    /// Validation errors, when the listing never reached the portal
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncOutcome {
    fn new(listing_id: &str, success: bool, message: impl Into<String>, state: SyncState) -> Self {
        Self {
            listing_id: listing_id.to_string(),
            success,
            message: message.into(),
            state,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn ListingStore>,
    resolver: ImageResolver,
    launcher: Arc<dyn SessionLauncher>,
    driver: Arc<PublicationDriver>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn ListingStore>,
        resolver: ImageResolver,
        launcher: Arc<dyn SessionLauncher>,
        driver: PublicationDriver,
    ) -> Self {
        Self {
            store,
            resolver,
            launcher,
            driver: Arc::new(driver),
        }
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Publish one listing.
    ///
    /// Store failures are returned as errors; everything else, including a
    /// failed browser run, is reported through the outcome.
    pub async fn publish(&self, request: PublishRequest) -> Result<SyncOutcome, SyncError> {
        let requested = match &request {
            PublishRequest::Id(id) => id.clone(),
            PublishRequest::Payload(_) => String::new(),
        };
        let Some(mut listing) = self.load(request).await? else {
            return Ok(SyncOutcome::new(&requested, false, "listing not found", SyncState::Pending));
        };
        let id = listing.id.clone();

        match listing.status.state() {
            SyncState::Pending => {}
            SyncState::Published => {
                return Ok(SyncOutcome::new(&id, true, "listing is already published", SyncState::Published));
            }
            SyncState::Syncing => {
                return Ok(SyncOutcome::new(&id, false, "listing is already being synced", SyncState::Syncing));
            }
            SyncState::Failed => {
                info!(listing_id = %id, "Retrying failed listing on explicit request");
                listing.status.reset()?;
                self.store.save(&listing).await?;
            }
        }

        let report = validate(&listing);
        if !report.is_valid {
            info!(listing_id = %id, errors = ?report.errors, "Listing failed validation");
            let mut outcome = SyncOutcome::new(
                &id,
                false,
                format!("validation failed: {}", report.errors.join("; ")),
                SyncState::Pending,
            );
            outcome.errors = report.errors;
            outcome.warnings = report.warnings;
            return Ok(outcome);
        }

        listing.status.begin_sync()?;
        self.store.save(&listing).await?;
        info!(listing_id = %id, "Publishing listing...");

        let attempt = self.attempt(&listing).await;

        let outcome = match attempt {
            Ok(driver_report) => {
                listing.status.mark_published(Utc::now())?;
                let message = if driver_report.confirmed {
                    "listing published".to_string()
                } else {
                    "listing submitted; success indicator not found".to_string()
                };
                let mut outcome = SyncOutcome::new(&id, true, message, SyncState::Published);
                outcome.warnings = report.warnings.into_iter().chain(driver_report.warnings).collect();
                outcome
            }
            Err(message) => {
                listing.status.mark_failed(message.clone())?;
                SyncOutcome::new(&id, false, message, SyncState::Failed)
            }
        };
        self.store.save(&listing).await?;

        info!(listing_id = %id, success = outcome.success, "{}", outcome.message);
        Ok(outcome)
    }

    /// Manually move a Failed or Published listing back to Pending.
    ///
    /// With `force`, a listing stuck in Syncing is released as well. Only use
    /// it when no attempt for the listing is still running.
    pub async fn reset(&self, id: &str, force: bool) -> Result<Option<CanonicalListing>, SyncError> {
        let Some(mut listing) = self.store.get(id).await? else {
            return Ok(None);
        };
        if force && listing.status.state() == SyncState::Syncing {
            warn!(listing_id = %id, "Releasing listing stuck in Syncing");
            listing.status.abandon_sync()?;
        } else {
            listing.status.reset()?;
        }
        self.store.save(&listing).await?;
        info!(listing_id = %id, "Listing reset to Pending");
        Ok(Some(listing))
    }

    async fn load(&self, request: PublishRequest) -> Result<Option<CanonicalListing>, StoreError> {
        match request {
            PublishRequest::Id(id) => Ok(self
                .store
                .get(&id)
                .await?
                .map(|stored| normalize(&stored.to_raw()))),
            PublishRequest::Payload(raw) => {
                let mut listing = normalize(&raw);
                if listing.id.is_empty() {
                    listing.id = Uuid::new_v4().to_string();
                }
                // Payloads update content; the state stays with the stored record
                listing.status = match self.store.get(&listing.id).await? {
                    Some(existing) => existing.status,
                    None => PublicationStatus::default(),
                };
                self.store.save(&listing).await?;
                debug!(listing_id = %listing.id, "Stored inline payload");
                Ok(Some(listing))
            }
        }
    }

    /// Resolve images, drive the portal, then clean up whatever happened
    async fn attempt(&self, listing: &CanonicalListing) -> Result<DriverReport, String> {
        let images = self.resolver.resolve(&listing.images).await;
        let result = self.drive(listing, &images).await;
        self.resolver.cleanup(&images).await;
        result
    }

    async fn drive(&self, listing: &CanonicalListing, images: &[ImageReference]) -> Result<DriverReport, String> {
        let paths: Vec<PathBuf> = images
            .iter()
            .filter_map(|i| i.resolved_local_path.clone())
            .collect();
        let launcher = Arc::clone(&self.launcher);
        let driver = Arc::clone(&self.driver);
        let listing = listing.clone();

        // The session is created and dropped on the blocking thread, so the
        // browser and its profile directory go away even if a step panics.
        let task = tokio::task::spawn_blocking(move || -> Result<DriverReport, String> {
            let mut session = launcher.launch().map_err(|e| format!("{:#}", e))?;
            let profile = session.profile_dir().to_path_buf();
            let result = driver.run(session.as_mut(), &listing, &paths);
            drop(session);
            debug!(profile = %profile.display(), "Browser session closed");
            result.map_err(|e| {
                debug!(listing_id = %listing.id, step = %e.step, "Attempt aborted");
                e.to_string()
            })
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Publication task did not complete: {}", e);
                Err(format!("publication task aborted: {e}"))
            }
        }
    }
}

//! Periodic sweep over Pending listings.

use crate::models::SyncState;
use crate::store::StoreError;
use crate::sync::{PublishRequest, SyncOrchestrator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub listing_id: String,
    pub status: SyncState,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub total_processed: usize,
    pub results: Vec<SweepEntry>,
}

pub struct AutoSyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
}

impl AutoSyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Publish every Pending listing, one after another, in fetch order.
    ///
    /// Only a failure to list Pending listings aborts the sweep; a failure on
    /// any single listing is recorded and the sweep moves on.
    pub async fn run_sweep(&self) -> Result<SweepResult, StoreError> {
        let pending = self.orchestrator.store().find_all_pending().await?;
        info!(count = pending.len(), "Starting auto-sync sweep");

        let mut result = SweepResult::default();
        for listing in pending {
            let entry = match self
                .orchestrator
                .publish(PublishRequest::Id(listing.id.clone()))
                .await
            {
                Ok(outcome) => SweepEntry {
                    listing_id: listing.id,
                    status: outcome.state,
                    success: outcome.success,
                    message: outcome.message,
                },
                Err(e) => {
                    warn!(listing_id = %listing.id, "Sync failed: {}", e);
                    let status = self.stored_state(&listing.id).await.unwrap_or(listing.status.state());
                    SweepEntry {
                        listing_id: listing.id,
                        status,
                        success: false,
                        message: e.to_string(),
                    }
                }
            };
            result.results.push(entry);
        }
        result.total_processed = result.results.len();

        let published = result.results.iter().filter(|r| r.success).count();
        info!(
            total = result.total_processed,
            published,
            failed = result.total_processed - published,
            "Auto-sync sweep finished"
        );
        Ok(result)
    }

    /// State as last persisted, when the store can still be read
    async fn stored_state(&self, id: &str) -> Option<SyncState> {
        match self.orchestrator.store().get(id).await {
            Ok(listing) => listing.map(|l| l.status.state()),
            Err(e) => {
                warn!(listing_id = %id, "Could not re-read listing: {}", e);
                None
            }
        }
    }

    /// Sweep now and then on every interval until stopped
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // A sweep can outlast the interval while it waits on OTP entry
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = self.interval.as_secs(), "Auto-sync scheduler started");
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = self.run_sweep().await {
                    error!("Auto-sync sweep failed: {}", e);
                }
            }
            info!("Auto-sync scheduler stopped");
        });

        SchedulerHandle { token, task }
    }
}

pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking. A sweep already in progress is allowed to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageResolver;
    use crate::models::CanonicalListing;
    use crate::portal::fake::{FakeLauncher, FakeOp};
    use crate::portal::{PortalLayout, PublicationDriver};
    use crate::store::{InMemoryStore, ListingStore};
    use crate::sync::tests::Harness;
    use async_trait::async_trait;

    /// Refuses to persist one listing once it reaches Syncing
    struct BrokenSaveStore {
        inner: InMemoryStore,
        broken_id: &'static str,
    }

    #[async_trait]
    impl ListingStore for BrokenSaveStore {
        async fn get(&self, id: &str) -> Result<Option<CanonicalListing>, StoreError> {
            self.inner.get(id).await
        }

        async fn save(&self, listing: &CanonicalListing) -> Result<(), StoreError> {
            if listing.id == self.broken_id && listing.status.state() == SyncState::Syncing {
                return Err(StoreError::Io {
                    path: format!("{}.json", listing.id).into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.save(listing).await
        }

        async fn find_all_pending(&self) -> Result<Vec<CanonicalListing>, StoreError> {
            self.inner.find_all_pending().await
        }

        async fn list(&self) -> Result<Vec<CanonicalListing>, StoreError> {
            self.inner.list().await
        }
    }

    #[tokio::test]
    async fn sweep_continues_past_a_failure_and_keeps_order() {
        let harness = Harness::new(|root| {
            FakeLauncher::new(root)
                .plan(vec![])
                .plan(vec![(FakeOp::Submit, "network timeout")])
                .plan(vec![])
        })
        .await;
        for id in ["first", "second", "third"] {
            harness.store.save(&harness.listing(id, "/img.jpg")).await.unwrap();
        }
        let scheduler = AutoSyncScheduler::new(Arc::clone(&harness.orchestrator), Duration::from_secs(1800));

        let sweep = scheduler.run_sweep().await.unwrap();

        assert_eq!(sweep.total_processed, 3);
        let ids: Vec<_> = sweep.results.iter().map(|r| r.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        let states: Vec<_> = sweep.results.iter().map(|r| r.status).collect();
        assert_eq!(
            states,
            vec![SyncState::Published, SyncState::Failed, SyncState::Published]
        );
        assert_eq!(sweep.results[1].message, "network timeout");
        assert_eq!(harness.state_of("first").await.state(), SyncState::Published);
        assert_eq!(harness.state_of("second").await.state(), SyncState::Failed);
        assert_eq!(harness.state_of("third").await.state(), SyncState::Published);
    }

    #[tokio::test]
    async fn failed_listings_are_not_swept_again() {
        let harness =
            Harness::new(|root| FakeLauncher::new(root).plan(vec![(FakeOp::Upload, "rejected")])).await;
        harness.store.save(&harness.listing("only", "/img.jpg")).await.unwrap();
        let scheduler = AutoSyncScheduler::new(Arc::clone(&harness.orchestrator), Duration::from_secs(60));

        assert_eq!(scheduler.run_sweep().await.unwrap().total_processed, 1);
        assert_eq!(scheduler.run_sweep().await.unwrap(), SweepResult::default());
        assert_eq!(harness.launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn start_sweeps_immediately_and_stops_cleanly() {
        let harness = Harness::new(FakeLauncher::new).await;
        harness.store.save(&harness.listing("now", "/img.jpg")).await.unwrap();
        let scheduler = Arc::new(AutoSyncScheduler::new(
            Arc::clone(&harness.orchestrator),
            Duration::from_secs(3600),
        ));

        let handle = scheduler.start();
        for _ in 0..200 {
            if harness.state_of("now").await.state() == SyncState::Published {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await;

        assert_eq!(harness.state_of("now").await.state(), SyncState::Published);
        assert_eq!(harness.launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn store_errors_report_the_state_actually_stored() {
        let harness = Harness::new(FakeLauncher::new).await;
        let store = Arc::new(BrokenSaveStore {
            inner: InMemoryStore::new(),
            broken_id: "second",
        });
        for id in ["first", "second"] {
            store.save(&harness.listing(id, "/img.jpg")).await.unwrap();
        }
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            ImageResolver::new(harness.dir.path().join("images"), Duration::from_secs(30)).unwrap(),
            harness.launcher.clone(),
            PublicationDriver::new(PortalLayout::default(), Duration::ZERO).with_settle_delay(Duration::ZERO),
        ));
        let scheduler = AutoSyncScheduler::new(orchestrator, Duration::from_secs(60));

        let sweep = scheduler.run_sweep().await.unwrap();

        assert_eq!(sweep.total_processed, 2);
        assert_eq!(sweep.results[0].status, SyncState::Published);
        let broken = &sweep.results[1];
        assert!(!broken.success);
        assert_eq!(broken.status, SyncState::Pending);
        assert!(broken.message.contains("disk full"), "{}", broken.message);
        let stored = store.get("second").await.unwrap().unwrap();
        assert_eq!(stored.status.state(), SyncState::Pending);
    }
}

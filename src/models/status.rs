use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Publication state of a listing on the portal
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SyncState {
    #[default]
    Pending,
    Syncing,
    Published,
    Failed,
}

/// Stored for Failed records that arrive without an error message
pub const UNRECORDED_ERROR: &str = "failure reason not recorded";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status transition from {from} to {to}")]
pub struct TransitionError {
    pub from: SyncState,
    pub to: SyncState,
}

/// Status sub-record carried by every listing.
///
/// Fields are only changed through the transition methods so that
/// `published_at` is set exactly when the state is `Published` and
/// `last_error` is set exactly when the state is `Failed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicationStatus {
    state: SyncState,
    last_error: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl PublicationStatus {
    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Pending -> Syncing
    pub fn begin_sync(&mut self) -> Result<(), TransitionError> {
        self.transition(SyncState::Pending, SyncState::Syncing)?;
        Ok(())
    }

    /// Syncing -> Published, stamped with `at`
    pub fn mark_published(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(SyncState::Syncing, SyncState::Published)?;
        self.published_at = Some(at);
        Ok(())
    }

    /// Syncing -> Failed, recording the error text
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(SyncState::Syncing, SyncState::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Manual reset of a terminal state back to Pending.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SyncState::Failed | SyncState::Published => {
                self.state = SyncState::Pending;
                self.last_error = None;
                self.published_at = None;
                Ok(())
            }
            from => Err(TransitionError {
                from,
                to: SyncState::Pending,
            }),
        }
    }

    /// Syncing -> Pending, for an attempt that died without recording an outcome
    pub fn abandon_sync(&mut self) -> Result<(), TransitionError> {
        self.transition(SyncState::Syncing, SyncState::Pending)
    }

    /// Rebuilds a status from loosely typed parts, repairing fields that
    /// contradict the state.
    ///
    /// A Published claim without a publish time cannot be trusted and comes
    /// back as Pending. A Failed state without a message gets a stand-in one.
    pub fn from_parts(
        state: SyncState,
        last_error: Option<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        match state {
            SyncState::Published if published_at.is_none() => Self::default(),
            SyncState::Failed => Self {
                state,
                last_error: Some(last_error.unwrap_or_else(|| UNRECORDED_ERROR.to_string())),
                published_at: None,
            },
            _ => Self {
                state,
                last_error: None,
                published_at: published_at.filter(|_| state == SyncState::Published),
            },
        }
    }

    fn transition(&mut self, from: SyncState, to: SyncState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.last_error = None;
        self.published_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_stamps_publish_time() {
        let mut status = PublicationStatus::default();
        assert_eq!(status.state(), SyncState::Pending);

        status.begin_sync().unwrap();
        assert_eq!(status.state(), SyncState::Syncing);

        let now = Utc::now();
        status.mark_published(now).unwrap();
        assert_eq!(status.state(), SyncState::Published);
        assert_eq!(status.published_at(), Some(now));
        assert_eq!(status.last_error(), None);
    }

    #[test]
    fn failure_records_and_reset_clears_error() {
        let mut status = PublicationStatus::default();
        status.begin_sync().unwrap();
        status.mark_failed("network timeout").unwrap();
        assert_eq!(status.state(), SyncState::Failed);
        assert_eq!(status.last_error(), Some("network timeout"));
        assert_eq!(status.published_at(), None);

        status.reset().unwrap();
        assert_eq!(status.state(), SyncState::Pending);
        assert_eq!(status.last_error(), None);
    }

    #[test]
    fn only_documented_transitions_are_allowed() {
        let mut pending = PublicationStatus::default();
        assert!(pending.mark_published(Utc::now()).is_err());
        assert!(pending.mark_failed("x").is_err());
        assert!(pending.reset().is_err());

        let mut syncing = PublicationStatus::default();
        syncing.begin_sync().unwrap();
        assert!(syncing.begin_sync().is_err());
        assert!(syncing.reset().is_err());

        let mut failed = syncing.clone();
        failed.mark_failed("boom").unwrap();
        let err = failed.begin_sync().unwrap_err();
        assert_eq!(err.from, SyncState::Failed);
        assert!(failed.mark_published(Utc::now()).is_err());
        assert_eq!(failed.state(), SyncState::Failed);

        let mut published = syncing;
        published.mark_published(Utc::now()).unwrap();
        assert!(published.begin_sync().is_err());
        assert!(published.mark_failed("late").is_err());
        assert_eq!(published.state(), SyncState::Published);
    }

    #[test]
    fn abandon_sync_only_leaves_syncing() {
        let mut status = PublicationStatus::default();
        assert!(status.abandon_sync().is_err());

        status.begin_sync().unwrap();
        status.abandon_sync().unwrap();
        assert_eq!(status, PublicationStatus::default());

        status.begin_sync().unwrap();
        status.mark_failed("boom").unwrap();
        assert!(status.abandon_sync().is_err());
        assert_eq!(status.state(), SyncState::Failed);
    }

    #[test]
    fn from_parts_drops_contradicting_fields() {
        let status =
            PublicationStatus::from_parts(SyncState::Pending, Some("stale".into()), Some(Utc::now()));
        assert_eq!(status.last_error(), None);
        assert_eq!(status.published_at(), None);
    }

    #[test]
    fn from_parts_never_yields_published_without_a_time() {
        let status = PublicationStatus::from_parts(SyncState::Published, None, None);
        assert_eq!(status, PublicationStatus::default());

        let at = Utc::now();
        let status = PublicationStatus::from_parts(SyncState::Published, None, Some(at));
        assert_eq!(status.state(), SyncState::Published);
        assert_eq!(status.published_at(), Some(at));
    }

    #[test]
    fn from_parts_gives_failed_a_message() {
        let status = PublicationStatus::from_parts(SyncState::Failed, None, Some(Utc::now()));
        assert_eq!(status.state(), SyncState::Failed);
        assert_eq!(status.last_error(), Some(UNRECORDED_ERROR));
        assert_eq!(status.published_at(), None);
    }
}

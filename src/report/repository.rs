//! Collaborator seams of the pipeline: the data store and the authorization
//! policy. PostgreSQL implementations live in `crate::db`.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::loader::ReportWindow;
use super::models::{Activity, Course, Evidence, ParticipantRole};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Source of report data.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Open a read-only view over the store. Every read of one report goes
    /// through the same snapshot.
    async fn begin_read(&self) -> Result<Box<dyn ReportSnapshot>, RepositoryError>;
}

/// Read-only unit of work over the data store.
#[async_trait]
pub trait ReportSnapshot: Send {
    async fn find_course_by_id(&mut self, id: i64) -> Result<Option<Course>, RepositoryError>;

    async fn find_activity_by_id(&mut self, id: i64) -> Result<Option<Activity>, RepositoryError>;

    /// Published activities of the course admitted by `window`, ordered by
    /// category name, realization date, then activity name.
    async fn find_activities_for_report(
        &mut self,
        course_id: i64,
        window: &ReportWindow,
    ) -> Result<Vec<Activity>, RepositoryError>;

    /// All evidence of the given activities in one round trip, ordered by
    /// (order, id).
    async fn find_evidence_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
    ) -> Result<Vec<Evidence>, RepositoryError>;

    /// Participant links per activity restricted to `roles`. Activities with
    /// no matching link may be missing from the map.
    async fn count_participants_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
        roles: &[ParticipantRole],
    ) -> Result<HashMap<i64, i64>, RepositoryError>;

    /// Close the snapshot.
    async fn finish(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// External authorization decisions.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn can_access_course(&self, user: &str, course_id: i64) -> Result<bool, RepositoryError>;

    async fn can_edit_activity(&self, user: &str, activity_id: i64)
        -> Result<bool, RepositoryError>;
}

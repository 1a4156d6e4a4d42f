//! Access gate. Runs before any evidence is touched.

use super::error::ReportError;
use super::repository::AccessPolicy;

/// Reject blank or absent identities outright.
pub fn require_identity(requester: Option<&str>) -> Result<&str, ReportError> {
    match requester.map(str::trim) {
        Some(user) if !user.is_empty() => Ok(user),
        _ => {
            log::warn!("Report request without requester identity rejected");
            Err(ReportError::forbidden())
        }
    }
}

pub async fn authorize_course(
    policy: &dyn AccessPolicy,
    requester: &str,
    course_id: i64,
) -> Result<(), ReportError> {
    if policy.can_access_course(requester, course_id).await? {
        Ok(())
    } else {
        log::warn!(
            "User '{}' denied report access to course {}",
            requester,
            course_id
        );
        Err(ReportError::forbidden())
    }
}

pub async fn authorize_activity(
    policy: &dyn AccessPolicy,
    requester: &str,
    activity_id: i64,
) -> Result<(), ReportError> {
    if policy.can_edit_activity(requester, activity_id).await? {
        Ok(())
    } else {
        log::warn!(
            "User '{}' denied report access to activity {}",
            requester,
            activity_id
        );
        Err(ReportError::forbidden())
    }
}

//! Data loading stage: entity lookups and the bulk fetches a course report
//! needs.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::error::ReportError;
use super::models::{Activity, Course, Evidence, COUNTED_ROLES};
use super::repository::ReportSnapshot;

/// Selection criteria of a course report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Allowed category ids. `None` admits every category.
    pub category_ids: Option<Vec<i64>>,
}

impl ReportWindow {
    /// An empty allow-list is treated as no filter.
    pub fn new(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        category_ids: Option<Vec<i64>>,
    ) -> Self {
        let category_ids = category_ids.filter(|ids| !ids.is_empty());
        Self {
            start,
            end,
            category_ids,
        }
    }

    /// Whether `activity` belongs in a course report built with this window.
    ///
    /// Unpublished activities never do. Otherwise the activity's span
    /// `[realization_date, effective_end]` must overlap `[start, end]`, and
    /// its category must be on the allow-list when one is given.
    pub fn admits(&self, activity: &Activity) -> bool {
        if !activity.published {
            return false;
        }
        if let Some(start) = self.start {
            if activity.effective_end() < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if activity.realization_date > end {
                return false;
            }
        }
        match &self.category_ids {
            Some(ids) => ids.contains(&activity.category.id),
            None => true,
        }
    }
}

/// Course report order: category name, realization date, activity name.
pub fn report_order(a: &Activity, b: &Activity) -> Ordering {
    a.category
        .name
        .cmp(&b.category.name)
        .then(a.realization_date.cmp(&b.realization_date))
        .then_with(|| a.name.cmp(&b.name))
}

/// Everything a course report reads from the store.
#[derive(Debug)]
pub struct CourseReportData {
    pub course: Course,
    pub activities: Vec<Activity>,
    pub evidence: HashMap<i64, Vec<Evidence>>,
    pub participants: HashMap<i64, i64>,
}

pub async fn load_course(
    snapshot: &mut dyn ReportSnapshot,
    course_id: i64,
) -> Result<Course, ReportError> {
    snapshot
        .find_course_by_id(course_id)
        .await?
        .ok_or_else(|| ReportError::NotFound(format!("Course {} not found", course_id)))
}

pub async fn load_activity(
    snapshot: &mut dyn ReportSnapshot,
    activity_id: i64,
) -> Result<Activity, ReportError> {
    snapshot
        .find_activity_by_id(activity_id)
        .await?
        .ok_or_else(|| ReportError::NotFound(format!("Activity {} not found", activity_id)))
}

/// Activity set of a course report plus its evidence and participant counts.
///
/// Evidence and counts are fetched with one query each, whatever the number
/// of activities.
pub async fn load_course_activities(
    snapshot: &mut dyn ReportSnapshot,
    course: Course,
    window: &ReportWindow,
) -> Result<CourseReportData, ReportError> {
    let activities = snapshot
        .find_activities_for_report(course.id, window)
        .await?;
    let ids: Vec<i64> = activities.iter().map(|a| a.id).collect();
    let (evidence, participants) = load_attachments(snapshot, &ids).await?;

    log::debug!(
        "Loaded {} activities for course {} ({} with evidence)",
        activities.len(),
        course.id,
        evidence.len()
    );

    Ok(CourseReportData {
        course,
        activities,
        evidence,
        participants,
    })
}

/// Bulk-fetch evidence and participant counts for `activity_ids`.
pub async fn load_attachments(
    snapshot: &mut dyn ReportSnapshot,
    activity_ids: &[i64],
) -> Result<(HashMap<i64, Vec<Evidence>>, HashMap<i64, i64>), ReportError> {
    if activity_ids.is_empty() {
        return Ok((HashMap::new(), HashMap::new()));
    }
    let evidence = snapshot.find_evidence_by_activity_ids(activity_ids).await?;
    let participants = snapshot
        .count_participants_by_activity_ids(activity_ids, &COUNTED_ROLES)
        .await?;
    Ok((group_evidence_by_activity(evidence), participants))
}

/// Partition evidence by owning activity, keeping the incoming order within
/// each activity.
pub fn group_evidence_by_activity(evidence: Vec<Evidence>) -> HashMap<i64, Vec<Evidence>> {
    let mut grouped: HashMap<i64, Vec<Evidence>> = HashMap::new();
    for item in evidence {
        grouped.entry(item.activity_id).or_default().push(item);
    }
    grouped
}

//! Read-only records the report pipeline is built from.
//!
//! Records reference each other by id only (an activity knows its course id
//! and carries its category by value); nothing points back up the tree.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub type_name: Option<String>,
    pub academic_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub objective: Option<String>,
    pub target_audience: Option<String>,
    pub coordinator_name: Option<String>,
    pub realization_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub published: bool,
    pub category: Category,
    pub course_id: i64,
    pub funding_sources: Vec<String>,
}

impl Activity {
    /// Last day the activity runs: its end date, or the realization date when
    /// it has none.
    pub fn effective_end(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.realization_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: i64,
    pub caption: Option<String>,
    pub order: Option<i32>,
    /// Path relative to the storage root, as stored at upload time.
    pub file_path: String,
    pub activity_id: i64,
}

/// Role a person holds on an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantRole {
    Participant,
    ScholarshipHolder,
    Volunteer,
    Coordinator,
    Speaker,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participant => "PARTICIPANT",
            Self::ScholarshipHolder => "SCHOLARSHIP_HOLDER",
            Self::Volunteer => "VOLUNTEER",
            Self::Coordinator => "COORDINATOR",
            Self::Speaker => "SPEAKER",
        }
    }
}

/// Roles that count towards an activity's participant total.
pub const COUNTED_ROLES: [ParticipantRole; 4] = [
    ParticipantRole::Participant,
    ParticipantRole::ScholarshipHolder,
    ParticipantRole::Volunteer,
    ParticipantRole::Coordinator,
];

/// Parameters of a course-level report.
#[derive(Debug, Clone, Default)]
pub struct CourseReportRequest {
    pub course_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category_ids: Option<Vec<i64>>,
    pub introduction: Option<String>,
    pub requester: Option<String>,
}

/// Parameters of a single-activity report.
#[derive(Debug, Clone, Default)]
pub struct ActivityReportRequest {
    pub activity_id: i64,
    pub introduction: Option<String>,
    pub requester: Option<String>,
}

/// A finished report ready to be streamed back.
#[derive(Debug)]
pub struct GeneratedReport {
    pub filename: String,
    pub pdf: Vec<u8>,
    /// Whether the output intent and PDF/A-1b metadata were attached.
    pub archival: bool,
}

pub fn course_report_filename(course_id: i64) -> String {
    format!("relatorio-curso-{}.pdf", course_id)
}

pub fn activity_report_filename(activity_id: i64) -> String {
    format!("relatorio-atividade-{}.pdf", activity_id)
}

//! Render-ready view model, built from already-loaded and materialized data.
//! Nothing in here touches the store or the filesystem.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

use super::aggregator::{sort_evidence, AggregatedActivity, Aggregation, CategoryGroup, ReportTotals};
use super::evidence::{MaterializedEvidence, Orientation};
use super::loader::ReportWindow;
use super::models::{Course, Evidence};
use super::text::{
    activity_date_label, caption_or_default, generated_at_label, normalize_text, period_label,
    report_title, split_paragraphs, status_label, MISSING_VALUE,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceBlock {
    pub evidence_id: i64,
    /// Inline data URI; absent when the file could not be read.
    pub image: Option<String>,
    pub caption: String,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityBlock {
    pub activity_id: i64,
    pub name: String,
    pub objective: Option<String>,
    pub audience: Option<String>,
    pub date_label: String,
    pub status_label: String,
    pub coordinator: String,
    /// Funding source names joined with ", ".
    pub funding_label: Option<String>,
    pub participants: i64,
    pub evidence: Vec<EvidenceBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBlock {
    pub category_id: i64,
    pub name: String,
    pub activity_count: usize,
    pub evidence_count: usize,
    pub participant_count: i64,
    pub activities: Vec<ActivityBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseReportView {
    pub title: String,
    pub academic_unit: Option<String>,
    pub description: Option<String>,
    pub period_label: String,
    pub introduction: Vec<String>,
    pub categories: Vec<CategoryBlock>,
    pub totals: ReportTotals,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReportView {
    pub course_title: String,
    pub academic_unit: Option<String>,
    pub category_name: String,
    pub introduction: Vec<String>,
    pub activity: ActivityBlock,
    pub generated_at: String,
}

pub fn build_evidence_block(
    evidence: &Evidence,
    materialized: &HashMap<i64, MaterializedEvidence>,
) -> EvidenceBlock {
    let (image, orientation) = match materialized.get(&evidence.id) {
        Some(m) => (m.data_uri.clone(), m.orientation),
        None => (None, Orientation::Unknown),
    };
    EvidenceBlock {
        evidence_id: evidence.id,
        image,
        caption: caption_or_default(evidence.caption.as_deref()),
        orientation,
    }
}

pub fn build_activity_block(
    item: &AggregatedActivity,
    materialized: &HashMap<i64, MaterializedEvidence>,
) -> ActivityBlock {
    let activity = &item.activity;

    let mut evidence = item.evidence.clone();
    sort_evidence(&mut evidence);

    let funding_sources: Vec<String> = activity
        .funding_sources
        .iter()
        .filter_map(|name| normalize_text(Some(name)))
        .collect();
    let funding_label = if funding_sources.is_empty() {
        None
    } else {
        Some(funding_sources.join(", "))
    };

    ActivityBlock {
        activity_id: activity.id,
        name: activity.name.trim().to_string(),
        objective: normalize_text(activity.objective.as_deref()),
        audience: normalize_text(activity.target_audience.as_deref()),
        date_label: activity_date_label(activity),
        status_label: status_label(activity.published).to_string(),
        coordinator: normalize_text(activity.coordinator_name.as_deref())
            .unwrap_or_else(|| MISSING_VALUE.to_string()),
        funding_label,
        participants: item.participants,
        evidence: evidence
            .iter()
            .map(|e| build_evidence_block(e, materialized))
            .collect(),
    }
}

fn build_category_block(
    group: &CategoryGroup,
    materialized: &HashMap<i64, MaterializedEvidence>,
) -> CategoryBlock {
    CategoryBlock {
        category_id: group.category.id,
        name: group.category.name.clone(),
        activity_count: group.activities.len(),
        evidence_count: group.evidence_count,
        participant_count: group.participant_count,
        activities: group
            .activities
            .iter()
            .map(|a| build_activity_block(a, materialized))
            .collect(),
    }
}

pub fn build_course_view(
    course: &Course,
    window: &ReportWindow,
    introduction: Option<&str>,
    aggregation: &Aggregation,
    materialized: &HashMap<i64, MaterializedEvidence>,
    generated_at: NaiveDateTime,
) -> CourseReportView {
    CourseReportView {
        title: report_title(course),
        academic_unit: normalize_text(course.academic_unit.as_deref()),
        description: normalize_text(course.description.as_deref()),
        period_label: period_label(window.start, window.end),
        introduction: split_paragraphs(introduction),
        categories: aggregation
            .groups
            .iter()
            .map(|g| build_category_block(g, materialized))
            .collect(),
        totals: aggregation.totals,
        generated_at: generated_at_label(generated_at),
    }
}

pub fn build_activity_view(
    course: &Course,
    item: &AggregatedActivity,
    introduction: Option<&str>,
    materialized: &HashMap<i64, MaterializedEvidence>,
    generated_at: NaiveDateTime,
) -> ActivityReportView {
    ActivityReportView {
        course_title: report_title(course),
        academic_unit: normalize_text(course.academic_unit.as_deref()),
        category_name: item.activity.category.name.clone(),
        introduction: split_paragraphs(introduction),
        activity: build_activity_block(item, materialized),
        generated_at: generated_at_label(generated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregator::aggregate;
    use crate::report::models::{Activity, Category};

    fn course() -> Course {
        Course {
            id: 4,
            name: "Agronomia".to_string(),
            description: Some("  ".to_string()),
            type_name: Some("Bacharelado".to_string()),
            academic_unit: Some("Campus Sul".to_string()),
        }
    }

    fn activity(id: i64) -> Activity {
        Activity {
            id,
            name: " Dia de campo ".to_string(),
            objective: Some(" Demonstrar técnicas ".to_string()),
            target_audience: Some("".to_string()),
            coordinator_name: None,
            realization_date: "2024-04-10".parse().unwrap(),
            end_date: Some("2024-04-12".parse().unwrap()),
            published: true,
            category: Category {
                id: 1,
                name: "Extensão".to_string(),
            },
            course_id: 4,
            funding_sources: vec!["PROEX".to_string(), " ".to_string(), "CNPq".to_string()],
        }
    }

    fn evidence(id: i64, order: Option<i32>, caption: Option<&str>) -> Evidence {
        Evidence {
            id,
            caption: caption.map(str::to_string),
            order,
            file_path: format!("{}.jpg", id),
            activity_id: 1,
        }
    }

    #[test]
    fn test_activity_block_fields() {
        let mut evidence_map = HashMap::new();
        evidence_map.insert(1, vec![evidence(2, Some(2), None), evidence(1, Some(1), Some("Abertura"))]);
        let aggregation = aggregate(vec![activity(1)], evidence_map, &HashMap::new());

        let mut materialized = HashMap::new();
        materialized.insert(
            1,
            MaterializedEvidence {
                evidence_id: 1,
                data_uri: Some("data:image/png;base64,AAAA".into()),
                orientation: Orientation::Square,
            },
        );

        let block = build_activity_block(&aggregation.groups[0].activities[0], &materialized);
        assert_eq!(block.name, "Dia de campo");
        assert_eq!(block.objective.as_deref(), Some("Demonstrar técnicas"));
        assert_eq!(block.audience, None);
        assert_eq!(block.coordinator, "Não informado");
        assert_eq!(block.date_label, "10/04/2024 a 12/04/2024");
        assert_eq!(block.funding_label.as_deref(), Some("PROEX, CNPq"));
        assert_eq!(block.evidence[0].caption, "Abertura");
        assert_eq!(block.evidence[0].orientation, Orientation::Square);
        assert_eq!(block.evidence[1].caption, "Sem legenda");
        assert_eq!(block.evidence[1].image, None);
        assert_eq!(block.evidence[1].orientation, Orientation::Unknown);
    }

    #[test]
    fn test_course_view_copies_totals() {
        let aggregation = aggregate(vec![activity(1)], HashMap::new(), &HashMap::new());
        let at = "2024-06-01".parse::<chrono::NaiveDate>().unwrap().and_hms_opt(9, 0, 0).unwrap();
        let view = build_course_view(
            &course(),
            &ReportWindow::default(),
            Some("Um\n\nDois"),
            &aggregation,
            &HashMap::new(),
            at,
        );
        assert_eq!(view.title, "Agronomia — Bacharelado");
        assert_eq!(view.description, None);
        assert_eq!(view.period_label, "Período não informado");
        assert_eq!(view.introduction, vec!["Um".to_string(), "Dois".to_string()]);
        assert_eq!(view.totals.activities, 1);
        assert_eq!(view.categories[0].activity_count, 1);
    }
}

//! Groups report activities by category and derives the totals.
//!
//! Every count here is a sum over the level below it, so the summary rows of
//! a report always agree with its detail rows.

use serde::Serialize;
use std::collections::HashMap;

use super::models::{Activity, Category, Evidence};

/// An activity with its evidence and participant count attached.
#[derive(Debug, Clone)]
pub struct AggregatedActivity {
    pub activity: Activity,
    /// Sorted by (order, id).
    pub evidence: Vec<Evidence>,
    pub participants: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub category: Category,
    pub activities: Vec<AggregatedActivity>,
    pub evidence_count: usize,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub activities: usize,
    pub evidence: usize,
    pub participants: i64,
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub groups: Vec<CategoryGroup>,
    pub totals: ReportTotals,
}

/// Sort evidence by (order asc, id asc). Missing orders go last, like
/// `NULLS LAST` on an ascending SQL sort.
pub fn sort_evidence(evidence: &mut [Evidence]) {
    evidence.sort_by_key(|e| (e.order.is_none(), e.order, e.id));
}

/// Attach pre-fetched evidence and the participant count to one activity.
pub fn attach(
    activity: Activity,
    evidence: &mut HashMap<i64, Vec<Evidence>>,
    participants: &HashMap<i64, i64>,
) -> AggregatedActivity {
    let mut items = evidence.remove(&activity.id).unwrap_or_default();
    sort_evidence(&mut items);
    let participants = participants.get(&activity.id).copied().unwrap_or(0);
    AggregatedActivity {
        activity,
        evidence: items,
        participants,
    }
}

/// Group `activities` (already in report order) by category id, keeping the
/// order in which categories first appear.
pub fn aggregate(
    activities: Vec<Activity>,
    mut evidence: HashMap<i64, Vec<Evidence>>,
    participants: &HashMap<i64, i64>,
) -> Aggregation {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index_by_category: HashMap<i64, usize> = HashMap::new();

    for activity in activities {
        let category_id = activity.category.id;
        let index = *index_by_category.entry(category_id).or_insert_with(|| {
            groups.push(CategoryGroup {
                category: activity.category.clone(),
                activities: Vec::new(),
                evidence_count: 0,
                participant_count: 0,
            });
            groups.len() - 1
        });
        groups[index]
            .activities
            .push(attach(activity, &mut evidence, participants));
    }

    for group in &mut groups {
        group.evidence_count = group.activities.iter().map(|a| a.evidence.len()).sum();
        group.participant_count = group.activities.iter().map(|a| a.participants).sum();
    }

    let totals = ReportTotals {
        activities: groups.iter().map(|g| g.activities.len()).sum(),
        evidence: groups.iter().map(|g| g.evidence_count).sum(),
        participants: groups.iter().map(|g| g.participant_count).sum(),
    };

    Aggregation { groups, totals }
}

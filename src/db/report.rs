//! PostgreSQL implementation of the report data store.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use crate::report::loader::ReportWindow;
use crate::report::models::{Activity, Category, Course, Evidence, ParticipantRole};
use crate::report::repository::{ReportRepository, ReportSnapshot, RepositoryError};

const SQL_READ_ONLY: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

const SQL_LOAD_COURSE_BY_ID: &str = r#"
SELECT
    c.id,
    c.name,
    c.description,
    ct.name AS type_name,
    au.name AS academic_unit
FROM courses c
LEFT JOIN course_types ct ON ct.id = c.course_type_id
LEFT JOIN academic_units au ON au.id = c.academic_unit_id
WHERE c.id = $1
"#;

const SQL_ACTIVITY_COLUMNS: &str = r#"
SELECT
    a.id,
    a.name,
    a.objective,
    a.target_audience,
    a.realization_date,
    a.end_date,
    a.published,
    a.course_id,
    cat.id AS category_id,
    cat.name AS category_name,
    (
        SELECT p.full_name
        FROM activity_people ap
        JOIN people p ON p.id = ap.person_id
        WHERE ap.activity_id = a.id AND ap.role = 'COORDINATOR'
        ORDER BY p.full_name
        LIMIT 1
    ) AS coordinator_name,
    COALESCE(
        (
            SELECT array_agg(fs.name ORDER BY fs.name)
            FROM activity_funding_sources afs
            JOIN funding_sources fs ON fs.id = afs.funding_source_id
            WHERE afs.activity_id = a.id
        ),
        ARRAY[]::text[]
    ) AS funding_sources
FROM activities a
JOIN categories cat ON cat.id = a.category_id
"#;

const SQL_ACTIVITY_BY_ID_FILTER: &str = "WHERE a.id = $1";

// $2 and $3 are the window bounds, $4 the category allow-list. NULL disables a filter.
const SQL_ACTIVITIES_FOR_REPORT_FILTER: &str = r#"
WHERE a.course_id = $1
  AND a.published
  AND ($2::date IS NULL OR COALESCE(a.end_date, a.realization_date) >= $2::date)
  AND ($3::date IS NULL OR a.realization_date <= $3::date)
  AND ($4::bigint[] IS NULL OR a.category_id = ANY($4::bigint[]))
ORDER BY cat.name ASC, a.realization_date ASC, a.name ASC
"#;

const SQL_LIST_EVIDENCE_BY_ACTIVITIES: &str = r#"
SELECT id, activity_id, file_path, caption, display_order
FROM evidences
WHERE activity_id = ANY($1)
ORDER BY display_order ASC NULLS LAST, id ASC
"#;

const SQL_COUNT_PARTICIPANTS_BY_ACTIVITIES: &str = r#"
SELECT activity_id, COUNT(*) AS participants
FROM activity_people
WHERE activity_id = ANY($1) AND role = ANY($2)
GROUP BY activity_id
"#;

#[derive(Debug, sqlx::FromRow)]
struct CourseRow {
    id: i64,
    name: String,
    description: Option<String>,
    type_name: Option<String>,
    academic_unit: Option<String>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            type_name: row.type_name,
            academic_unit: row.academic_unit,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    name: String,
    objective: Option<String>,
    target_audience: Option<String>,
    realization_date: NaiveDate,
    end_date: Option<NaiveDate>,
    published: bool,
    course_id: i64,
    category_id: i64,
    category_name: String,
    coordinator_name: Option<String>,
    funding_sources: Vec<String>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            objective: row.objective,
            target_audience: row.target_audience,
            coordinator_name: row.coordinator_name,
            realization_date: row.realization_date,
            end_date: row.end_date,
            published: row.published,
            category: Category {
                id: row.category_id,
                name: row.category_name,
            },
            course_id: row.course_id,
            funding_sources: row.funding_sources,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EvidenceRow {
    id: i64,
    activity_id: i64,
    file_path: String,
    caption: Option<String>,
    display_order: Option<i32>,
}

impl From<EvidenceRow> for Evidence {
    fn from(row: EvidenceRow) -> Self {
        Self {
            id: row.id,
            caption: row.caption,
            order: row.display_order,
            file_path: row.file_path,
            activity_id: row.activity_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantCountRow {
    activity_id: i64,
    participants: i64,
}

fn activity_query(filter: &str) -> String {
    format!("{}{}", SQL_ACTIVITY_COLUMNS, filter)
}

pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn begin_read(&self) -> Result<Box<dyn ReportSnapshot>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SQL_READ_ONLY).execute(&mut *tx).await?;
        Ok(Box::new(PgReportSnapshot { tx }))
    }
}

/// A read-only transaction; all reads of one report see the same data.
pub struct PgReportSnapshot {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReportSnapshot for PgReportSnapshot {
    async fn find_course_by_id(&mut self, id: i64) -> Result<Option<Course>, RepositoryError> {
        let row = sqlx::query_as::<_, CourseRow>(SQL_LOAD_COURSE_BY_ID)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Course::from))
    }

    async fn find_activity_by_id(&mut self, id: i64) -> Result<Option<Activity>, RepositoryError> {
        let sql = activity_query(SQL_ACTIVITY_BY_ID_FILTER);
        let row = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Activity::from))
    }

    async fn find_activities_for_report(
        &mut self,
        course_id: i64,
        window: &ReportWindow,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let sql = activity_query(SQL_ACTIVITIES_FOR_REPORT_FILTER);
        let rows = sqlx::query_as::<_, ActivityRow>(&sql)
            .bind(course_id)
            .bind(window.start)
            .bind(window.end)
            .bind(window.category_ids.clone())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Activity::from).collect())
    }

    async fn find_evidence_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
    ) -> Result<Vec<Evidence>, RepositoryError> {
        if activity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EvidenceRow>(SQL_LIST_EVIDENCE_BY_ACTIVITIES)
            .bind(activity_ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Evidence::from).collect())
    }

    async fn count_participants_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
        roles: &[ParticipantRole],
    ) -> Result<HashMap<i64, i64>, RepositoryError> {
        if activity_ids.is_empty() || roles.is_empty() {
            return Ok(HashMap::new());
        }
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, ParticipantCountRow>(SQL_COUNT_PARTICIPANTS_BY_ACTIVITIES)
            .bind(activity_ids)
            .bind(roles)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.activity_id, row.participants))
            .collect())
    }

    async fn finish(self: Box<Self>) -> Result<(), RepositoryError> {
        // Nothing was written; commit just releases the snapshot.
        self.tx.commit().await?;
        Ok(())
    }
}

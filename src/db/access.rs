//! Role based access decisions backed by the `users` and `user_courses` tables.

use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;

use crate::report::repository::{AccessPolicy, RepositoryError};

const SQL_LOAD_USER_BY_USERNAME: &str = r#"
SELECT id, role, person_id
FROM users
WHERE username = $1
"#;

const SQL_USER_HAS_COURSE: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM user_courses WHERE user_id = $1 AND course_id = $2
) AS associated
"#;

const SQL_LOAD_ACTIVITY_ACCESS_FACTS: &str = r#"
SELECT
    EXISTS (
        SELECT 1 FROM user_courses uc
        WHERE uc.user_id = $2 AND uc.course_id = a.course_id
    ) AS course_associated,
    EXISTS (
        SELECT 1 FROM activity_people ap
        WHERE ap.activity_id = a.id
          AND ap.role = 'COORDINATOR'
          AND ap.person_id = $3
    ) AS coordinates
FROM activities a
WHERE a.id = $1
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Administrator,
    CourseManager,
    ActivityCoordinator,
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMINISTRATOR" => Ok(Self::Administrator),
            "COURSE_MANAGER" => Ok(Self::CourseManager),
            "ACTIVITY_COORDINATOR" => Ok(Self::ActivityCoordinator),
            other => Err(format!("unknown user role '{}'", other)),
        }
    }
}

/// What the store knows about a user and one activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct ActivityAccessFacts {
    pub course_associated: bool,
    /// The user's person is recorded as COORDINATOR of the activity.
    pub coordinates: bool,
}

pub fn decide_course_access(role: UserRole, course_associated: bool) -> bool {
    match role {
        UserRole::Administrator => true,
        UserRole::CourseManager | UserRole::ActivityCoordinator => course_associated,
    }
}

pub fn decide_activity_edit(role: UserRole, facts: ActivityAccessFacts) -> bool {
    match role {
        UserRole::Administrator => true,
        UserRole::CourseManager => facts.course_associated,
        UserRole::ActivityCoordinator => facts.coordinates,
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    role: String,
    person_id: Option<i64>,
}

struct KnownUser {
    id: i64,
    role: UserRole,
    person_id: Option<i64>,
}

pub struct PgAccessPolicy {
    pool: PgPool,
}

impl PgAccessPolicy {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `None` for unknown users and unknown roles; both are denied.
    async fn load_user(&self, username: &str) -> Result<Option<KnownUser>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(SQL_LOAD_USER_BY_USERNAME)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            log::debug!("No user record for '{}'", username);
            return Ok(None);
        };

        match row.role.parse::<UserRole>() {
            Ok(role) => Ok(Some(KnownUser {
                id: row.id,
                role,
                person_id: row.person_id,
            })),
            Err(e) => {
                log::warn!("User '{}' has {}", username, e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl AccessPolicy for PgAccessPolicy {
    async fn can_access_course(&self, user: &str, course_id: i64) -> Result<bool, RepositoryError> {
        let Some(known) = self.load_user(user).await? else {
            return Ok(false);
        };
        if known.role == UserRole::Administrator {
            return Ok(true);
        }

        let associated: bool = sqlx::query_scalar(SQL_USER_HAS_COURSE)
            .bind(known.id)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(decide_course_access(known.role, associated))
    }

    async fn can_edit_activity(
        &self,
        user: &str,
        activity_id: i64,
    ) -> Result<bool, RepositoryError> {
        let Some(known) = self.load_user(user).await? else {
            return Ok(false);
        };
        if known.role == UserRole::Administrator {
            return Ok(true);
        }

        let facts = sqlx::query_as::<_, ActivityAccessFacts>(SQL_LOAD_ACTIVITY_ACCESS_FACTS)
            .bind(activity_id)
            .bind(known.id)
            .bind(known.person_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(facts.is_some_and(|facts| decide_activity_edit(known.role, facts)))
    }
}

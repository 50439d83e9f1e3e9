use sqlx::{FromRow, PgPool};

use super::{AssignmentListing, AssignmentOrigin, ReviewAssignment};

const ASSIGNMENT_COLUMNS: &str = "id, submission_id, user_id, origin, assigned_at, opted_out";

/// A potential reviewer and their current number of active assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ReviewerLoad {
    pub user_id: i32,
    pub load: i64,
}

pub async fn count_active_assignments(
    pool: &PgPool,
    submission_id: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM review_assignments WHERE submission_id = $1 AND opted_out = FALSE",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await
}

/// Members of the `reviewers` group eligible for a new assignment on the
/// submission, with their load.
///
/// Users already assigned to the submission (opted out or not) are excluded.
/// Users whose every assignment anywhere is an opt-out are excluded too;
/// users with no assignments at all remain eligible.
pub async fn candidate_reviewers(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<ReviewerLoad>, sqlx::Error> {
    sqlx::query_as::<_, ReviewerLoad>(
        r#"
        SELECT u.id AS user_id,
               COUNT(ra.id) FILTER (WHERE ra.opted_out = FALSE) AS load
        FROM users u
        JOIN user_groups ug ON ug.user_id = u.id
        JOIN groups g ON g.id = ug.group_id AND g.name = 'reviewers'
        LEFT JOIN review_assignments ra ON ra.user_id = u.id
        WHERE u.id NOT IN (
            SELECT user_id FROM review_assignments WHERE submission_id = $1
        )
        GROUP BY u.id
        HAVING COUNT(ra.id) = 0
            OR COUNT(ra.id) FILTER (WHERE ra.opted_out = FALSE) > 0
        "#,
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub async fn create_assignment(
    pool: &PgPool,
    submission_id: i32,
    user_id: i32,
    origin: AssignmentOrigin,
) -> Result<ReviewAssignment, sqlx::Error> {
    sqlx::query_as::<_, ReviewAssignment>(&format!(
        "INSERT INTO review_assignments (submission_id, user_id, origin) \
         VALUES ($1, $2, $3) RETURNING {ASSIGNMENT_COLUMNS}"
    ))
    .bind(submission_id)
    .bind(user_id)
    .bind(origin.code())
    .fetch_one(pool)
    .await
}

/// Looks up an assignment only if it belongs to `user_id`.
pub async fn get_assignment_for_user(
    pool: &PgPool,
    assignment_id: i32,
    user_id: i32,
) -> Result<Option<ReviewAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ReviewAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM review_assignments WHERE id = $1 AND user_id = $2"
    ))
    .bind(assignment_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Flips `opted_out` on. Returns `false` if it was already set.
pub async fn mark_opted_out(pool: &PgPool, assignment_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE review_assignments SET opted_out = TRUE WHERE id = $1 AND opted_out = FALSE",
    )
    .bind(assignment_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_assignments_for_submission(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<ReviewAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ReviewAssignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM review_assignments \
         WHERE submission_id = $1 ORDER BY assigned_at, id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub async fn list_active_assignments_for_user(
    pool: &PgPool,
    user_id: i32,
) -> Result<Vec<AssignmentListing>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentListing>(
        r#"
        SELECT ra.id, ra.submission_id, s.title AS submission_title, k.name AS kind_name,
               ra.origin, ra.assigned_at
        FROM review_assignments ra
        JOIN submissions s ON s.id = ra.submission_id
        JOIN submission_kinds k ON k.id = s.kind_id
        WHERE ra.user_id = $1 AND ra.opted_out = FALSE
        ORDER BY ra.assigned_at, ra.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

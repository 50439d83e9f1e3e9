use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{ResultAction, ResultStatus, Submission, SubmissionKind, SubmissionResult};

const SUBMISSION_SELECT: &str = "\
    SELECT s.id, s.kind_id, k.name AS kind_name, k.slug AS kind_slug, \
           s.submitter_id, u.username AS submitter_username, u.email AS submitter_email, \
           s.title, s.details, s.submitted, s.cancelled, r.status AS result_status \
    FROM submissions s \
    JOIN submission_kinds k ON k.id = s.kind_id \
    JOIN users u ON u.id = s.submitter_id \
    LEFT JOIN submission_results r ON r.submission_id = s.id";

/// Which slice of submissions a reviewer list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewFilter {
    All,
    ReviewedBy(i32),
    /// Not reviewed by the user and not submitted by them either.
    NotReviewedBy(i32),
}

pub async fn list_kinds(pool: &PgPool) -> Result<Vec<SubmissionKind>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionKind>("SELECT id, name, slug FROM submission_kinds ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn get_kind_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<SubmissionKind>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionKind>("SELECT id, name, slug FROM submission_kinds WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn create_submission(
    pool: &PgPool,
    kind_id: i32,
    submitter_id: i32,
    title: &str,
    details: &serde_json::Value,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO submissions (kind_id, submitter_id, title, details)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(kind_id)
    .bind(submitter_id)
    .bind(title)
    .bind(details)
    .fetch_one(pool)
    .await
}

pub async fn get_submission(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("{SUBMISSION_SELECT} WHERE s.id = $1"))
        .bind(submission_id)
        .fetch_optional(pool)
        .await
}

/// Looks up a submission only if `submitter_id` owns it.
pub async fn get_submission_for_submitter(
    pool: &PgPool,
    submission_id: i32,
    submitter_id: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "{SUBMISSION_SELECT} WHERE s.id = $1 AND s.submitter_id = $2"
    ))
    .bind(submission_id)
    .bind(submitter_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_submission(
    pool: &PgPool,
    submission_id: i32,
    title: &str,
    details: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET title = $2, details = $3 WHERE id = $1")
        .bind(submission_id)
        .bind(title)
        .bind(details)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn cancel_submission(pool: &PgPool, submission_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET cancelled = TRUE WHERE id = $1")
        .bind(submission_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_for_submitter(
    pool: &PgPool,
    submitter_id: i32,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "{SUBMISSION_SELECT} WHERE s.submitter_id = $1 ORDER BY s.submitted DESC"
    ))
    .bind(submitter_id)
    .fetch_all(pool)
    .await
}

pub async fn list_active_submission_ids(pool: &PgPool) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM submissions WHERE cancelled = FALSE ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Submissions for the reviewer lists. With `assigned_to` set, only
/// submissions the user holds an active assignment on are included.
pub async fn list_for_review(
    pool: &PgPool,
    filter: ReviewFilter,
    assigned_to: Option<i32>,
) -> Result<Vec<Submission>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SUBMISSION_SELECT);
    qb.push(" WHERE TRUE");

    if let Some(user_id) = assigned_to {
        qb.push(
            " AND s.id IN (SELECT submission_id FROM review_assignments \
             WHERE opted_out = FALSE AND user_id = ",
        );
        qb.push_bind(user_id);
        qb.push(")");
    }

    match filter {
        ReviewFilter::All => {}
        ReviewFilter::ReviewedBy(user_id) => {
            qb.push(" AND EXISTS (SELECT 1 FROM reviews rv WHERE rv.submission_id = s.id AND rv.user_id = ");
            qb.push_bind(user_id);
            qb.push(")");
        }
        ReviewFilter::NotReviewedBy(user_id) => {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM reviews rv WHERE rv.submission_id = s.id AND rv.user_id = ");
            qb.push_bind(user_id);
            qb.push(") AND s.submitter_id <> ");
            qb.push_bind(user_id);
        }
    }

    qb.push(" ORDER BY s.submitted");
    qb.build_query_as::<Submission>().fetch_all(pool).await
}

pub async fn list_by_status(
    pool: &PgPool,
    status: ResultStatus,
    only_ids: Option<&[i32]>,
) -> Result<Vec<Submission>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SUBMISSION_SELECT);
    qb.push(" WHERE r.status = ");
    qb.push_bind(status.as_str());
    if let Some(ids) = only_ids {
        qb.push(" AND s.id = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(")");
    }
    qb.push(" ORDER BY s.id");
    qb.build_query_as::<Submission>().fetch_all(pool).await
}

/// Creates the missing result rows for the given submissions.
pub async fn ensure_results(pool: &PgPool, submission_ids: &[i32]) -> Result<(), sqlx::Error> {
    if submission_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO submission_results (submission_id)
        SELECT unnest($1::int4[])
        ON CONFLICT (submission_id) DO NOTHING
        "#,
    )
    .bind(submission_ids)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_or_create_result(
    pool: &PgPool,
    submission_id: i32,
) -> Result<SubmissionResult, sqlx::Error> {
    ensure_results(pool, &[submission_id]).await?;
    sqlx::query_as::<_, SubmissionResult>(
        "SELECT id, submission_id, status FROM submission_results WHERE submission_id = $1",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await
}

/// Sets the status unconditionally; every transition is allowed.
pub async fn set_result_status(
    pool: &PgPool,
    submission_id: i32,
    status: ResultStatus,
) -> Result<SubmissionResult, sqlx::Error> {
    sqlx::query_as::<_, SubmissionResult>(
        r#"
        INSERT INTO submission_results (submission_id, status)
        VALUES ($1, $2)
        ON CONFLICT (submission_id) DO UPDATE SET status = EXCLUDED.status
        RETURNING id, submission_id, status
        "#,
    )
    .bind(submission_id)
    .bind(status.as_str())
    .fetch_one(pool)
    .await
}

pub async fn accept(pool: &PgPool, submission_id: i32) -> Result<SubmissionResult, sqlx::Error> {
    set_result_status(pool, submission_id, ResultStatus::Accepted).await
}

pub async fn reject(pool: &PgPool, submission_id: i32) -> Result<SubmissionResult, sqlx::Error> {
    set_result_status(pool, submission_id, ResultStatus::Rejected).await
}

pub async fn undecide(pool: &PgPool, submission_id: i32) -> Result<SubmissionResult, sqlx::Error> {
    set_result_status(pool, submission_id, ResultStatus::Undecided).await
}

pub async fn standby(pool: &PgPool, submission_id: i32) -> Result<SubmissionResult, sqlx::Error> {
    set_result_status(pool, submission_id, ResultStatus::Standby).await
}

/// Applies a named decision. Unknown action names leave the result untouched.
pub async fn update_result(
    pool: &PgPool,
    submission_id: i32,
    action: &str,
) -> Result<Option<SubmissionResult>, sqlx::Error> {
    match ResultAction::parse(action) {
        Some(action) => Ok(Some(
            set_result_status(pool, submission_id, action.target()).await?,
        )),
        None => Ok(None),
    }
}

/// Email addresses of everyone who reviewed or messaged on the submission,
/// other than `except_user`.
pub async fn participant_emails(
    pool: &PgPool,
    submission_id: i32,
    except_user: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT u.email FROM users u
        WHERE u.id <> $2 AND (
            u.id IN (SELECT user_id FROM reviews WHERE submission_id = $1)
            OR u.id IN (SELECT user_id FROM submission_messages WHERE submission_id = $1)
        )
        "#,
    )
    .bind(submission_id)
    .bind(except_user)
    .fetch_all(pool)
    .await
}

/// Email addresses of other users who have posted messages on the submission.
pub async fn message_author_emails(
    pool: &PgPool,
    submission_id: i32,
    except_user: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT u.email FROM users u
        JOIN submission_messages m ON m.user_id = u.id
        WHERE m.submission_id = $1 AND u.id <> $2
        "#,
    )
    .bind(submission_id)
    .bind(except_user)
    .fetch_all(pool)
    .await
}

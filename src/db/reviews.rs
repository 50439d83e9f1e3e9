use sqlx::PgPool;

use super::{Comment, Review, SubmissionMessage};
use crate::markup::RenderedText;

const REVIEW_SELECT: &str = "\
    SELECT rv.id, rv.submission_id, rv.user_id, u.username, rv.comment, rv.comment_html, rv.submitted_at \
    FROM reviews rv JOIN users u ON u.id = rv.user_id";

const MESSAGE_SELECT: &str = "\
    SELECT m.id, m.submission_id, m.user_id, u.username, m.message, m.message_html, m.submitted_at \
    FROM submission_messages m JOIN users u ON u.id = m.user_id";

const COMMENT_SELECT: &str = "\
    SELECT c.id, c.submission_id, c.commenter_id, u.username, c.text, c.text_html, c.public, c.commented_at \
    FROM comments c JOIN users u ON u.id = c.commenter_id";

pub async fn create_review(
    pool: &PgPool,
    submission_id: i32,
    user_id: i32,
    comment: &RenderedText,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO reviews (submission_id, user_id, comment, comment_html)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(submission_id)
    .bind(user_id)
    .bind(comment.raw())
    .bind(comment.html())
    .fetch_one(pool)
    .await
}

pub async fn get_review(pool: &PgPool, review_id: i32) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE rv.id = $1"))
        .bind(review_id)
        .fetch_optional(pool)
        .await
}

/// Newest first.
pub async fn list_reviews(pool: &PgPool, submission_id: i32) -> Result<Vec<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>(&format!(
        "{REVIEW_SELECT} WHERE rv.submission_id = $1 ORDER BY rv.submitted_at DESC"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_review(pool: &PgPool, review_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_message(
    pool: &PgPool,
    submission_id: i32,
    user_id: i32,
    message: &RenderedText,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO submission_messages (submission_id, user_id, message, message_html)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(submission_id)
    .bind(user_id)
    .bind(message.raw())
    .bind(message.html())
    .fetch_one(pool)
    .await
}

/// Oldest first.
pub async fn list_messages(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<SubmissionMessage>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionMessage>(&format!(
        "{MESSAGE_SELECT} WHERE m.submission_id = $1 ORDER BY m.submitted_at, m.id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub async fn create_comment(
    pool: &PgPool,
    submission_id: i32,
    commenter_id: i32,
    text: &RenderedText,
    public: bool,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO comments (submission_id, commenter_id, text, text_html, public)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(submission_id)
    .bind(commenter_id)
    .bind(text.raw())
    .bind(text.html())
    .bind(public)
    .fetch_one(pool)
    .await
}

pub async fn list_comments(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.submission_id = $1 ORDER BY c.commented_at, c.id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

use sqlx::PgPool;

use super::{NotificationTemplate, ResultNotification};

const NOTIFICATION_COLUMNS: &str =
    "id, submission_id, template_id, timestamp, to_address, from_address, subject, body";

/// The rendered email captured at send time.
#[derive(Debug, Clone)]
pub struct NewResultNotification<'a> {
    pub submission_id: i32,
    pub template_id: Option<i32>,
    pub to_address: &'a str,
    pub from_address: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

pub async fn list_templates(pool: &PgPool) -> Result<Vec<NotificationTemplate>, sqlx::Error> {
    sqlx::query_as::<_, NotificationTemplate>(
        "SELECT id, label, from_address, subject, body FROM notification_templates ORDER BY label",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_template(
    pool: &PgPool,
    template_id: i32,
) -> Result<Option<NotificationTemplate>, sqlx::Error> {
    sqlx::query_as::<_, NotificationTemplate>(
        "SELECT id, label, from_address, subject, body FROM notification_templates WHERE id = $1",
    )
    .bind(template_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_template(
    pool: &PgPool,
    label: &str,
    from_address: &str,
    subject: &str,
    body: &str,
) -> Result<NotificationTemplate, sqlx::Error> {
    sqlx::query_as::<_, NotificationTemplate>(
        r#"
        INSERT INTO notification_templates (label, from_address, subject, body)
        VALUES ($1, $2, $3, $4)
        RETURNING id, label, from_address, subject, body
        "#,
    )
    .bind(label)
    .bind(from_address)
    .bind(subject)
    .bind(body)
    .fetch_one(pool)
    .await
}

pub async fn create_result_notification(
    pool: &PgPool,
    new: &NewResultNotification<'_>,
) -> Result<ResultNotification, sqlx::Error> {
    sqlx::query_as::<_, ResultNotification>(&format!(
        "INSERT INTO result_notifications \
            (submission_id, template_id, to_address, from_address, subject, body) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(new.submission_id)
    .bind(new.template_id)
    .bind(new.to_address)
    .bind(new.from_address)
    .bind(new.subject)
    .bind(new.body)
    .fetch_one(pool)
    .await
}

pub async fn list_result_notifications(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<ResultNotification>, sqlx::Error> {
    sqlx::query_as::<_, ResultNotification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM result_notifications \
         WHERE submission_id = $1 ORDER BY timestamp, id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

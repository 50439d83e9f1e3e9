use sqlx::PgPool;

use super::SupportingDocument;

const DOCUMENT_COLUMNS: &str = "id, submission_id, uploaded_by, created_at, file_path, description";

pub async fn create_document(
    pool: &PgPool,
    submission_id: i32,
    uploaded_by: i32,
    file_path: &str,
    description: &str,
) -> Result<SupportingDocument, sqlx::Error> {
    sqlx::query_as::<_, SupportingDocument>(&format!(
        "INSERT INTO supporting_documents (submission_id, uploaded_by, file_path, description) \
         VALUES ($1, $2, $3, $4) RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(submission_id)
    .bind(uploaded_by)
    .bind(file_path)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn get_document(
    pool: &PgPool,
    document_id: i32,
) -> Result<Option<SupportingDocument>, sqlx::Error> {
    sqlx::query_as::<_, SupportingDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM supporting_documents WHERE id = $1"
    ))
    .bind(document_id)
    .fetch_optional(pool)
    .await
}

/// Looks up a document only if `user_id` uploaded it.
pub async fn get_document_for_uploader(
    pool: &PgPool,
    document_id: i32,
    user_id: i32,
) -> Result<Option<SupportingDocument>, sqlx::Error> {
    sqlx::query_as::<_, SupportingDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM supporting_documents WHERE id = $1 AND uploaded_by = $2"
    ))
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_documents(
    pool: &PgPool,
    submission_id: i32,
) -> Result<Vec<SupportingDocument>, sqlx::Error> {
    sqlx::query_as::<_, SupportingDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM supporting_documents \
         WHERE submission_id = $1 ORDER BY created_at"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_document(pool: &PgPool, document_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM supporting_documents WHERE id = $1")
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

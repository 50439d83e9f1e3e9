use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use validator::Validate;

use super::{base_context, SubmissionView};
use crate::auth::CurrentUser;
use crate::db::{self, Submission};
use crate::error::{AppError, AppResult};
use crate::forms::{collect_errors, DocumentForm, FormErrors};
use crate::state::AppState;
use crate::storage;
use crate::templates::render_page;

/// The submitter's own, still active submission. Uploads to a cancelled one
/// are refused outright.
async fn uploadable_submission(
    state: &AppState,
    user: &CurrentUser,
    pk: i32,
) -> AppResult<Submission> {
    let submission = db::get_submission_for_submitter(state.pool.as_ref(), pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;
    if submission.cancelled {
        return Err(AppError::Forbidden);
    }
    Ok(submission)
}

fn render_create(
    user: &CurrentUser,
    submission: &Submission,
    description: &str,
    errors: &FormErrors,
) -> AppResult<Response> {
    let mut ctx = base_context(user);
    ctx.insert("submission", &SubmissionView::new(submission));
    ctx.insert("description", description);
    ctx.insert("errors", errors);
    Ok(render_page("document_create.html", &ctx)?.into_response())
}

pub async fn document_create_page(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let submission = uploadable_submission(&state, &user, pk).await?;
    render_create(&user, &submission, "", &FormErrors::new())
}

pub async fn document_create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let submission = uploadable_submission(&state, &user, pk).await?;

    let form = match read_document_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::info!(submission_id = submission.id, "Document upload over the size limit");
            let mut errors = FormErrors::new();
            errors.insert(
                "content".to_string(),
                format!(
                    "File is too large. The limit is {} MiB.",
                    state.config.max_upload_bytes / (1024 * 1024)
                ),
            );
            return render_create(&user, &submission, "", &errors);
        }
        Err(e) => return Err(AppError::BadRequest(format!("malformed upload: {e}"))),
    };

    if let Err(e) = form.validate() {
        return render_create(&user, &submission, &form.description, &collect_errors(&e));
    }

    let file_path = storage::save(&state.config.media_root, &form.file_name, &form.content).await?;
    let document =
        db::create_document(state.pool.as_ref(), submission.id, user.id(), &file_path, &form.description)
            .await?;
    tracing::info!(
        document_id = document.id,
        submission_id = submission.id,
        size = form.content.len(),
        "Supporting document uploaded"
    );

    Ok(Redirect::to(&format!("/{}/", submission.id)).into_response())
}

async fn read_document_form(multipart: &mut Multipart) -> Result<DocumentForm, MultipartError> {
    let mut form = DocumentForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "description" => form.description = field.text().await?.trim().to_string(),
            "document" => {
                form.file_name = field.file_name().unwrap_or("document").to_string();
                form.content = field.bytes().await?.to_vec();
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn document_delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let document = db::get_document_for_uploader(pool, pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;

    db::delete_document(pool, document.id).await?;
    if let Err(e) = storage::remove(&state.config.media_root, &document.file_path).await {
        tracing::warn!(document_id = document.id, error = %e, "Failed to remove document file");
    }
    tracing::info!(document_id = document.id, "Supporting document deleted");

    Ok(Redirect::to(&format!("/{}/", document.submission_id)).into_response())
}

/// Any signed-in user may download; the trailing filename is cosmetic.
pub async fn document_download(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path((pk, _filename)): Path<(i32, String)>,
) -> AppResult<Response> {
    let document = db::get_document(state.pool.as_ref(), pk)
        .await?
        .ok_or(AppError::NotFound)?;

    if state.config.use_x_accel_redirect {
        let location = accel_location(&state.config.media_url, &document.file_path);
        let value = HeaderValue::from_str(&location)
            .map_err(|_| AppError::Internal(format!("unusable document path: {location}")))?;
        let mut response = StatusCode::OK.into_response();
        response.headers_mut().insert("X-Accel-Redirect", value);
        return Ok(response);
    }

    let path = storage::resolve(&state.config.media_root, &document.file_path)
        .ok_or(AppError::NotFound)?;
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, mime.to_string())],
        Body::from(data),
    )
        .into_response())
}

fn accel_location(media_url: &str, file_path: &str) -> String {
    format!("{}/{}", media_url.trim_end_matches('/'), file_path)
}

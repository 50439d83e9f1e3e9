use axum::{
    extract::{OriginalUri, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::collections::HashMap;
use std::sync::Arc;
use tera::Context;
use validator::Validate;

use super::{base_context, SubmissionView};
use crate::auth::CurrentUser;
use crate::db::{self, Submission};
use crate::error::{AppError, AppResult};
use crate::forms::{collect_errors, FormErrors, KindSchema, MessageForm};
use crate::state::AppState;
use crate::templates::render_page;

/// Editing closes once the kind stops accepting edits or the submission is
/// cancelled.
pub fn can_edit(submission: &Submission, schema: &KindSchema) -> bool {
    schema.editable && !submission.cancelled
}

fn schema_for<'a>(state: &'a AppState, slug: &str) -> AppResult<&'a KindSchema> {
    state.forms.get(slug).ok_or_else(|| {
        tracing::warn!(kind = slug, "No form registered for submission kind");
        AppError::NotFound
    })
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    let submissions = db::list_for_submitter(state.pool.as_ref(), user.id()).await?;
    let mut ctx = base_context(&user);
    ctx.insert("submissions", &SubmissionView::list(&submissions));
    Ok(render_page("dashboard.html", &ctx)?.into_response())
}

pub async fn kind_list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    let kinds = db::list_kinds(state.pool.as_ref()).await?;
    let mut ctx = base_context(&user);
    ctx.insert("kinds", &kinds);
    Ok(render_page("submission_submit.html", &ctx)?.into_response())
}

pub async fn submission_add_page(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(kind_slug): Path<String>,
) -> AppResult<Response> {
    let kind = db::get_kind_by_slug(state.pool.as_ref(), &kind_slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let schema = schema_for(&state, &kind.slug)?;

    let mut ctx = base_context(&user);
    ctx.insert("kind", &kind);
    ctx.insert("rows", &schema.rows(&HashMap::new(), &FormErrors::new()));
    Ok(render_page("submission_submit_kind.html", &ctx)?.into_response())
}

pub async fn submission_add(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(kind_slug): Path<String>,
    Form(input): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let kind = db::get_kind_by_slug(pool, &kind_slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let schema = schema_for(&state, &kind.slug)?;

    match schema.clean(&input) {
        Ok(cleaned) => {
            let id =
                db::create_submission(pool, kind.id, user.id(), &cleaned.title, &cleaned.details)
                    .await?;
            tracing::info!(submission_id = id, kind = %kind.slug, user_id = user.id(), "Submission created");
            Ok(Redirect::to("/dashboard/").into_response())
        }
        Err(errors) => {
            let mut ctx = base_context(&user);
            ctx.insert("kind", &kind);
            ctx.insert("rows", &schema.rows(&input, &errors));
            Ok(render_page("submission_submit_kind.html", &ctx)?.into_response())
        }
    }
}

async fn render_detail(
    state: &AppState,
    user: &CurrentUser,
    submission: &Submission,
    message: &str,
    errors: &FormErrors,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let documents = db::list_documents(pool, submission.id).await?;
    let messages = db::list_messages(pool, submission.id).await?;

    let documents: Vec<serde_json::Value> = documents
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id,
                "description": d.description,
                "created_at": d.created_at,
                "uploaded_by": d.uploaded_by,
                "download_url": d.download_url(),
            })
        })
        .collect();

    let mut ctx = base_context(user);
    ctx.insert("submission", &SubmissionView::new(submission));
    ctx.insert("documents", &documents);
    ctx.insert("review_messages", &messages);
    ctx.insert("message", message);
    ctx.insert("errors", errors);
    Ok(render_page("submission_detail.html", &ctx)?.into_response())
}

pub async fn submission_detail(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let submission = db::get_submission_for_submitter(state.pool.as_ref(), pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;
    render_detail(&state, &user, &submission, "", &FormErrors::new()).await
}

/// Submitter posts a message; other message authors are emailed.
pub async fn submission_message(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<MessageForm>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let submission = db::get_submission_for_submitter(pool, pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;

    if let Err(e) = form.validate() {
        return render_detail(&state, &user, &submission, &form.message, &collect_errors(&e)).await;
    }

    let message = state.hooks.render(&form.message);
    db::create_message(pool, submission.id, user.id(), &message).await?;

    let recipients = db::message_author_emails(pool, submission.id, user.id()).await?;
    for email in recipients {
        let mut ctx = Context::new();
        ctx.insert("submission", &SubmissionView::new(&submission));
        ctx.insert("message", &serde_json::json!({ "message": message.raw(), "message_html": message.html() }));
        ctx.insert("reviewer", &true);
        state
            .hooks
            .send_email(&[email], "submission_new_message", &ctx)
            .await?;
    }

    Ok(Redirect::to(uri.path()).into_response())
}

fn render_edit(
    user: &CurrentUser,
    submission: &Submission,
    schema: &KindSchema,
    values: &HashMap<String, String>,
    errors: &FormErrors,
) -> AppResult<Response> {
    let mut ctx = base_context(user);
    ctx.insert("submission", &SubmissionView::new(submission));
    ctx.insert("rows", &schema.rows(values, errors));
    Ok(render_page("submission_edit.html", &ctx)?.into_response())
}

fn render_edit_closed(user: &CurrentUser) -> AppResult<Response> {
    let mut ctx = base_context(user);
    ctx.insert("title", "Submission editing closed");
    ctx.insert("body", "Submission editing is closed for this session type.");
    Ok(render_page("submission_error.html", &ctx)?.into_response())
}

/// Loads a submission for editing; only the submitter gets past this.
async fn editable_submission(
    state: &AppState,
    user: &CurrentUser,
    pk: i32,
) -> AppResult<Submission> {
    let submission = db::get_submission(state.pool.as_ref(), pk)
        .await?
        .ok_or(AppError::NotFound)?;
    if submission.submitter_id != user.id() {
        return Err(AppError::NotFound);
    }
    Ok(submission)
}

pub async fn submission_edit_page(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let submission = editable_submission(&state, &user, pk).await?;
    let schema = schema_for(&state, &submission.kind_slug)?;
    if !can_edit(&submission, schema) {
        return render_edit_closed(&user);
    }
    let values = schema.initial(&submission.title, &submission.details);
    render_edit(&user, &submission, schema, &values, &FormErrors::new())
}

/// Saves the edit and tells reviewers and message authors about it.
pub async fn submission_edit(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
    Form(input): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let submission = editable_submission(&state, &user, pk).await?;
    let schema = schema_for(&state, &submission.kind_slug)?;
    if !can_edit(&submission, schema) {
        return render_edit_closed(&user);
    }

    let cleaned = match schema.clean(&input) {
        Ok(cleaned) => cleaned,
        Err(errors) => return render_edit(&user, &submission, schema, &input, &errors),
    };
    db::update_submission(pool, submission.id, &cleaned.title, &cleaned.details).await?;
    tracing::info!(submission_id = submission.id, "Submission updated");

    let updated = db::get_submission(pool, submission.id)
        .await?
        .ok_or(AppError::NotFound)?;
    for email in db::participant_emails(pool, submission.id, user.id()).await? {
        let mut ctx = Context::new();
        ctx.insert("user", &user.user);
        ctx.insert("submission", &SubmissionView::new(&updated));
        state
            .hooks
            .send_email(&[email], "submission_updated", &ctx)
            .await?;
    }

    Ok(Redirect::to(&format!("/{}/", submission.id)).into_response())
}

pub async fn submission_cancel_page(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let submission = db::get_submission_for_submitter(state.pool.as_ref(), pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;
    let mut ctx = base_context(&user);
    ctx.insert("submission", &SubmissionView::new(&submission));
    Ok(render_page("submission_cancel.html", &ctx)?.into_response())
}

pub async fn submission_cancel(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let submission = db::get_submission_for_submitter(pool, pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;
    db::cancel_submission(pool, submission.id).await?;
    tracing::info!(submission_id = submission.id, "Submission cancelled");
    Ok(Redirect::to("/dashboard/").into_response())
}

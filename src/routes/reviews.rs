use axum::{
    extract::{OriginalUri, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use super::{base_context, SubmissionView};
use crate::auth::{
    CurrentUser, PERM_CAN_MANAGE, PERM_CAN_REVIEW, PERM_CAN_REVIEW_SUBMISSIONS, REVIEWERS_GROUP,
};
use crate::db::{self, AssignmentListing, AssignmentOrigin, ReviewFilter, Submission};
use crate::error::{AppError, AppResult};
use crate::forms::{collect_errors, CommentForm, FormErrors, MessageForm, ReviewForm};
use crate::state::AppState;
use crate::templates::render_page;

/// Header label for the review list template.
fn list_label(filter: ReviewFilter) -> &'static str {
    match filter {
        ReviewFilter::All => "all_reviews",
        ReviewFilter::ReviewedBy(_) => "user_reviewed",
        ReviewFilter::NotReviewedBy(_) => "user_not_reviewed",
    }
}

async fn render_list(
    state: &AppState,
    user: &CurrentUser,
    submissions: Vec<Submission>,
    reviewed: &str,
) -> AppResult<Response> {
    let ids: Vec<i32> = submissions.iter().map(|s| s.id).collect();
    db::ensure_results(state.pool.as_ref(), &ids).await?;

    let mut ctx = base_context(user);
    ctx.insert("submissions", &SubmissionView::list(&submissions));
    ctx.insert("reviewed", reviewed);
    Ok(render_page("review_list.html", &ctx)?.into_response())
}

async fn review_list(
    state: &AppState,
    user: &CurrentUser,
    filter: ReviewFilter,
    assigned: bool,
) -> AppResult<Response> {
    user.require_perm(PERM_CAN_REVIEW_SUBMISSIONS)?;
    let assigned_to = assigned.then(|| user.id());
    let submissions = db::list_for_review(state.pool.as_ref(), filter, assigned_to).await?;
    render_list(state, user, submissions, list_label(filter)).await
}

pub async fn review_all(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    review_list(&state, &user, ReviewFilter::All, false).await
}

pub async fn review_reviewed(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    let filter = ReviewFilter::ReviewedBy(user.id());
    review_list(&state, &user, filter, false).await
}

pub async fn review_not_reviewed(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    let filter = ReviewFilter::NotReviewedBy(user.id());
    review_list(&state, &user, filter, false).await
}

/// Submissions the user holds an active assignment on.
pub async fn review_assigned(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    review_list(&state, &user, ReviewFilter::All, true).await
}

/// Submissions a given user has reviewed. Managers may look at anyone.
pub async fn review_list_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(user_pk): Path<i32>,
) -> AppResult<Response> {
    if user.id() != user_pk {
        user.require_perm(PERM_CAN_MANAGE)?;
    }
    let filter = ReviewFilter::ReviewedBy(user_pk);
    let submissions = db::list_for_review(state.pool.as_ref(), filter, None).await?;
    render_list(&state, &user, submissions, list_label(filter)).await
}

pub async fn review_admin(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    user.require_perm(PERM_CAN_MANAGE)?;
    let reviewers = state.hooks.reviewers(state.pool.as_ref()).await?;
    let mut ctx = base_context(&user);
    ctx.insert("reviewers", &reviewers);
    Ok(render_page("review_admin.html", &ctx)?.into_response())
}

/// What the review page re-renders with after a failed post.
#[derive(Default)]
struct DetailForms {
    review: String,
    comment: String,
    message: String,
    errors: FormErrors,
}

async fn render_detail(
    state: &AppState,
    user: &CurrentUser,
    submission: &Submission,
    forms: DetailForms,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let result = db::get_or_create_result(pool, submission.id).await?;
    let reviews = db::list_reviews(pool, submission.id).await?;
    let messages = db::list_messages(pool, submission.id).await?;
    let comments = db::list_comments(pool, submission.id).await?;
    let documents: Vec<serde_json::Value> = db::list_documents(pool, submission.id)
        .await?
        .iter()
        .map(|d| serde_json::json!({ "description": d.description, "download_url": d.download_url() }))
        .collect();

    let mut ctx = base_context(user);
    ctx.insert("submission", &SubmissionView::new(submission));
    ctx.insert("result_status", result.status().as_str());
    ctx.insert("reviews", &reviews);
    ctx.insert("review_messages", &messages);
    ctx.insert("comments", &comments);
    ctx.insert("documents", &documents);
    ctx.insert("review", &forms.review);
    ctx.insert("comment", &forms.comment);
    ctx.insert("message", &forms.message);
    ctx.insert("errors", &forms.errors);
    Ok(render_page("review_detail.html", &ctx)?.into_response())
}

/// Loads the submission first so a missing one is a 404 even for users who
/// may not review.
async fn reviewable_submission(
    state: &AppState,
    user: &CurrentUser,
    pk: i32,
) -> AppResult<Submission> {
    let submission = db::get_submission(state.pool.as_ref(), pk)
        .await?
        .ok_or(AppError::NotFound)?;
    user.require_perm(PERM_CAN_REVIEW)?;
    Ok(submission)
}

pub async fn review_detail(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let submission = reviewable_submission(&state, &user, pk).await?;
    render_detail(&state, &user, &submission, DetailForms::default()).await
}

/// The page carries several forms; the submit button's name picks the action.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DetailAction {
    Message,
    Review,
    Comment,
    Result(String),
}

impl DetailAction {
    fn from_form(input: &HashMap<String, String>) -> Option<Self> {
        if input.contains_key("message_submit") {
            Some(Self::Message)
        } else if input.contains_key("review_submit") {
            Some(Self::Review)
        } else if input.contains_key("comment_submit") {
            Some(Self::Comment)
        } else {
            input.get("result_submit").map(|a| Self::Result(a.clone()))
        }
    }
}

fn field(input: &HashMap<String, String>, name: &str) -> String {
    input.get(name).cloned().unwrap_or_default()
}

pub async fn review_detail_post(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
    OriginalUri(uri): OriginalUri,
    Form(input): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let submission = reviewable_submission(&state, &user, pk).await?;
    let pool = state.pool.as_ref();
    let back = Redirect::to(uri.path()).into_response();

    match DetailAction::from_form(&input) {
        Some(DetailAction::Message) => {
            let form = MessageForm { message: field(&input, "message") };
            if let Err(e) = form.validate() {
                let forms = DetailForms {
                    message: form.message,
                    errors: collect_errors(&e),
                    ..Default::default()
                };
                return render_detail(&state, &user, &submission, forms).await;
            }
            let message = state.hooks.render(&form.message);
            db::create_message(pool, submission.id, user.id(), &message).await?;
            tracing::info!(submission_id = submission.id, user_id = user.id(), "Reviewer message posted");
        }
        Some(DetailAction::Review) => {
            let form = ReviewForm { comment: field(&input, "comment") };
            if let Err(e) = form.validate() {
                let forms = DetailForms {
                    review: form.comment,
                    errors: collect_errors(&e),
                    ..Default::default()
                };
                return render_detail(&state, &user, &submission, forms).await;
            }
            let comment = state.hooks.render(&form.comment);
            let id = db::create_review(pool, submission.id, user.id(), &comment).await?;
            tracing::info!(review_id = id, submission_id = submission.id, "Review posted");
        }
        Some(DetailAction::Comment) => {
            let form = CommentForm {
                text: field(&input, "text"),
                public: input.get("public").cloned(),
            };
            if let Err(e) = form.validate() {
                let forms = DetailForms {
                    comment: form.text,
                    errors: collect_errors(&e),
                    ..Default::default()
                };
                return render_detail(&state, &user, &submission, forms).await;
            }
            let text = state.hooks.render(&form.text);
            db::create_comment(pool, submission.id, user.id(), &text, form.is_public()).await?;
        }
        Some(DetailAction::Result(action)) => {
            if user.is_staff() {
                match db::update_result(pool, submission.id, &action).await? {
                    Some(result) => tracing::info!(
                        submission_id = submission.id,
                        status = result.status().as_str(),
                        user_id = user.id(),
                        "Result updated"
                    ),
                    None => tracing::warn!(action = %action, "Ignoring unknown result action"),
                }
            }
        }
        None => {}
    }

    Ok(back)
}

pub async fn review_delete(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let review = db::get_review(pool, pk).await?.ok_or(AppError::NotFound)?;
    user.require_perm(PERM_CAN_MANAGE)?;

    db::delete_review(pool, review.id).await?;
    tracing::info!(review_id = review.id, user_id = user.id(), "Review deleted");
    Ok(Redirect::to(&format!("/reviews/{}/", review.submission_id)).into_response())
}

#[derive(Serialize)]
struct AssignmentView<'a> {
    #[serde(flatten)]
    assignment: &'a AssignmentListing,
    origin_label: &'static str,
}

pub async fn review_assignments(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Response> {
    if !user.in_group(REVIEWERS_GROUP) {
        return Err(AppError::AccessNotPermitted);
    }
    let assignments = db::list_active_assignments_for_user(state.pool.as_ref(), user.id()).await?;
    let views: Vec<AssignmentView> = assignments
        .iter()
        .map(|a| AssignmentView {
            assignment: a,
            origin_label: AssignmentOrigin::from_code(a.origin)
                .map(AssignmentOrigin::label)
                .unwrap_or("unknown"),
        })
        .collect();

    let mut ctx = base_context(&user);
    ctx.insert("assignments", &views);
    Ok(render_page("review_assignment.html", &ctx)?.into_response())
}

/// Opting out again is a no-op; a fresh opt-out triggers a replacement pass.
pub async fn review_assignment_opt_out(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(pk): Path<i32>,
) -> AppResult<Response> {
    let pool = state.pool.as_ref();
    let assignment = db::get_assignment_for_user(pool, pk, user.id())
        .await?
        .ok_or(AppError::NotFound)?;

    if db::mark_opted_out(pool, assignment.id).await? {
        tracing::info!(
            assignment_id = assignment.id,
            submission_id = assignment.submission_id,
            user_id = user.id(),
            "Reviewer opted out"
        );
        state
            .hooks
            .create_assignments(pool, assignment.submission_id, AssignmentOrigin::AutoAssignedLater)
            .await?;
    }

    Ok(Redirect::to("/assignments/mine/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn submit_button_picks_action() {
        assert_eq!(
            DetailAction::from_form(&form(&[("message_submit", ""), ("message", "hi")])),
            Some(DetailAction::Message)
        );
        assert_eq!(
            DetailAction::from_form(&form(&[("review_submit", "Submit"), ("comment", "ok")])),
            Some(DetailAction::Review)
        );
        assert_eq!(
            DetailAction::from_form(&form(&[("comment_submit", "")])),
            Some(DetailAction::Comment)
        );
        assert_eq!(
            DetailAction::from_form(&form(&[("result_submit", "accept")])),
            Some(DetailAction::Result("accept".into()))
        );
        assert_eq!(DetailAction::from_form(&form(&[("message", "hi")])), None);
    }

    #[test]
    fn list_labels() {
        assert_eq!(list_label(ReviewFilter::All), "all_reviews");
        assert_eq!(list_label(ReviewFilter::ReviewedBy(1)), "user_reviewed");
        assert_eq!(list_label(ReviewFilter::NotReviewedBy(1)), "user_not_reviewed");
    }
}

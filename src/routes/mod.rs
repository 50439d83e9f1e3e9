mod account;
mod documents;
mod notifications;
mod reviews;
mod submissions;

pub use account::*;
pub use documents::*;
pub use notifications::*;
pub use reviews::*;
pub use submissions::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tera::Context;

use crate::auth::{CurrentUser, PERM_CAN_MANAGE, PERM_CAN_REVIEW_SUBMISSIONS, REVIEWERS_GROUP};
use crate::db::Submission;
use crate::state::AppState;

/// `max_upload_bytes` caps the document upload body; every other route keeps
/// axum's default limit.
pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/account/login/", get(login_page).post(login))
        .route("/account/logout/", post(logout))
        .route("/dashboard/", get(dashboard))
        .route("/submit/", get(kind_list))
        .route("/submit/:kind_slug/", get(submission_add_page).post(submission_add))
        .route("/:pk/", get(submission_detail).post(submission_message))
        .route("/:pk/edit/", get(submission_edit_page).post(submission_edit))
        .route("/:pk/cancel/", get(submission_cancel_page).post(submission_cancel))
        .route(
            "/:pk/document/create/",
            get(document_create_page)
                .post(document_create)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/document/:pk/delete/", post(document_delete))
        .route("/document/:pk/:filename", get(document_download))
        .route("/all/", get(review_all))
        .route("/reviewed/", get(review_reviewed))
        .route("/not-reviewed/", get(review_not_reviewed))
        .route("/assignments/", get(review_assigned))
        .route("/assignments/mine/", get(review_assignments))
        .route("/assignment/:pk/opt-out/", post(review_assignment_opt_out))
        .route("/list/:user_pk/", get(review_list_user))
        .route("/admin/", get(review_admin))
        .route("/reviews/:pk/", get(review_detail).post(review_detail_post))
        .route("/reviews/:pk/delete/", post(review_delete))
        .route("/notification/:status/", get(result_notification))
        .route("/notification/:status/prepare/", post(result_notification_prepare))
        .route("/notification/:status/send/", post(result_notification_send))
}

/// Context shared by every page: the user and what their menu may show.
pub(crate) fn base_context(user: &CurrentUser) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &user.user);
    ctx.insert("is_staff", &user.is_staff());
    ctx.insert("can_manage", &user.has_perm(PERM_CAN_MANAGE));
    ctx.insert("can_review", &user.has_perm(PERM_CAN_REVIEW_SUBMISSIONS));
    ctx.insert("is_reviewer", &user.in_group(REVIEWERS_GROUP));
    ctx
}

/// A submission plus the derived values templates need.
#[derive(Serialize)]
pub(crate) struct SubmissionView<'a> {
    #[serde(flatten)]
    pub submission: &'a Submission,
    pub number: String,
    pub status: &'static str,
}

impl<'a> SubmissionView<'a> {
    pub fn new(submission: &'a Submission) -> Self {
        Self {
            submission,
            number: submission.number(),
            status: submission.status().as_str(),
        }
    }

    pub fn list(submissions: &'a [Submission]) -> Vec<Self> {
        submissions.iter().map(Self::new).collect()
    }
}

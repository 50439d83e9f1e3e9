use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::collections::HashMap;
use std::sync::Arc;
use tera::Context;

use super::{base_context, SubmissionView};
use crate::auth::{CurrentUser, PERM_CAN_MANAGE};
use crate::db::{self, NewResultNotification, NotificationTemplate, ResultStatus};
use crate::error::{AppError, AppResult};
use crate::mail::OutgoingEmail;
use crate::state::AppState;
use crate::templates::{render_page, render_str};

const SEND_FIELDS: [&str; 4] = ["submission_pks", "from_address", "subject", "body"];

fn parse_status(status: &str) -> AppResult<ResultStatus> {
    status.parse().map_err(|_| AppError::NotFound)
}

/// Every `_selected_action` value from the admin-style checkbox list.
fn selected_pks(pairs: &[(String, String)]) -> AppResult<Vec<i32>> {
    pairs
        .iter()
        .filter(|(key, _)| key == "_selected_action")
        .map(|(_, value)| parse_pk(value))
        .collect()
}

/// `"3,7,12"`, as carried from the prepare page to the send form.
fn parse_pk_list(list: &str) -> AppResult<Vec<i32>> {
    list.split(',').map(parse_pk).collect()
}

fn parse_pk(value: &str) -> AppResult<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid submission id: {value:?}")))
}

fn join_pks(pks: &[i32]) -> String {
    pks.iter().map(i32::to_string).collect::<Vec<_>>().join(",")
}

/// Resolves the optional `notification_template` field. Blank means none.
async fn selected_template(
    state: &AppState,
    value: Option<&str>,
) -> AppResult<Option<NotificationTemplate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let id: i32 = raw
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid template id: {raw:?}")))?;
            let template = db::get_template(state.pool.as_ref(), id)
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(Some(template))
        }
    }
}

pub async fn result_notification(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(status): Path<String>,
) -> AppResult<Response> {
    user.require_perm(PERM_CAN_MANAGE)?;
    let status = parse_status(&status)?;

    let pool = state.pool.as_ref();
    let submissions = db::list_by_status(pool, status, None).await?;
    let templates = db::list_templates(pool).await?;

    let mut ctx = base_context(&user);
    ctx.insert("status", status.as_str());
    ctx.insert("submissions", &SubmissionView::list(&submissions));
    ctx.insert("notification_templates", &templates);
    Ok(render_page("result_notification.html", &ctx)?.into_response())
}

pub async fn result_notification_prepare(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(status): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    user.require_perm(PERM_CAN_MANAGE)?;
    let status = parse_status(&status)?;

    let pks = selected_pks(&pairs)?;
    let submissions = db::list_by_status(state.pool.as_ref(), status, Some(&pks)).await?;
    let template_field = pairs
        .iter()
        .find(|(key, _)| key == "notification_template")
        .map(|(_, value)| value.as_str());
    let template = selected_template(&state, template_field).await?;

    let mut ctx = base_context(&user);
    ctx.insert("status", status.as_str());
    ctx.insert("notification_template", &template);
    ctx.insert("submissions", &SubmissionView::list(&submissions));
    ctx.insert("submission_pks", &join_pks(&pks));
    ctx.insert("default_from_email", &state.config.default_from_email);
    Ok(render_page("result_notification_prepare.html", &ctx)?.into_response())
}

/// Writes one notification row per matching submission, then sends them all.
pub async fn result_notification_send(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(status): Path<String>,
    Form(input): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    user.require_perm(PERM_CAN_MANAGE)?;
    let status = parse_status(&status)?;

    if let Some(missing) = SEND_FIELDS.iter().find(|f| !input.contains_key(**f)) {
        return Err(AppError::BadRequest(format!("missing field {missing}")));
    }
    let pks = parse_pk_list(&input["submission_pks"])?;
    let from_address = &input["from_address"];
    let subject = &input["subject"];
    let body_template = &input["body"];

    let pool = state.pool.as_ref();
    let template =
        selected_template(&state, input.get("notification_template").map(String::as_str)).await?;
    let submissions = db::list_by_status(pool, status, Some(&pks)).await?;

    let mut emails = Vec::with_capacity(submissions.len());
    for submission in &submissions {
        let mut ctx = Context::new();
        ctx.insert("submission", &submission.notification_email_context());
        let body = render_str(body_template, &ctx)?;

        let notification = db::create_result_notification(
            pool,
            &NewResultNotification {
                submission_id: submission.id,
                template_id: template.as_ref().map(|t| t.id),
                to_address: &submission.submitter_email,
                from_address,
                subject,
                body: &body,
            },
        )
        .await?;

        emails.push(OutgoingEmail {
            from: notification.from_address,
            to: vec![notification.to_address],
            subject: notification.subject,
            text_body: notification.body,
            html_body: None,
        });
    }

    let sent = state.hooks.send_mass_mail(&emails).await?;
    tracing::info!(
        status = status.as_str(),
        sent,
        user_id = user.id(),
        "Result notifications sent"
    );

    Ok(Redirect::to(&format!("/notification/{}/", status.as_str())).into_response())
}

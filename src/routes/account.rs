use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::sync::Arc;
use tera::Context;
use validator::Validate;

use crate::auth::password::verify_password;
use crate::auth::session::{clear_session_cookie, issue_session_token, session_cookie};
use crate::db::get_user_by_username;
use crate::error::{AppError, AppResult};
use crate::forms::{collect_errors, FormErrors, LoginForm};
use crate::state::AppState;
use crate::templates::render_page;

pub async fn login_page() -> AppResult<Response> {
    render_login("", &FormErrors::new())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    if let Err(e) = form.validate() {
        return render_login(&form.username, &collect_errors(&e));
    }

    let user = get_user_by_username(state.pool.as_ref(), form.username.trim()).await?;
    let verified = match &user {
        Some(user) => {
            let user_id = user.id;
            let password = form.password.clone();
            let hash = user.password_hash.clone();
            // Argon2 runs on the blocking pool.
            tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(|e| AppError::Internal(format!("password check: {e}")))?
                .unwrap_or_else(|e| {
                    tracing::warn!(user_id, error = %e, "Stored password hash is malformed");
                    false
                })
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::info!(username = %form.username, "Failed login");
            let mut errors = FormErrors::new();
            errors.insert(
                "form".to_string(),
                "Please enter a correct username and password.".to_string(),
            );
            return render_login(&form.username, &errors);
        }
    };

    let token = issue_session_token(user.id, &state.config.secret_key, state.config.session_ttl_hours)
        .map_err(|e| AppError::Internal(format!("session token: {e}")))?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        [(SET_COOKIE, session_cookie(&token, state.config.session_ttl_hours))],
        Redirect::to("/dashboard/"),
    )
        .into_response())
}

pub async fn logout() -> Response {
    ([(SET_COOKIE, clear_session_cookie())], Redirect::to("/account/login/")).into_response()
}

fn render_login(username: &str, errors: &FormErrors) -> AppResult<Response> {
    let mut ctx = Context::new();
    ctx.insert("username", username);
    ctx.insert("errors", errors);
    Ok(render_page("login.html", &ctx)?.into_response())
}

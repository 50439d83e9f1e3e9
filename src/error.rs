use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tera::Context;

use crate::mail::MailError;
use crate::templates::get_tera;

/// Error type for request handlers. Every variant renders an HTML page.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing object, or an object the requester may not see. Also used for
    /// anonymous access so that protected pages do not reveal themselves.
    #[error("Not found")]
    NotFound,

    /// The user lacks a permission; renders the access-not-permitted page.
    #[error("Access not permitted")]
    AccessNotPermitted,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_page(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound | AppError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "404.html")
            }
            AppError::AccessNotPermitted => {
                (StatusCode::FORBIDDEN, "access_not_permitted.html")
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "403.html"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "400.html"),
            AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "405.html"),
            AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Template(_)
            | AppError::Io(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "500.html"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, page) = self.status_and_page();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else if let AppError::BadRequest(reason) = &self {
            tracing::debug!(%reason, "Bad request");
        }

        let body = get_tera()
            .render(page, &Context::new())
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Error").to_string());

        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_kinds() {
        let cases = [
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (AppError::Database(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND),
            (AppError::AccessNotPermitted, StatusCode::FORBIDDEN),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::BadRequest("pk".into()), StatusCode::BAD_REQUEST),
            (AppError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Mail(MailError::Build("no body".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

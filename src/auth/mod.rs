pub mod password;
pub mod session;

use std::collections::HashSet;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::{self, User};
use crate::error::AppError;
use crate::state::AppState;

pub const PERM_CAN_REVIEW: &str = "can_review";
pub const PERM_CAN_MANAGE: &str = "can_manage";
pub const PERM_CAN_REVIEW_SUBMISSIONS: &str = "can_review_submissions";

pub const REVIEWERS_GROUP: &str = "reviewers";

/// The logged-in user, with permissions and group names resolved.
///
/// Rejects with [`AppError::NotFound`] when there is no valid session, so
/// anonymous visitors cannot tell protected pages from missing ones.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub permissions: HashSet<String>,
    pub groups: Vec<String>,
}

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_staff
    }

    pub fn has_perm(&self, codename: &str) -> bool {
        self.permissions.contains(codename)
    }

    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }

    /// Fails with the access-not-permitted page unless the permission is held.
    pub fn require_perm(&self, codename: &str) -> Result<(), AppError> {
        if self.has_perm(codename) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.id(), permission = codename, "Access not permitted");
            Err(AppError::AccessNotPermitted)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session::cookie_value(&parts.headers, session::SESSION_COOKIE)
            .ok_or(AppError::NotFound)?;
        let claims = session::validate_session_token(token, &state.config.secret_key)
            .map_err(|_| AppError::NotFound)?;

        let pool = state.pool.as_ref();
        let user = db::get_user(pool, claims.sub)
            .await?
            .ok_or(AppError::NotFound)?;
        let permissions = db::user_permissions(pool, user.id).await?.into_iter().collect();
        let groups = db::user_groups(pool, user.id).await?;

        Ok(CurrentUser {
            user,
            permissions,
            groups,
        })
    }
}

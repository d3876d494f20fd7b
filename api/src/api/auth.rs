use std::sync::Arc;

use super::middleware::auth::AuthError;
use crate::database::{Session, UserProfile, UserRole};
use crate::global::GlobalState;

/// The authenticated caller: their session and their profile.
#[derive(Debug, Clone)]
pub struct AuthData {
    pub session: Session,
    pub user: UserProfile,
}

impl AuthData {
    pub async fn from_session(
        global: &Arc<GlobalState>,
        session: Session,
    ) -> Result<Self, AuthError> {
        let user: Option<UserProfile> =
            sqlx::query_as("SELECT * FROM user_profiles WHERE id = $1")
                .bind(session.user_id)
                .fetch_optional(global.db.as_ref())
                .await
                .map_err(|err| {
                    tracing::error!(error = %err, "failed to fetch user");
                    AuthError::FetchUser
                })?;

        Ok(Self {
            session,
            user: user.ok_or(AuthError::UserNotFound)?,
        })
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }
}

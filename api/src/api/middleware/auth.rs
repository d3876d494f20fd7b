use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use hyper::http::header;
use hyper::{Body, StatusCode};
use routerify::prelude::RequestExt as _;
use routerify::Middleware;

use crate::api::auth::AuthData;
use crate::api::error::ApiError;
use crate::api::ext::RequestExt as _;
use crate::api::request_context::RequestContext;
use crate::database::Session;
use crate::global::GlobalState;
use crate::jwt::JwtState;

#[derive(thiserror::Error, Debug, Clone)]
pub enum AuthError {
    #[error("token must be ascii only")]
    HeaderToStr,
    #[error("token must be a bearer token")]
    NotBearerToken,
    /// The user is not logged in
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
    #[error("failed to fetch user")]
    FetchUser,
    #[error("user not found")]
    UserNotFound,
}

impl From<AuthError> for RouteError<ApiError> {
    fn from(value: AuthError) -> Self {
        RouteError::from(match &value {
            AuthError::HeaderToStr => (StatusCode::UNAUTHORIZED, "token must be ascii only"),
            AuthError::NotBearerToken => (StatusCode::UNAUTHORIZED, "token must be a bearer token"),
            AuthError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "not logged in"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid token"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "session expired"),
            AuthError::FetchUser => {
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user")
            }
            AuthError::UserNotFound => (StatusCode::INTERNAL_SERVER_ERROR, "user not found"),
        })
        .with_source(Some(ApiError::Auth(value)))
    }
}

pub fn auth_middleware(_: &Arc<GlobalState>) -> Middleware<Body, RouteError<ApiError>> {
    Middleware::pre(|req| async move {
        let context = RequestContext::default();
        req.set_context(context.clone());

        let Some(token) = req.headers().get(header::AUTHORIZATION) else {
            // No Authorization header
            return Ok(req);
        };

        let global = req.get_global()?;

        let token = token
            .to_str()
            .map_err(|_| AuthError::HeaderToStr)?
            .strip_prefix("Bearer ") // Tokens will start with "Bearer " so we need to remove that
            .ok_or(AuthError::NotBearerToken)?;

        let jwt = JwtState::verify(&global.config.jwt, token).ok_or(AuthError::InvalidToken)?;

        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(jwt.session_id)
            .fetch_optional(global.db.as_ref())
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch session"))?;

        let session = session.ok_or(AuthError::InvalidToken)?;

        if !session.is_valid() || session.user_id != jwt.user_id {
            return Err(AuthError::InvalidToken.into());
        }

        let data = AuthData::from_session(&global, session).await?;

        context.set_auth(data).await;

        Ok(req)
    })
}

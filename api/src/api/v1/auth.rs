use std::sync::Arc;

use chrono::{Duration, Utc};
use common::http::ext::{OptionExt as _, ResultExt as _};
use common::http::RouteError;
use common::make_response;
use email_address::EmailAddress;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{Session, UserProfile};
use crate::global::GlobalState;
use crate::jwt::JwtState;

const MIN_PASSWORD_LENGTH: usize = 8;

fn session_duration() -> Duration {
    Duration::days(7)
}

#[derive(Debug, serde::Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

async fn open_session(
    global: &Arc<GlobalState>,
    user: &UserProfile,
) -> Result<(String, Session)> {
    let session: Session = sqlx::query_as(
        "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(Utc::now() + session_duration())
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to create session"))?;

    let token = JwtState::from(session.clone())
        .serialize(&global.config.jwt)
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to serialize token"))?;

    Ok((token, session))
}

async fn register(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let body: CredentialsRequest = ext::parse_json_body(&mut req).await?;

    let email = body.email.trim().to_lowercase();
    if !EmailAddress::is_valid(&email) {
        return Err((StatusCode::BAD_REQUEST, "invalid email address").into());
    }

    if body.password.len() < MIN_PASSWORD_LENGTH {
        return Err((StatusCode::BAD_REQUEST, "password must be at least 8 characters").into());
    }

    let user: Option<UserProfile> = sqlx::query_as(
        "INSERT INTO user_profiles (email, password_hash)
         VALUES ($1, $2)
         ON CONFLICT (email) DO NOTHING
         RETURNING *",
    )
    .bind(&email)
    .bind(UserProfile::hash_password(&body.password))
    .fetch_optional(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to create user"))?;

    let Some(user) = user else {
        return Err((StatusCode::BAD_REQUEST, "email already registered").into());
    };

    let (token, session) = open_session(&global, &user).await?;

    Ok(make_response!(
        StatusCode::CREATED,
        json!({
            "token": token,
            "user": user,
            "expires_at": session.expires_at,
        })
    ))
}

async fn login(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let body: CredentialsRequest = ext::parse_json_body(&mut req).await?;

    let email = body.email.trim().to_lowercase();

    // An unknown email and a wrong password produce the same response.
    let invalid_credentials =
        || RouteError::from((StatusCode::UNAUTHORIZED, "invalid email or password"));

    let user: Option<UserProfile> = sqlx::query_as("SELECT * FROM user_profiles WHERE email = $1")
        .bind(&email)
        .fetch_optional(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch user"))?;

    let Some(user) = user else {
        return Err(invalid_credentials());
    };

    if !user.verify_password(&body.password) {
        return Err(invalid_credentials());
    }

    let (token, session) = open_session(&global, &user).await?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "token": token,
            "user": user,
            "expires_at": session.expires_at,
        })
    ))
}

async fn logout(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    sqlx::query("UPDATE sessions SET expires_at = now() WHERE id = $1")
        .bind(auth.session.id)
        .execute(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to expire session"))?;

    Ok(make_response!(StatusCode::OK, json!({ "success": true })))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .post("/register", register)
        .post("/login", login)
        .post("/logout", logout)
        .build()
        .expect("failed to build router")
}

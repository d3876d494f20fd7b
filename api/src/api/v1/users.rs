use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{UserProfile, UserRole};
use crate::global::GlobalState;

/// The role lookup: who am I, what can I do.
async fn me(req: Request<Body>) -> Result<Response<Body>> {
    let auth = ext::auth_data(&req).await?;

    Ok(make_response!(StatusCode::OK, json!({ "user": auth.user })))
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_admin() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
    }

    let users: Vec<UserProfile> =
        sqlx::query_as("SELECT * FROM user_profiles ORDER BY created_at DESC")
            .fetch_all(global.db.as_ref())
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch users"))?;

    Ok(make_response!(StatusCode::OK, json!({ "users": users })))
}

#[derive(Debug, serde::Deserialize)]
struct UpdateRoleRequest {
    role: UserRole,
}

async fn update_role(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_admin() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
    }

    let id = req.param_uuid("id")?;

    // An admin demoting themselves would lock everyone out.
    if id == auth.user.id {
        return Err((StatusCode::FORBIDDEN, "cannot change your own role").into());
    }

    let body: UpdateRoleRequest = ext::parse_json_body(&mut req).await?;

    let user: Option<UserProfile> = sqlx::query_as(
        "UPDATE user_profiles SET role = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(body.role)
    .fetch_optional(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update role"))?;

    let Some(user) = user else {
        return Err((StatusCode::NOT_FOUND, "user not found").into());
    };

    Ok(make_response!(StatusCode::OK, json!({ "user": user })))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/me", me)
        .get("/", list)
        .patch("/:id/role", update_role)
        .build()
        .expect("failed to build router")
}

use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;

use super::happenings;
use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{EventFlag, EventFlagRow, FlagStatus};
use crate::global::GlobalState;

#[derive(Debug, serde::Deserialize)]
struct CreateRequest {
    changes_requested: String,
}

/// Mounted under `/happenings/:id/flags`: any signed-in user can ask for a
/// correction.
pub async fn create(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;
    let body: CreateRequest = ext::parse_json_body(&mut req).await?;

    let changes_requested = body.changes_requested.trim().to_string();
    if changes_requested.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "changes_requested is required").into());
    }

    let happening = happenings::fetch_happening(&global, id).await?;
    let viewer = Some(auth.clone());
    if !happening
        .as_ref()
        .is_some_and(|happening| happenings::can_view(&viewer, happening))
    {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    }

    let flag: EventFlag = sqlx::query_as(
        "INSERT INTO event_flags (happening_id, flagger_user_id, changes_requested)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(id)
    .bind(auth.user.id)
    .bind(&changes_requested)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to create flag"))?;

    Ok(make_response!(StatusCode::CREATED, json!({ "flag": flag })))
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListQuery {
    status: Option<FlagStatus>,
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_curator() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
    }

    let query: ListQuery = req.query()?;

    let mut qb = sqlx::QueryBuilder::new(
        "SELECT event_flags.*, happenings.title AS happening_title
         FROM event_flags
         INNER JOIN happenings ON happenings.id = event_flags.happening_id
         WHERE TRUE",
    );

    if let Some(status) = query.status {
        qb.push(" AND event_flags.status = ").push_bind(status);
    }

    qb.push(" ORDER BY event_flags.created_at DESC");

    let flags: Vec<EventFlagRow> = qb
        .build_query_as()
        .fetch_all(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch flags"))?;

    Ok(make_response!(StatusCode::OK, json!({ "flags": flags })))
}

#[derive(Debug, serde::Deserialize)]
struct ResolveRequest {
    status: FlagStatus,
}

async fn resolve(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_curator() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
    }

    let id = req.param_uuid("id")?;
    let body: ResolveRequest = ext::parse_json_body(&mut req).await?;

    if body.status == FlagStatus::Pending {
        return Err((StatusCode::BAD_REQUEST, "status must be resolved or rejected").into());
    }

    let flag: Option<EventFlag> = sqlx::query_as(
        "UPDATE event_flags
         SET status = $2, resolved_by_user_id = $3, resolved_at = now(), updated_at = now()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(body.status)
    .bind(auth.user.id)
    .fetch_optional(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update flag"))?;

    let Some(flag) = flag else {
        return Err((StatusCode::NOT_FOUND, "flag not found").into());
    };

    Ok(make_response!(StatusCode::OK, json!({ "flag": flag })))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/:id/resolve", resolve)
        .build()
        .expect("failed to build router")
}

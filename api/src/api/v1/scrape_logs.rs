use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::ScrapeLog;
use crate::global::GlobalState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListQuery {
    reported: Option<bool>,
    requested_by: Option<Uuid>,
    limit: Option<i64>,
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let query: ListQuery = req.query()?;

    // Non-admins only ever see their own extraction history.
    let requested_by = if auth.user.role.is_admin() {
        query.requested_by
    } else {
        match query.requested_by {
            Some(id) if id != auth.user.id => {
                return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
            }
            _ => Some(auth.user.id),
        }
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM scrape_logs WHERE TRUE");

    if let Some(requested_by) = requested_by {
        qb.push(" AND requested_by_user_id = ").push_bind(requested_by);
    }
    if let Some(reported) = query.reported {
        qb.push(" AND is_reported_bad = ").push_bind(reported);
    }

    qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

    let logs: Vec<ScrapeLog> = qb
        .build_query_as()
        .fetch_all(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch scrape logs"))?;

    Ok(make_response!(StatusCode::OK, json!({ "scrape_logs": logs })))
}

async fn fetch_log(global: &Arc<GlobalState>, id: Uuid) -> Result<Option<ScrapeLog>> {
    sqlx::query_as("SELECT * FROM scrape_logs WHERE id = $1")
        .bind(id)
        .fetch_optional(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch scrape log"))
}

async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let log = fetch_log(&global, id).await?;

    let Some(log) = log.filter(|log| {
        auth.user.role.is_admin() || log.requested_by_user_id == auth.user.id
    }) else {
        return Err((StatusCode::NOT_FOUND, "scrape log not found").into());
    };

    Ok(make_response!(StatusCode::OK, json!({ "scrape_log": log })))
}

/// The requester (or a moderator) marks the extraction bad so the
/// instruction can be tuned. Idempotent.
async fn report(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let Some(log) = fetch_log(&global, id).await? else {
        return Err((StatusCode::NOT_FOUND, "scrape log not found").into());
    };

    if !(auth.user.role.is_curator() || log.requested_by_user_id == auth.user.id) {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions").into());
    }

    let log: ScrapeLog = sqlx::query_as(
        "UPDATE scrape_logs SET is_reported_bad = true WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update scrape log"))?;

    Ok(make_response!(StatusCode::OK, json!({ "scrape_log": log })))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .get("/:id", get)
        .post("/:id/report", report)
        .build()
        .expect("failed to build router")
}

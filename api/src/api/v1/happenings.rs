use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;
use uuid::Uuid;

use super::{attendance, flags};
use crate::api::auth::AuthData;
use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{Happening, HappeningStatus, ScrapeLog};
use crate::global::GlobalState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum SortBy {
    #[default]
    StartDatetime,
    CreatedAt,
    Title,
}

impl SortBy {
    fn column(&self) -> &'static str {
        match self {
            Self::StartDatetime => "start_datetime",
            Self::CreatedAt => "created_at",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListQuery {
    status: Option<HappeningStatus>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    submitter: Option<Uuid>,
    q: Option<String>,
    sort_by: Option<SortBy>,
    order: Option<SortOrder>,
    limit: Option<i64>,
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Anyone can see approved happenings; submitters additionally see their own
/// rows, curators everything. This mirrors what the row-level policies used
/// to enforce.
pub fn can_view(auth: &Option<AuthData>, happening: &Happening) -> bool {
    if happening.status == HappeningStatus::Approved {
        return true;
    }

    match auth {
        Some(auth) => {
            auth.user.role.is_curator() || auth.user.id == happening.submitter_user_id
        }
        None => false,
    }
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::optional_auth_data(&req).await?;
    let query: ListQuery = req.query()?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut qb = sqlx::QueryBuilder::new("SELECT * FROM happenings WHERE TRUE");

    match &auth {
        Some(auth) if auth.user.role.is_curator() => {}
        Some(auth) => {
            qb.push(" AND (status = ")
                .push_bind(HappeningStatus::Approved)
                .push(" OR submitter_user_id = ")
                .push_bind(auth.user.id)
                .push(")");
        }
        None => {
            qb.push(" AND status = ").push_bind(HappeningStatus::Approved);
        }
    }

    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = query.from {
        qb.push(" AND start_datetime >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND start_datetime <= ").push_bind(to);
    }
    if let Some(submitter) = query.submitter {
        qb.push(" AND submitter_user_id = ").push_bind(submitter);
    }
    if let Some(q) = &query.q {
        qb.push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(q)));
    }

    qb.push(" ORDER BY ")
        .push(query.sort_by.unwrap_or_default().column());
    qb.push(match query.order.unwrap_or_default() {
        SortOrder::Asc => " ASC",
        SortOrder::Desc => " DESC",
    });
    qb.push(" LIMIT ").push_bind(limit);

    let happenings: Vec<Happening> = qb
        .build_query_as()
        .fetch_all(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch happenings"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "happenings": happenings })
    ))
}

pub async fn fetch_happening(
    global: &Arc<GlobalState>,
    id: Uuid,
) -> Result<Option<Happening>> {
    sqlx::query_as("SELECT * FROM happenings WHERE id = $1")
        .bind(id)
        .fetch_optional(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch happening"))
}

async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::optional_auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let happening = fetch_happening(&global, id).await?;

    // Rows the caller may not see are indistinguishable from missing ones.
    let Some(happening) = happening.filter(|happening| can_view(&auth, happening)) else {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    };

    Ok(make_response!(
        StatusCode::OK,
        json!({ "happening": happening })
    ))
}

#[derive(Debug, serde::Deserialize)]
struct CreateRequest {
    title: String,
    description: Option<String>,
    start_datetime: DateTime<Utc>,
    end_datetime: Option<DateTime<Utc>>,
    location: Option<String>,
    source_url: Option<String>,
    scrape_log_id: Option<Uuid>,
}

async fn create(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_submitter() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions to submit happenings").into());
    }

    let body: CreateRequest = ext::parse_json_body(&mut req).await?;

    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title is required").into());
    }

    if let Some(end) = body.end_datetime {
        if end < body.start_datetime {
            return Err(
                (StatusCode::BAD_REQUEST, "end_datetime must not precede start_datetime").into(),
            );
        }
    }

    if let Some(log_id) = body.scrape_log_id {
        let log: Option<ScrapeLog> = sqlx::query_as("SELECT * FROM scrape_logs WHERE id = $1")
            .bind(log_id)
            .fetch_optional(global.db.as_ref())
            .await
            .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch scrape log"))?;

        match log {
            None => return Err((StatusCode::BAD_REQUEST, "unknown scrape log").into()),
            Some(log)
                if log.requested_by_user_id != auth.user.id && !auth.user.role.is_admin() =>
            {
                return Err(
                    (StatusCode::FORBIDDEN, "scrape log belongs to another user").into(),
                );
            }
            Some(_) => {}
        }
    }

    let happening: Happening = sqlx::query_as(
        "INSERT INTO happenings (
            title, description, start_datetime, end_datetime,
            location, source_url, submitter_user_id, scrape_log_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *",
    )
    .bind(&title)
    .bind(&body.description)
    .bind(body.start_datetime)
    .bind(body.end_datetime)
    .bind(&body.location)
    .bind(&body.source_url)
    .bind(auth.user.id)
    .bind(body.scrape_log_id)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to create happening"))?;

    Ok(make_response!(
        StatusCode::CREATED,
        json!({ "happening": happening })
    ))
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UpdateRequest {
    title: Option<String>,
    // Nested options distinguish "leave alone" from "clear the field".
    description: Option<Option<String>>,
    start_datetime: Option<DateTime<Utc>>,
    end_datetime: Option<Option<DateTime<Utc>>>,
    location: Option<Option<String>>,
    source_url: Option<Option<String>>,
}

async fn update(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;
    let body: UpdateRequest = ext::parse_json_body(&mut req).await?;

    let Some(happening) = fetch_happening(&global, id).await? else {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    };

    if !(auth.user.role.is_curator() || happening.submitter_user_id == auth.user.id) {
        let some_auth = Some(auth);
        return Err(if can_view(&some_auth, &happening) {
            (StatusCode::FORBIDDEN, "not allowed to edit this happening").into()
        } else {
            (StatusCode::NOT_FOUND, "happening not found").into()
        });
    }

    let title = match &body.title {
        Some(title) => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "title is required").into());
            }
            Some(title)
        }
        None => None,
    };

    let start = body.start_datetime.unwrap_or(happening.start_datetime);
    let end = match body.end_datetime {
        Some(end) => end,
        None => happening.end_datetime,
    };
    if let Some(end) = end {
        if end < start {
            return Err(
                (StatusCode::BAD_REQUEST, "end_datetime must not precede start_datetime").into(),
            );
        }
    }

    let mut qb = sqlx::QueryBuilder::new("UPDATE happenings SET updated_at = now()");

    if let Some(title) = title {
        qb.push(", title = ").push_bind(title);
    }
    if let Some(description) = body.description {
        qb.push(", description = ").push_bind(description);
    }
    if let Some(start_datetime) = body.start_datetime {
        qb.push(", start_datetime = ").push_bind(start_datetime);
    }
    if let Some(end_datetime) = body.end_datetime {
        qb.push(", end_datetime = ").push_bind(end_datetime);
    }
    if let Some(location) = body.location {
        qb.push(", location = ").push_bind(location);
    }
    if let Some(source_url) = body.source_url {
        qb.push(", source_url = ").push_bind(source_url);
    }

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    let happening: Happening = qb
        .build_query_as()
        .fetch_one(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update happening"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "happening": happening })
    ))
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let Some(happening) = fetch_happening(&global, id).await? else {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    };

    if !(auth.user.role.is_admin() || happening.submitter_user_id == auth.user.id) {
        return Err((StatusCode::FORBIDDEN, "not allowed to delete this happening").into());
    }

    sqlx::query("DELETE FROM happenings WHERE id = $1")
        .bind(id)
        .execute(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete happening"))?;

    Ok(make_response!(StatusCode::OK, json!({ "success": true })))
}

#[derive(Debug, serde::Deserialize)]
struct ModerateRequest {
    status: HappeningStatus,
}

async fn moderate(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_curator() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions to moderate").into());
    }

    let id = req.param_uuid("id")?;
    let body: ModerateRequest = ext::parse_json_body(&mut req).await?;

    if body.status == HappeningStatus::Pending {
        return Err((StatusCode::BAD_REQUEST, "status must be approved or rejected").into());
    }

    let happening: Option<Happening> = sqlx::query_as(
        "UPDATE happenings SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(body.status)
    .fetch_optional(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update status"))?;

    let Some(happening) = happening else {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    };

    Ok(make_response!(
        StatusCode::OK,
        json!({ "happening": happening })
    ))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .get("/:id", get)
        .patch("/:id", update)
        .delete("/:id", delete)
        .post("/:id/moderate", moderate)
        .post("/:id/flags", flags::create)
        .get("/:id/attendance", attendance::get)
        .put("/:id/attendance", attendance::set)
        .delete("/:id/attendance", attendance::remove)
        .build()
        .expect("failed to build router")
}

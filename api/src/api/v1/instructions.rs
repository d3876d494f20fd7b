use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;

use crate::api::auth::AuthData;
use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{pattern_matches, CustomInstruction};
use crate::global::GlobalState;

fn require_admin(auth: &AuthData) -> Result<()> {
    if auth.user.role.is_admin() {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, "insufficient permissions").into())
    }
}

async fn list(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    require_admin(&auth)?;

    let instructions: Vec<CustomInstruction> = sqlx::query_as(
        "SELECT * FROM custom_instructions ORDER BY priority DESC, created_at DESC",
    )
    .fetch_all(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch instructions"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "instructions": instructions })
    ))
}

#[derive(Debug, serde::Deserialize)]
struct CreateRequest {
    url_pattern: String,
    instructions_text: Option<String>,
    #[serde(default)]
    use_playwright: bool,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

async fn create(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    require_admin(&auth)?;

    let body: CreateRequest = ext::parse_json_body(&mut req).await?;

    let url_pattern = body.url_pattern.trim().to_string();
    if url_pattern.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "url_pattern is required").into());
    }

    let instruction: CustomInstruction = sqlx::query_as(
        "INSERT INTO custom_instructions (
            url_pattern, instructions_text, use_playwright, priority, is_active
        ) VALUES ($1, $2, $3, $4, $5)
        RETURNING *",
    )
    .bind(&url_pattern)
    .bind(&body.instructions_text)
    .bind(body.use_playwright)
    .bind(body.priority)
    .bind(body.is_active)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to create instruction"))?;

    Ok(make_response!(
        StatusCode::CREATED,
        json!({ "instruction": instruction })
    ))
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UpdateRequest {
    url_pattern: Option<String>,
    instructions_text: Option<Option<String>>,
    use_playwright: Option<bool>,
    priority: Option<i32>,
    is_active: Option<bool>,
}

async fn update(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    require_admin(&auth)?;

    let id = req.param_uuid("id")?;
    let body: UpdateRequest = ext::parse_json_body(&mut req).await?;

    let url_pattern = match &body.url_pattern {
        Some(pattern) => {
            let pattern = pattern.trim().to_string();
            if pattern.is_empty() {
                return Err((StatusCode::BAD_REQUEST, "url_pattern is required").into());
            }
            Some(pattern)
        }
        None => None,
    };

    let mut qb = sqlx::QueryBuilder::new("UPDATE custom_instructions SET updated_at = now()");

    if let Some(url_pattern) = url_pattern {
        qb.push(", url_pattern = ").push_bind(url_pattern);
    }
    if let Some(instructions_text) = body.instructions_text {
        qb.push(", instructions_text = ").push_bind(instructions_text);
    }
    if let Some(use_playwright) = body.use_playwright {
        qb.push(", use_playwright = ").push_bind(use_playwright);
    }
    if let Some(priority) = body.priority {
        qb.push(", priority = ").push_bind(priority);
    }
    if let Some(is_active) = body.is_active {
        qb.push(", is_active = ").push_bind(is_active);
    }

    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    let instruction: Option<CustomInstruction> = qb
        .build_query_as()
        .fetch_optional(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update instruction"))?;

    let Some(instruction) = instruction else {
        return Err((StatusCode::NOT_FOUND, "instruction not found").into());
    };

    Ok(make_response!(
        StatusCode::OK,
        json!({ "instruction": instruction })
    ))
}

async fn delete(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    require_admin(&auth)?;

    let id = req.param_uuid("id")?;

    let result = sqlx::query("DELETE FROM custom_instructions WHERE id = $1")
        .bind(id)
        .execute(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to delete instruction"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, "instruction not found").into());
    }

    Ok(make_response!(StatusCode::OK, json!({ "success": true })))
}

#[derive(Debug, serde::Deserialize)]
struct TestRequest {
    url_pattern: String,
    url: String,
}

/// Dry-run a pattern against a url with exactly the matcher the scrape
/// pipeline uses.
async fn test(mut req: Request<Body>) -> Result<Response<Body>> {
    let auth = ext::auth_data(&req).await?;
    require_admin(&auth)?;

    let body: TestRequest = ext::parse_json_body(&mut req).await?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "matches": pattern_matches(&body.url_pattern, &body.url) })
    ))
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .get("/", list)
        .post("/", create)
        .post("/test", test)
        .patch("/:id", update)
        .delete("/:id", delete)
        .build()
        .expect("failed to build router")
}

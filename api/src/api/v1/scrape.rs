use std::sync::Arc;

use common::http::ext::ResultExt as _;
use common::http::RouteError;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::Router;
use serde_json::json;

use crate::api::error::{ApiError, Result};
use crate::api::ext::{self, RequestExt as _};
use crate::database::{select_instruction, CustomInstruction, ScrapeLog};
use crate::extractor;
use crate::global::GlobalState;

#[derive(Debug, serde::Deserialize)]
struct ScrapeRequest {
    url: String,
}

/// The extraction pipeline: match an instruction, call the extractor, log
/// the attempt, answer with the log id either way. One attempt, no retries,
/// concurrent requests for the same url are not deduplicated.
async fn scrape(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;

    if !auth.user.role.is_submitter() {
        return Err((StatusCode::FORBIDDEN, "insufficient permissions to scrape urls").into());
    }

    let body: ScrapeRequest = ext::parse_json_body(&mut req).await?;

    let url = body.url.trim().to_string();
    if url.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "url is required").into());
    }

    let instructions: Vec<CustomInstruction> = sqlx::query_as(
        "SELECT * FROM custom_instructions
         WHERE is_active = TRUE
         ORDER BY priority DESC, created_at DESC",
    )
    .fetch_all(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch instructions"))?;

    let instruction = select_instruction(&instructions, &url);

    let outcome = extractor::extract(&global, &url, instruction).await;

    let log: ScrapeLog = match sqlx::query_as(
        "INSERT INTO scrape_logs (
            requested_by_user_id, url_scraped, custom_instruction_id_used,
            playwright_flag_used, raw_llm_response, parsed_event_data, error_message
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *",
    )
    .bind(auth.user.id)
    .bind(&url)
    .bind(instruction.map(|i| i.id))
    .bind(instruction.map(|i| i.use_playwright).unwrap_or(false))
    .bind(&outcome.raw_response)
    .bind(&outcome.parsed_event)
    .bind(&outcome.error)
    .fetch_one(global.db.as_ref())
    .await
    {
        Ok(log) => log,
        Err(err) => {
            // Without the audit row there is no log id to hand back, which
            // the caller needs to report a bad extraction.
            tracing::error!(error = %err, "failed to record scrape attempt");
            return Ok(make_response!(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "failed to record scrape attempt",
                    "details": err.to_string(),
                })
            ));
        }
    };

    match &outcome.parsed_event {
        Some(data) => Ok(make_response!(
            StatusCode::OK,
            json!({
                "scrape_log_id": log.id,
                "data": data,
            })
        )),
        None => Ok(make_response!(
            StatusCode::BAD_GATEWAY,
            json!({
                "scrape_log_id": log.id,
                "error": "failed to scrape event details",
                "details": outcome.error.as_deref().unwrap_or("unknown error"),
            })
        )),
    }
}

pub fn routes(_global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .post("/", scrape)
        .build()
        .expect("failed to build router")
}

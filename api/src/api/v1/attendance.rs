use common::http::ext::ResultExt as _;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use serde_json::json;

use super::happenings;
use crate::api::error::Result;
use crate::api::ext::{self, RequestExt as _};
use crate::database::{Attendance, AttendanceStatus};

// These handlers are mounted under `/happenings/:id/attendance`.

#[derive(Debug, serde::Deserialize)]
struct SetRequest {
    status: AttendanceStatus,
}

pub async fn set(mut req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;
    let body: SetRequest = ext::parse_json_body(&mut req).await?;

    let happening = happenings::fetch_happening(&global, id).await?;
    let viewer = Some(auth.clone());
    if !happening
        .as_ref()
        .is_some_and(|happening| happenings::can_view(&viewer, happening))
    {
        return Err((StatusCode::NOT_FOUND, "happening not found").into());
    }

    let attendance: Attendance = sqlx::query_as(
        "INSERT INTO user_attendance (user_id, happening_id, status)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id, happening_id)
         DO UPDATE SET status = EXCLUDED.status, updated_at = now()
         RETURNING *",
    )
    .bind(auth.user.id)
    .bind(id)
    .bind(body.status)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to update attendance"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({ "attendance": attendance })
    ))
}

pub async fn remove(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let result = sqlx::query("DELETE FROM user_attendance WHERE user_id = $1 AND happening_id = $2")
        .bind(auth.user.id)
        .bind(id)
        .execute(global.db.as_ref())
        .await
        .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to remove attendance"))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, "no attendance recorded").into());
    }

    Ok(make_response!(StatusCode::OK, json!({ "success": true })))
}

pub async fn get(req: Request<Body>) -> Result<Response<Body>> {
    let global = req.get_global()?;
    let auth = ext::auth_data(&req).await?;
    let id = req.param_uuid("id")?;

    let mine: Option<Attendance> = sqlx::query_as(
        "SELECT * FROM user_attendance WHERE user_id = $1 AND happening_id = $2",
    )
    .bind(auth.user.id)
    .bind(id)
    .fetch_optional(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch attendance"))?;

    let (going, maybe_going): (i64, i64) = sqlx::query_as(
        "SELECT
            count(*) FILTER (WHERE status = 'going'),
            count(*) FILTER (WHERE status = 'maybe_going')
         FROM user_attendance
         WHERE happening_id = $1",
    )
    .bind(id)
    .fetch_one(global.db.as_ref())
    .await
    .map_err_route((StatusCode::INTERNAL_SERVER_ERROR, "failed to count attendance"))?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "status": mine.map(|attendance| attendance.status),
            "going": going,
            "maybe_going": maybe_going,
        })
    ))
}

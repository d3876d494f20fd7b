use std::sync::Arc;

use common::http::RouteError;
use hyper::Body;
use routerify::Router;

use super::error::ApiError;
use crate::global::GlobalState;

pub mod attendance;
pub mod auth;
pub mod flags;
pub mod happenings;
pub mod health;
pub mod instructions;
pub mod scrape;
pub mod scrape_logs;
pub mod users;

pub fn routes(global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .scope("/health", health::routes(global))
        .scope("/auth", auth::routes(global))
        .scope("/users", users::routes(global))
        .scope("/happenings", happenings::routes(global))
        .scope("/flags", flags::routes(global))
        .scope("/instructions", instructions::routes(global))
        .scope("/scrape-logs", scrape_logs::routes(global))
        .scope("/scrape", scrape::routes(global))
        .build()
        .expect("failed to build router")
}

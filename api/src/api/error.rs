use common::http::RouteError;

use super::middleware::auth::AuthError;

pub type Result<T, E = RouteError<ApiError>> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An internal server error occurred.
    #[error("internal server error: {0}")]
    InternalServerError(&'static str),
    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The request body could not be read.
    #[error("failed to parse http body: {0}")]
    ParseHttpBody(#[from] hyper::Error),
    /// The request body was not the JSON we expected.
    #[error("invalid json body: {0}")]
    ParseJson(#[from] serde_json::Error),
    /// The query string could not be parsed.
    #[error("invalid query string: {0}")]
    ParseQuery(#[from] serde_qs::Error),
    /// Auth error
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}

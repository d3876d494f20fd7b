use std::sync::Arc;

use common::http::ext::{OptionExt as _, RequestGlobalExt, ResultExt as _};
use hyper::{Body, Request, StatusCode};
use routerify::prelude::RequestExt as _;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::auth::AuthData;
use super::error::{ApiError, Result};
use super::middleware::auth::AuthError;
use super::request_context::RequestContext;
use crate::global::GlobalState;

pub trait RequestExt {
    fn get_global(&self) -> Result<Arc<GlobalState>>;

    fn request_context(&self) -> RequestContext;

    /// A uuid path parameter, 400 when malformed.
    fn param_uuid(&self, name: &str) -> Result<Uuid>;

    /// The query string deserialized into `T`, defaults when absent.
    fn query<T: DeserializeOwned + Default>(&self) -> Result<T>;
}

impl RequestExt for Request<Body> {
    fn get_global(&self) -> Result<Arc<GlobalState>> {
        RequestGlobalExt::<ApiError>::get_global(self)
    }

    fn request_context(&self) -> RequestContext {
        self.context::<RequestContext>().unwrap_or_default()
    }

    fn param_uuid(&self, name: &str) -> Result<Uuid> {
        let raw = self
            .param(name)
            .map_err_route((StatusCode::BAD_REQUEST, "missing path parameter"))?;

        Uuid::parse_str(raw).map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid id"))
    }

    fn query<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match self.uri().query() {
            Some(query) => serde_qs::from_str(query)
                .map_err_route((StatusCode::BAD_REQUEST, "invalid query string")),
            None => Ok(T::default()),
        }
    }
}

pub async fn parse_json_body<T: DeserializeOwned>(req: &mut Request<Body>) -> Result<T> {
    let body = hyper::body::to_bytes(req.body_mut())
        .await
        .map_err_route((StatusCode::BAD_REQUEST, "failed to read body"))?;

    serde_json::from_slice(&body).map_err_route((StatusCode::BAD_REQUEST, "invalid json body"))
}

/// The caller's auth data, 401 when not logged in.
pub async fn auth_data(req: &Request<Body>) -> Result<AuthData> {
    optional_auth_data(req)
        .await?
        .ok_or_else(|| AuthError::NotLoggedIn.into())
}

pub async fn optional_auth_data(req: &Request<Body>) -> Result<Option<AuthData>> {
    Ok(req.request_context().auth().await?)
}

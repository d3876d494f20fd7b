use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use common::http::{error_handler, RouteError};
use common::make_response;
use common::prelude::FutureTimeout;
use hyper::server::conn::Http;
use hyper::{Body, StatusCode};
use routerify::{RequestServiceBuilder, Router};
use serde_json::json;
use tokio::net::TcpSocket;
use tokio::select;

use self::error::ApiError;
use crate::global::GlobalState;

pub mod auth;
pub mod error;
pub mod ext;
pub mod middleware;
pub mod request_context;
pub mod v1;

pub fn routes(global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    let weak = Arc::downgrade(global);

    Router::builder()
        .data(weak)
        // The CORS middleware adds the CORS headers to every response
        .middleware(middleware::cors::cors_middleware(global))
        // The auth middleware checks the Authorization header, and if it's
        // valid, it adds the auth data to the request context. This way we
        // can access the caller in the handlers. A missing header does not
        // fail the request, handlers decide whether auth is required.
        .middleware(middleware::auth::auth_middleware(global))
        .options("/*", preflight)
        .scope("/v1", v1::routes(global))
        .any(not_found)
        .err_handler_with_info(error_handler::<ApiError>)
        .build()
        .expect("failed to build router")
}

async fn preflight(_: hyper::Request<Body>) -> error::Result<hyper::Response<Body>> {
    Ok(hyper::Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .expect("failed to build response"))
}

async fn not_found(_: hyper::Request<Body>) -> error::Result<hyper::Response<Body>> {
    Ok(make_response!(
        StatusCode::NOT_FOUND,
        json!({ "message": "not found", "success": false })
    ))
}

pub async fn run(global: Arc<GlobalState>) -> anyhow::Result<()> {
    let config = &global.config.api;

    tracing::info!("listening on {}", config.bind_address);
    let socket = if config.bind_address.is_ipv6() {
        TcpSocket::new_v6()?
    } else {
        TcpSocket::new_v4()?
    };

    socket.set_reuseaddr(true)?;
    socket.set_reuseport(true)?;
    socket.bind(config.bind_address)?;
    let listener = socket.listen(1024)?;

    let tls_acceptor = if let Some(tls) = &config.tls {
        tracing::info!("tls enabled");
        let cert = tokio::fs::read(&tls.cert)
            .await
            .context("failed to read ssl cert")?;
        let key = tokio::fs::read(&tls.key)
            .await
            .context("failed to read ssl private key")?;

        let key = rustls_pemfile::pkcs8_private_keys(&mut io::BufReader::new(io::Cursor::new(key)))
            .next()
            .ok_or_else(|| anyhow::anyhow!("failed to find private key in key file"))??
            .into();

        let certs = rustls_pemfile::certs(&mut io::BufReader::new(io::Cursor::new(cert)))
            .collect::<Result<Vec<_>, _>>()?;

        Some(Arc::new(tokio_rustls::TlsAcceptor::from(Arc::new(
            rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(certs, key)?,
        ))))
    } else {
        None
    };

    let service_builder = RequestServiceBuilder::new(routes(&global))
        .map_err(|err| anyhow::anyhow!("failed to build request service: {err}"))?;

    loop {
        select! {
            _ = global.ctx.done() => {
                return Ok(());
            },
            r = listener.accept() => {
                let (socket, addr) = r?;

                let service = service_builder.build(addr);
                let tls_acceptor = tls_acceptor.clone();

                tracing::debug!("accepted connection from {}", addr);

                tokio::spawn(async move {
                    if let Some(tls_acceptor) = tls_acceptor {
                        let Ok(Ok(socket)) = tls_acceptor.accept(socket).timeout(Duration::from_secs(5)).await else {
                            return;
                        };
                        tracing::debug!("tls handshake complete");
                        Http::new().serve_connection(socket, service).await.ok();
                    } else {
                        Http::new().serve_connection(socket, service).await.ok();
                    }
                });
            },
        }
    }
}

use hyper::server::conn::Http;
use hyper::StatusCode;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// The request body the api is expected to send to the extraction service.
#[derive(Debug, Deserialize)]
pub struct MockRequest {
    pub url: String,
    pub use_playwright: bool,
    pub custom_instructions_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub body: String,
}

/// A raw-hyper stand-in for the extraction service. Each incoming request is
/// handed to the test together with a oneshot to answer it with.
pub async fn mock_extractor() -> (
    mpsc::Receiver<(MockRequest, oneshot::Sender<MockResponse>)>,
    String,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(1);

    // Bind to a random port
    let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();

    let addr = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            let tx = tx.clone();
            Http::new()
                .serve_connection(
                    socket,
                    hyper::service::service_fn(move |req| {
                        let tx = tx.clone();
                        async move {
                            let (_, body) = req.into_parts();
                            let body = hyper::body::to_bytes(body).await.unwrap();
                            let req = serde_json::from_slice(&body).unwrap();
                            let (otx, orx) = oneshot::channel::<MockResponse>();
                            tx.send((req, otx)).await.unwrap();
                            let response = orx.await.unwrap();
                            Ok::<_, hyper::Error>(
                                hyper::Response::builder()
                                    .status(response.status)
                                    .header("Content-Type", "application/json")
                                    .body(hyper::Body::from(response.body))
                                    .unwrap(),
                            )
                        }
                    }),
                )
                .await
                .ok();
        }
    });

    (rx, addr, handle)
}

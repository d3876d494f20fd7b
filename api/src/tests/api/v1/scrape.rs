use core::time;

use common::prelude::FutureTimeout;
use http::header;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

use crate::config::ExtractorConfig;
use crate::database::{ScrapeLog, UserRole};
use crate::tests::global::extractor::{mock_extractor, MockResponse};
use crate::tests::global::{clear_database, mock_global_state};
use crate::tests::{seed_user, start_server, test_config};

async fn fetch_log(global: &std::sync::Arc<crate::global::GlobalState>, id: Uuid) -> ScrapeLog {
    sqlx::query_as("SELECT * FROM scrape_logs WHERE id = $1")
        .bind(id)
        .fetch_one(global.db.as_ref())
        .await
        .expect("failed to fetch scrape log")
}

#[serial]
#[tokio::test]
async fn test_serial_scrape_success() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (mut rx, extractor_url, _mock_handle) = mock_extractor().await;

    let mut config = test_config(port);
    config.extractor = ExtractorConfig {
        url: extractor_url,
        timeout: 5,
    };

    let (global, handler) = mock_global_state(config).await;
    clear_database(&global).await;

    let (user, token) = seed_user(&global, "submitter@example.com", UserRole::Submitter).await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    let request = tokio::spawn({
        let client = client.clone();
        let base = base.clone();
        async move {
            client
                .post(format!("{base}/scrape"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .json(&json!({ "url": "https://venue.example.com/shows/99" }))
                .send()
                .await
                .expect("failed to scrape")
        }
    });

    // No instruction matches, so the extractor is called without guidance
    let (mock_req, otx) = rx.recv().await.expect("extractor was not called");
    assert_eq!(mock_req.url, "https://venue.example.com/shows/99");
    assert!(!mock_req.use_playwright);
    assert!(mock_req.custom_instructions_text.is_none());

    otx.send(MockResponse {
        status: http::StatusCode::OK,
        body: json!({
            "title": "Friday show",
            "description": "Doors at 7",
            "start_datetime": "2026-09-18T19:00:00Z",
            "end_datetime": null,
            "location": "The Basement",
        })
        .to_string(),
    })
    .expect("failed to answer mock request");

    let resp = request.await.expect("request task failed");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["data"]["title"], "Friday show");

    // One log row per attempt
    let log_id: Uuid = body["scrape_log_id"].as_str().unwrap().parse().unwrap();
    let log = fetch_log(&global, log_id).await;
    assert_eq!(log.requested_by_user_id, user.id);
    assert_eq!(log.url_scraped, "https://venue.example.com/shows/99");
    assert!(log.custom_instruction_id_used.is_none());
    assert!(!log.playwright_flag_used);
    assert!(log.error_message.is_none());
    assert_eq!(log.parsed_event_data.unwrap()["title"], "Friday show");

    drop(global);
    drop(client);

    handler
        .cancel()
        .timeout(time::Duration::from_secs(1))
        .await
        .expect("failed to cancel context");

    handle
        .timeout(time::Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[serial]
#[tokio::test]
async fn test_serial_scrape_uses_matching_instruction() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (mut rx, extractor_url, _mock_handle) = mock_extractor().await;

    let mut config = test_config(port);
    config.extractor = ExtractorConfig {
        url: extractor_url,
        timeout: 5,
    };

    let (global, handler) = mock_global_state(config).await;
    clear_database(&global).await;

    let (_user, token) = seed_user(&global, "submitter@example.com", UserRole::Submitter).await;

    // Two matching rules, the higher priority one wins; the inactive one is
    // ignored entirely.
    sqlx::query(
        "INSERT INTO custom_instructions (url_pattern, instructions_text, use_playwright, priority, is_active)
         VALUES
            ('https://venue.example.com/*', 'low priority', false, 1, true),
            ('https://venue.example.com/shows/*', 'check the ticket table', true, 10, true),
            ('https://venue.example.com/shows/*', 'inactive rule', false, 99, false)",
    )
    .execute(global.db.as_ref())
    .await
    .expect("failed to insert instructions");

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    let request = tokio::spawn({
        let client = client.clone();
        let base = base.clone();
        async move {
            client
                .post(format!("{base}/scrape"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .json(&json!({ "url": "https://venue.example.com/shows/99" }))
                .send()
                .await
                .expect("failed to scrape")
        }
    });

    let (mock_req, otx) = rx.recv().await.expect("extractor was not called");
    assert!(mock_req.use_playwright);
    assert_eq!(
        mock_req.custom_instructions_text.as_deref(),
        Some("check the ticket table")
    );

    otx.send(MockResponse {
        status: http::StatusCode::OK,
        body: json!({ "title": "Friday show" }).to_string(),
    })
    .expect("failed to answer mock request");

    let resp = request.await.expect("request task failed");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");

    let log_id: Uuid = body["scrape_log_id"].as_str().unwrap().parse().unwrap();
    let log = fetch_log(&global, log_id).await;
    assert!(log.playwright_flag_used);
    assert!(log.custom_instruction_id_used.is_some());

    drop(global);
    drop(client);

    handler
        .cancel()
        .timeout(time::Duration::from_secs(1))
        .await
        .expect("failed to cancel context");

    handle
        .timeout(time::Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[serial]
#[tokio::test]
async fn test_serial_scrape_failures_are_logged() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (mut rx, extractor_url, _mock_handle) = mock_extractor().await;

    let mut config = test_config(port);
    config.extractor = ExtractorConfig {
        url: extractor_url,
        timeout: 5,
    };

    let (global, handler) = mock_global_state(config).await;
    clear_database(&global).await;

    let (_user, token) = seed_user(&global, "submitter@example.com", UserRole::Submitter).await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    // The extractor reports a structured error
    let request = tokio::spawn({
        let client = client.clone();
        let base = base.clone();
        let token = token.clone();
        async move {
            client
                .post(format!("{base}/scrape"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .json(&json!({ "url": "https://venue.example.com/nothing" }))
                .send()
                .await
                .expect("failed to scrape")
        }
    });

    let (_mock_req, otx) = rx.recv().await.expect("extractor was not called");
    otx.send(MockResponse {
        status: http::StatusCode::OK,
        body: json!({ "error": "no event found", "details": "page is a venue homepage" })
            .to_string(),
    })
    .expect("failed to answer mock request");

    let resp = request.await.expect("request task failed");
    assert_eq!(resp.status(), http::StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["error"], "failed to scrape event details");
    assert_eq!(body["details"], "no event found: page is a venue homepage");

    let log_id: Uuid = body["scrape_log_id"].as_str().unwrap().parse().unwrap();
    let log = fetch_log(&global, log_id).await;
    assert!(log.parsed_event_data.is_none());
    assert_eq!(
        log.error_message.as_deref(),
        Some("no event found: page is a venue homepage")
    );

    // The extractor answers with something that is not json at all; the raw
    // text still ends up in the log
    let request = tokio::spawn({
        let client = client.clone();
        let base = base.clone();
        let token = token.clone();
        async move {
            client
                .post(format!("{base}/scrape"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .json(&json!({ "url": "https://venue.example.com/garbage" }))
                .send()
                .await
                .expect("failed to scrape")
        }
    });

    let (_mock_req, otx) = rx.recv().await.expect("extractor was not called");
    otx.send(MockResponse {
        status: http::StatusCode::INTERNAL_SERVER_ERROR,
        body: "<html>gateway timeout</html>".to_string(),
    })
    .expect("failed to answer mock request");

    let resp = request.await.expect("request task failed");
    assert_eq!(resp.status(), http::StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.expect("failed to read body");

    let log_id: Uuid = body["scrape_log_id"].as_str().unwrap().parse().unwrap();
    let log = fetch_log(&global, log_id).await;
    assert_eq!(
        log.raw_llm_response,
        Some(Value::String("<html>gateway timeout</html>".to_string()))
    );
    assert!(log.error_message.is_some());

    drop(global);
    drop(client);

    handler
        .cancel()
        .timeout(time::Duration::from_secs(1))
        .await
        .expect("failed to cancel context");

    handle
        .timeout(time::Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[serial]
#[tokio::test]
async fn test_serial_scrape_requires_submitter() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (global, handler) = mock_global_state(test_config(port)).await;
    clear_database(&global).await;

    let (_user, token) = seed_user(&global, "basic@example.com", UserRole::Basic).await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    let resp = client
        .post(format!("{base}/scrape"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .json(&json!({ "url": "https://venue.example.com/shows/99" }))
        .send()
        .await
        .expect("failed to scrape");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    let resp = client
        .post(format!("{base}/scrape"))
        .json(&json!({ "url": "https://venue.example.com/shows/99" }))
        .send()
        .await
        .expect("failed to scrape");
    assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);

    drop(global);
    drop(client);

    handler
        .cancel()
        .timeout(time::Duration::from_secs(1))
        .await
        .expect("failed to cancel context");

    handle
        .timeout(time::Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

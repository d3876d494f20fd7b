use core::time;

use common::prelude::FutureTimeout;
use http::header;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

use crate::database::{ScrapeLog, UserProfile, UserRole};
use crate::tests::global::{clear_database, mock_global_state};
use crate::tests::{seed_user, start_server, test_config};

async fn seed_log(
    global: &std::sync::Arc<crate::global::GlobalState>,
    user: &UserProfile,
    url: &str,
) -> ScrapeLog {
    sqlx::query_as(
        "INSERT INTO scrape_logs (requested_by_user_id, url_scraped, playwright_flag_used, error_message)
         VALUES ($1, $2, false, 'no event found')
         RETURNING *",
    )
    .bind(user.id)
    .bind(url)
    .fetch_one(global.db.as_ref())
    .await
    .expect("failed to insert scrape log")
}

#[serial]
#[tokio::test]
async fn test_serial_scrape_log_access_and_reporting() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (global, handler) = mock_global_state(test_config(port)).await;
    clear_database(&global).await;

    let (admin, admin_token) = seed_user(&global, "admin@example.com", UserRole::Admin).await;
    let (submitter, submitter_token) =
        seed_user(&global, "submitter@example.com", UserRole::Submitter).await;
    let (_other, other_token) =
        seed_user(&global, "other@example.com", UserRole::Submitter).await;

    let mine = seed_log(&global, &submitter, "https://venue.example.com/a").await;
    let theirs = seed_log(&global, &admin, "https://venue.example.com/b").await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    // A submitter only sees their own history
    let resp = client
        .get(format!("{base}/scrape-logs"))
        .header(header::AUTHORIZATION, format!("Bearer {submitter_token}"))
        .send()
        .await
        .expect("failed to list scrape logs");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    let logs = body["scrape_logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["id"].as_str().unwrap(), mine.id.to_string());

    // Asking for someone else's history is forbidden
    let resp = client
        .get(format!("{base}/scrape-logs?requested_by={}", admin.id))
        .header(header::AUTHORIZATION, format!("Bearer {submitter_token}"))
        .send()
        .await
        .expect("failed to list scrape logs");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    // Admins see everything
    let resp = client
        .get(format!("{base}/scrape-logs"))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .send()
        .await
        .expect("failed to list scrape logs");
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["scrape_logs"].as_array().unwrap().len(), 2);

    // Fetching someone else's log reads as missing
    let resp = client
        .get(format!("{base}/scrape-logs/{}", theirs.id))
        .header(header::AUTHORIZATION, format!("Bearer {submitter_token}"))
        .send()
        .await
        .expect("failed to get scrape log");
    assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);

    // A stranger cannot report someone else's log
    let resp = client
        .post(format!("{base}/scrape-logs/{}/report", mine.id))
        .header(header::AUTHORIZATION, format!("Bearer {other_token}"))
        .send()
        .await
        .expect("failed to report scrape log");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    // The requester can, and doing it twice is fine
    for _ in 0..2 {
        let resp = client
            .post(format!("{base}/scrape-logs/{}/report", mine.id))
            .header(header::AUTHORIZATION, format!("Bearer {submitter_token}"))
            .send()
            .await
            .expect("failed to report scrape log");
        assert_eq!(resp.status(), http::StatusCode::OK);
        let body: Value = resp.json().await.expect("failed to read body");
        assert_eq!(body["scrape_log"]["is_reported_bad"], true);
    }

    // Filtering on the reported flag
    let resp = client
        .get(format!("{base}/scrape-logs?reported=true"))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .send()
        .await
        .expect("failed to list scrape logs");
    let body: Value = resp.json().await.expect("failed to read body");
    let logs = body["scrape_logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["id"].as_str().unwrap(), mine.id.to_string());

    // An unknown id is a 404 either way
    let resp = client
        .get(format!("{base}/scrape-logs/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .send()
        .await
        .expect("failed to get scrape log");
    assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);

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

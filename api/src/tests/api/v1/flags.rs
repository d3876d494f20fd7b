use core::time;

use common::prelude::FutureTimeout;
use http::header;
use serde_json::{json, Value};
use serial_test::serial;

use crate::database::{HappeningStatus, UserRole};
use crate::tests::global::{clear_database, mock_global_state};
use crate::tests::{seed_happening, seed_user, start_server, test_config};

#[serial]
#[tokio::test]
async fn test_serial_flag_lifecycle() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (global, handler) = mock_global_state(test_config(port)).await;
    clear_database(&global).await;

    let (submitter, _) = seed_user(&global, "submitter@example.com", UserRole::Submitter).await;
    let (_basic, basic_token) = seed_user(&global, "basic@example.com", UserRole::Basic).await;
    let (curator, curator_token) =
        seed_user(&global, "curator@example.com", UserRole::Curator).await;

    let happening =
        seed_happening(&global, &submitter, "Flagged happening", HappeningStatus::Approved).await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    // Any signed-in user can flag an approved happening
    let resp = client
        .post(format!("{base}/happenings/{}/flags", happening.id))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .json(&json!({ "changes_requested": "The venue moved to the library" }))
        .send()
        .await
        .expect("failed to create flag");
    assert_eq!(resp.status(), http::StatusCode::CREATED);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["flag"]["status"], "pending");
    let flag_id = body["flag"]["id"].as_str().unwrap().to_string();

    // An empty request text is rejected
    let resp = client
        .post(format!("{base}/happenings/{}/flags", happening.id))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .json(&json!({ "changes_requested": "   " }))
        .send()
        .await
        .expect("failed to create flag");
    assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);

    // Only curators can list flags
    let resp = client
        .get(format!("{base}/flags"))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .send()
        .await
        .expect("failed to list flags");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    let resp = client
        .get(format!("{base}/flags?status=pending"))
        .header(header::AUTHORIZATION, format!("Bearer {curator_token}"))
        .send()
        .await
        .expect("failed to list flags");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    let flags = body["flags"].as_array().unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0]["happening_title"], "Flagged happening");

    // Resolving stamps the resolver
    let resp = client
        .post(format!("{base}/flags/{flag_id}/resolve"))
        .header(header::AUTHORIZATION, format!("Bearer {curator_token}"))
        .json(&json!({ "status": "resolved" }))
        .send()
        .await
        .expect("failed to resolve flag");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["flag"]["status"], "resolved");
    assert_eq!(
        body["flag"]["resolved_by_user_id"].as_str().unwrap(),
        curator.id.to_string()
    );
    assert!(!body["flag"]["resolved_at"].is_null());

    // Resolving back to pending is not a thing
    let resp = client
        .post(format!("{base}/flags/{flag_id}/resolve"))
        .header(header::AUTHORIZATION, format!("Bearer {curator_token}"))
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .expect("failed to resolve flag");
    assert_eq!(resp.status(), http::StatusCode::BAD_REQUEST);

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

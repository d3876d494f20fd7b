use core::time;

use common::prelude::FutureTimeout;
use http::header;
use serde_json::{json, Value};
use serial_test::serial;

use crate::database::UserRole;
use crate::tests::global::{clear_database, mock_global_state};
use crate::tests::{seed_user, start_server, test_config};

#[serial]
#[tokio::test]
async fn test_serial_role_management() {
    let port = portpicker::pick_unused_port().expect("failed to pick port");
    let (global, handler) = mock_global_state(test_config(port)).await;
    clear_database(&global).await;

    let (admin, admin_token) = seed_user(&global, "admin@example.com", UserRole::Admin).await;
    let (basic, basic_token) = seed_user(&global, "basic@example.com", UserRole::Basic).await;

    let handle = start_server(&global).await;

    let client = reqwest::Client::new();
    let base = format!("http://localhost:{port}/v1");

    // The role lookup
    let resp = client
        .get(format!("{base}/users/me"))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .send()
        .await
        .expect("failed to get me");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["user"]["role"], "basic");

    // Only admins list users
    let resp = client
        .get(format!("{base}/users"))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .send()
        .await
        .expect("failed to list users");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    let resp = client
        .get(format!("{base}/users"))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .send()
        .await
        .expect("failed to list users");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    // Promote the basic user
    let resp = client
        .patch(format!("{base}/users/{}/role", basic.id))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .json(&json!({ "role": "curator" }))
        .send()
        .await
        .expect("failed to update role");
    assert_eq!(resp.status(), http::StatusCode::OK);
    let body: Value = resp.json().await.expect("failed to read body");
    assert_eq!(body["user"]["role"], "curator");

    // An admin cannot change their own role
    let resp = client
        .patch(format!("{base}/users/{}/role", admin.id))
        .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
        .json(&json!({ "role": "basic" }))
        .send()
        .await
        .expect("failed to update role");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

    // Nor can the (freshly promoted) curator touch roles at all
    let resp = client
        .patch(format!("{base}/users/{}/role", admin.id))
        .header(header::AUTHORIZATION, format!("Bearer {basic_token}"))
        .json(&json!({ "role": "basic" }))
        .send()
        .await
        .expect("failed to update role");
    assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

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

//! First-account registration against a running API over an empty `staff`
//! table. Run it alone, before creating the test super admin:
//!
//! ```bash
//! cargo test -p emporium-integration-tests --test bootstrap -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use emporium_integration_tests::{TestClient, unique};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires a running API over a database with no staff"]
async fn test_concurrent_first_registrations_create_one_super_admin() {
    let client = TestClient::anonymous();
    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let body = json!({
                    "name": "Founder",
                    "email": format!("{}@shop.test", unique("founder")),
                    "password": "correct horse battery staple",
                    "role": "staff",
                });
                client.post("/api/auth/register", body).await
            })
        })
        .collect();

    let mut created = Vec::new();
    for attempt in attempts {
        let (status, body) = attempt.await.unwrap();
        match status {
            StatusCode::CREATED => created.push(body),
            StatusCode::UNAUTHORIZED => {}
            other => panic!("unexpected {other}: {body}"),
        }
    }

    assert_eq!(created.len(), 1, "{created:?}");
    assert_eq!(created[0]["role"], "super_admin");
}

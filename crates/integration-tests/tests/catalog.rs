//! Categories, subcategories and coupons against a running API.
//!
//! See the crate docs for the environment these tests need.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use emporium_integration_tests::{TestClient, unique};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn create_category(client: &TestClient, active: bool) -> i64 {
    let name = unique("Category");
    let (status, body) = client
        .post(
            "/api/categories",
            json!({ "name": name, "isActive": active }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

async fn create_subcategory(client: &TestClient, parents: &[i64]) -> i64 {
    let name = unique("Subcategory");
    let (status, body) = client
        .post(
            "/api/subcategories",
            json!({ "name": name, "categoryIds": parents }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_category_delete_removes_only_orphans() {
    let client = TestClient::staff().await;
    let doomed = create_category(&client, true).await;
    let survivor = create_category(&client, true).await;

    let orphan = create_subcategory(&client, &[doomed]).await;
    let shared = create_subcategory(&client, &[doomed, survivor]).await;

    let (status, body) = client
        .send(
            reqwest::Method::DELETE,
            &format!("/api/categories/{doomed}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body["removedSubcategoryIds"]), vec![orphan]);

    let (status, _) = client.get(&format!("/api/subcategories/{orphan}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, parents) = client
        .get(&format!("/api/subcategories/{shared}/categories"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let parent_ids: Vec<i64> = parents
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_i64())
        .collect();
    assert_eq!(parent_ids, vec![survivor]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_concurrent_parent_deletes_remove_shared_child() {
    let client = TestClient::staff().await;
    for _ in 0..5 {
        let first = create_category(&client, true).await;
        let second = create_category(&client, true).await;
        let shared = create_subcategory(&client, &[first, second]).await;

        let first_path = format!("/api/categories/{first}");
        let second_path = format!("/api/categories/{second}");
        let (a, b) = tokio::join!(client.delete(&first_path), client.delete(&second_path));
        assert!(a.is_success() && b.is_success(), "{a} {b}");

        let (status, _) = client.get(&format!("/api/subcategories/{shared}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "subcategory {shared} outlived both parents");
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_mapping_is_unique_per_pair() {
    let client = TestClient::staff().await;
    let category = create_category(&client, true).await;
    let subcategory = create_subcategory(&client, &[]).await;

    let path = format!("/api/categories/{category}/subcategories");
    let mapping = json!({ "subcategoryId": subcategory, "sortOrder": 2 });

    let (status, body) = client.post(&path, mapping.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, _) = client.post(&path, mapping).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let status = client.delete(&format!("{path}/{subcategory}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_inactive_category_is_hidden_from_anonymous_callers() {
    let client = TestClient::staff().await;
    let hidden = create_category(&client, false).await;
    let path = format!("/api/categories/{hidden}");

    let (status, _) = client.get(&path).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = TestClient::anonymous().get(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_coupon_validation() {
    let client = TestClient::staff().await;
    let code = unique("save").replace('-', "");

    let (status, body) = client
        .post(
            "/api/coupons",
            json!({
                "code": code,
                "discountType": "percentage",
                "discountValue": "10",
                "minOrderAmount": "50",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["code"], code.to_uppercase());

    let anonymous = TestClient::anonymous();
    let (status, result) = anonymous
        .post(
            "/api/coupons/validate",
            json!({ "code": code, "orderTotal": "80.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["valid"], true);
    let discount: f64 = result["discount"].as_str().unwrap().parse().unwrap();
    assert!((discount - 8.0).abs() < f64::EPSILON);

    let (_, result) = anonymous
        .post(
            "/api/coupons/validate",
            json!({ "code": code, "orderTotal": "20.00" }),
        )
        .await;
    assert_eq!(result["valid"], false);
    assert!(result["message"].is_string());

    let (_, result) = anonymous
        .post(
            "/api/coupons/validate",
            json!({ "code": "NOPE-NOT-A-CODE", "orderTotal": "80.00" }),
        )
        .await;
    assert_eq!(result["valid"], false);
}

//! Order lifecycle and stock dispatch against a running API.
//!
//! See the crate docs for the environment these tests need.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use emporium_integration_tests::TestClient;
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_dispatch_decrements_stock_once() {
    let client = TestClient::staff().await;
    let (product_id, _) = client.create_product("12.50", 10).await;

    // Two lines for the same product are taken together.
    let order_id = client.create_order(&[(product_id, 2), (product_id, 1)]).await;

    let (status, body) = client.set_status(order_id, "dispatched").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["previousStatus"], "pending");
    let changes = body["stockChanges"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["before"], 10);
    assert_eq!(changes[0]["after"], 7);
    assert_eq!(client.product_quantity(product_id).await, 7);

    // Moving further along does not take stock again.
    let (status, body) = client.set_status(order_id, "shipped").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["stockChanges"].as_array().map(Vec::len), Some(0));
    assert_eq!(client.product_quantity(product_id).await, 7);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_dispatch_with_insufficient_stock_changes_nothing() {
    let client = TestClient::staff().await;
    let (plenty, _) = client.create_product("5.00", 50).await;
    let (scarce, _) = client.create_product("5.00", 1).await;

    let order_id = client.create_order(&[(plenty, 3), (scarce, 2)]).await;

    let (status, body) = client.set_status(order_id, "dispatched").await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert!(body["error"].is_string());

    // The transaction rolled back: neither stock row nor the order moved.
    assert_eq!(client.product_quantity(plenty).await, 50);
    assert_eq!(client.product_quantity(scarce).await, 1);
    let (_, order) = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_concurrent_dispatch_never_oversells() {
    let client = TestClient::staff().await;
    let (product_id, _) = client.create_product("9.99", 5).await;

    let mut orders = Vec::new();
    for _ in 0..4 {
        orders.push(client.create_order(&[(product_id, 2)]).await);
    }

    let handles: Vec<_> = orders
        .iter()
        .map(|&order_id| {
            let client = client.clone();
            tokio::spawn(async move { client.set_status(order_id, "dispatched").await.0 })
        })
        .collect();

    let mut dispatched = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => dispatched += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(dispatched, 2);
    assert_eq!(client.product_quantity(product_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_lifecycle_is_enforced() {
    let client = TestClient::staff().await;
    let (product_id, _) = client.create_product("3.00", 10).await;
    let order_id = client.create_order(&[(product_id, 1)]).await;

    let (status, _) = client.set_status(order_id, "refunded").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client.set_status(order_id, "delivered").await;
    assert_eq!(status, StatusCode::OK);

    // Delivered is terminal.
    let (status, _) = client.set_status(order_id, "cancelled").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Only pending or cancelled orders may be deleted.
    let status = client.delete(&format!("/api/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL and a running API"]
async fn test_order_totals_and_csv_export() {
    let client = TestClient::staff().await;
    let (product_id, sku) = client.create_product("19.99", 10).await;
    let order_id = client.create_order(&[(product_id, 3)]).await;

    let (_, order) = client.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(order["subtotal"], "59.97");
    assert_eq!(order["items"][0]["sku"], sku.as_str());

    let (status, csv) = client
        .send_text(reqwest::Method::GET, "/api/orders/export/csv")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(csv.starts_with("Order Number,"), "{csv}");
    assert!(csv.contains(&order["orderNumber"].as_str().unwrap().to_string()));

    let status = client.delete(&format!("/api/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

//! Integration tests for Emporium.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`emporium migrate`)
//! - The API server running (`cargo run -p emporium-api`)
//! - A super admin account (`emporium staff create -r super_admin ...`) whose
//!   credentials are in `TEST_STAFF_EMAIL` and `TEST_STAFF_PASSWORD`
//!
//! Run with:
//!
//! ```bash
//! cargo test -p emporium-integration-tests -- --ignored --skip first_registrations
//! ```
//!
//! `tests/bootstrap.rs` is the exception: it needs a database with no staff
//! at all and runs on its own.
//!
//! Every test creates its own rows under unique SKUs and slugs, so the suite
//! can run against a shared development database.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Short random suffix for SKUs, slugs and emails.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..12).unwrap_or(&id))
}

/// HTTP client with an optional bearer token.
#[derive(Clone)]
pub struct TestClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TestClient {
    /// Anonymous client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url(),
            token: None,
        }
    }

    /// Client logged in as the test staff account.
    ///
    /// # Panics
    ///
    /// Panics if the credentials are missing or rejected.
    pub async fn staff() -> Self {
        let email = std::env::var("TEST_STAFF_EMAIL").expect("TEST_STAFF_EMAIL not set");
        let password = std::env::var("TEST_STAFF_PASSWORD").expect("TEST_STAFF_PASSWORD not set");

        let mut client = Self::anonymous();
        let (status, body) = client
            .send(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        client.token = body["token"].as_str().map(ToString::to_string);
        client
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    ///
    /// # Panics
    ///
    /// Panics if the server is unreachable.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("API unreachable");
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, json)
    }

    /// Send a request and return the raw body.
    ///
    /// # Panics
    ///
    /// Panics if the server is unreachable.
    pub async fn send_text(&self, method: Method, path: &str) -> (StatusCode, String) {
        let response = self
            .request(method, path)
            .send()
            .await
            .expect("API unreachable");
        let status = response.status();
        (status, response.text().await.unwrap_or_default())
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> StatusCode {
        self.send(Method::DELETE, path, None).await.0
    }

    /// Create an active product without variants holding `stock` units.
    ///
    /// Returns `(product id, sku)`.
    ///
    /// # Panics
    ///
    /// Panics if the product cannot be created.
    pub async fn create_product(&self, price: &str, stock: i32) -> (i64, String) {
        let sku = unique("IT");
        let (status, body) = self
            .post(
                "/api/products",
                json!({
                    "name": format!("Integration {sku}"),
                    "sku": sku,
                    "sellingPrice": price,
                    "status": "active",
                    "initialStock": stock,
                    "minStock": 1,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "product create failed: {body}");
        let id = body["id"].as_i64().expect("product id");
        (id, sku)
    }

    /// Current quantity of a product's own stock row.
    ///
    /// # Panics
    ///
    /// Panics if the product has no stock row.
    pub async fn product_quantity(&self, product_id: i64) -> i64 {
        let (status, body) = self
            .get(&format!("/api/stock?productId={product_id}"))
            .await;
        assert_eq!(status, StatusCode::OK, "stock list failed: {body}");
        body["data"]
            .as_array()
            .and_then(|rows| rows.iter().find(|r| r["variantId"].is_null()))
            .and_then(|row| row["quantity"].as_i64())
            .expect("stock row")
    }

    /// Create a pending order with one line per `(product id, quantity)`.
    ///
    /// # Panics
    ///
    /// Panics if the order cannot be created.
    pub async fn create_order(&self, lines: &[(i64, i32)]) -> i64 {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity)| json!({ "productId": product_id, "quantity": quantity }))
            .collect();
        let (status, body) = self.post("/api/orders", json!({ "items": items })).await;
        assert_eq!(status, StatusCode::CREATED, "order create failed: {body}");
        body["id"].as_i64().expect("order id")
    }

    /// Request a status change.
    pub async fn set_status(&self, order_id: i64, status: &str) -> (StatusCode, Value) {
        self.put(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": status }),
        )
        .await
    }
}

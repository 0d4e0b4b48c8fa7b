//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST /api/auth/login                 - Issue a JWT (body + authToken cookie)
//! POST /api/auth/register              - Create staff (super admin, or first account)
//! POST /api/auth/logout                - Clear the auth cookie
//! GET  /api/auth/me                    - Current staff member
//! PUT  /api/auth/update-password       - Change own password
//! POST /api/auth/forgot-password       - Email a one-hour reset link
//! POST /api/auth/reset-password        - Set a new password from a reset token
//!
//! # Catalog
//! GET    /api/products                 - List (public: active only)
//! POST   /api/products                 - Create with variants and opening stock
//! GET    /api/products/export/{format} - csv | json
//! POST   /api/products/import/csv      - Multipart upsert by SKU
//! GET    /api/products/{id_or_slug}    - Detail (public: active only)
//! PUT    /api/products/{id}            - Partial update
//! DELETE /api/products/{id}            - Archive, or ?permanent=true
//! POST   /api/products/{id}/variants   - Add variant
//! PUT    /api/products/{id}/variants/{variant_id}
//! DELETE /api/products/{id}/variants/{variant_id}
//!
//! GET    /api/categories               - List (public: active only)
//! GET    /api/categories/tree          - Categories with nested subcategories
//! POST   /api/categories
//! GET    /api/categories/{id}
//! PUT    /api/categories/{id}
//! DELETE /api/categories/{id}          - Also removes orphaned subcategories
//! GET    /api/categories/{id}/subcategories
//! POST   /api/categories/{id}/subcategories             - Map a subcategory
//! PUT    /api/categories/{id}/subcategories/{sub_id}    - Sort order / primary
//! DELETE /api/categories/{id}/subcategories/{sub_id}    - Unmap
//!
//! GET    /api/subcategories
//! POST   /api/subcategories
//! GET    /api/subcategories/{id}
//! PUT    /api/subcategories/{id}
//! DELETE /api/subcategories/{id}
//! GET    /api/subcategories/{id}/categories
//!
//! # Inventory
//! GET    /api/stock                    - List (?lowStock=true)
//! POST   /api/stock
//! GET    /api/stock/low-stock          - Counts plus the lowest rows
//! GET    /api/stock/export/{format}
//! POST   /api/stock/import/csv
//! GET    /api/stock/{id}
//! PUT    /api/stock/{id}
//! DELETE /api/stock/{id}
//! POST   /api/stock/{id}/adjust        - Delta with reason
//!
//! # Sales
//! GET    /api/orders
//! POST   /api/orders
//! GET    /api/orders/export/{format}
//! GET    /api/orders/{id}
//! PUT    /api/orders/{id}
//! DELETE /api/orders/{id}              - Pending or cancelled only
//! PUT    /api/orders/{id}/status       - Lifecycle move; dispatch consumes stock
//!
//! GET    /api/customers
//! POST   /api/customers
//! GET    /api/customers/export/{format}
//! GET    /api/customers/firebase/{uid}
//! GET    /api/customers/{id}           - Detail with stats and recent orders
//! PUT    /api/customers/{id}
//! DELETE /api/customers/{id}
//!
//! GET    /api/coupons
//! POST   /api/coupons
//! POST   /api/coupons/validate         - Public
//! GET    /api/coupons/{id}
//! PUT    /api/coupons/{id}
//! DELETE /api/coupons/{id}
//!
//! # Marketing
//! GET    /api/ratings
//! POST   /api/ratings                  - Public submission
//! GET    /api/ratings/product/{product_id} - Public, approved only
//! PUT    /api/ratings/{id}/approve
//! DELETE /api/ratings/{id}
//!
//! GET    /api/bulk-orders
//! POST   /api/bulk-orders              - Public inquiry
//! GET    /api/bulk-orders/{id}
//! PUT    /api/bulk-orders/{id}
//! DELETE /api/bulk-orders/{id}
//!
//! GET    /api/special-offers
//! GET    /api/special-offers/active    - Public
//! POST   /api/special-offers
//! GET    /api/special-offers/{id}
//! PUT    /api/special-offers/{id}
//! DELETE /api/special-offers/{id}
//! (same shape under /api/marquee-offers)
//!
//! # Staff and reporting
//! GET    /api/staff
//! POST   /api/staff
//! GET    /api/staff/{id}
//! PUT    /api/staff/{id}
//! DELETE /api/staff/{id}
//!
//! GET    /api/analytics/dashboard
//! GET    /api/analytics/sales          - ?from=&to=&granularity=day|month
//! GET    /api/analytics/top-products   - ?limit=
//! GET    /api/analytics/inventory
//! ```
//!
//! Every analytics route also accepts `?format=csv`.

pub mod analytics;
pub mod auth;
pub mod bulk_orders;
pub mod categories;
pub mod coupons;
pub mod customers;
pub mod export;
pub mod offers;
pub mod orders;
pub mod products;
pub mod ratings;
pub mod staff;
pub mod stock;
pub mod subcategories;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/update-password", put(auth::update_password))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/export/{format}", get(products::export))
        .route(
            "/import/csv",
            post(products::import).layer(DefaultBodyLimit::max(export::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/variants", post(products::add_variant))
        .route(
            "/{id}/variants/{variant_id}",
            put(products::update_variant).delete(products::delete_variant),
        )
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/tree", get(categories::tree))
        .route(
            "/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route(
            "/{id}/subcategories",
            get(categories::subcategories).post(categories::map_subcategory),
        )
        .route(
            "/{id}/subcategories/{subcategory_id}",
            put(categories::update_mapping).delete(categories::unmap_subcategory),
        )
}

/// Create the subcategory routes router.
pub fn subcategory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(subcategories::index).post(subcategories::create))
        .route(
            "/{id}",
            get(subcategories::show)
                .put(subcategories::update)
                .delete(subcategories::delete),
        )
        .route("/{id}/categories", get(subcategories::categories))
}

/// Create the stock routes router.
pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(stock::index).post(stock::create))
        .route("/low-stock", get(stock::low_stock))
        .route("/export/{format}", get(stock::export))
        .route(
            "/import/csv",
            post(stock::import).layer(DefaultBodyLimit::max(export::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/{id}",
            get(stock::show).put(stock::update).delete(stock::delete),
        )
        .route("/{id}/adjust", post(stock::adjust))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/export/{format}", get(orders::export))
        .route(
            "/{id}",
            get(orders::show).put(orders::update).delete(orders::delete),
        )
        .route("/{id}/status", put(orders::change_status))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(customers::index).post(customers::create))
        .route("/export/{format}", get(customers::export))
        .route("/firebase/{uid}", get(customers::by_firebase_uid))
        .route(
            "/{id}",
            get(customers::show)
                .put(customers::update)
                .delete(customers::delete),
        )
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/validate", post(coupons::validate))
        .route(
            "/{id}",
            get(coupons::show)
                .put(coupons::update)
                .delete(coupons::delete),
        )
}

/// Create the rating routes router.
pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(ratings::index).post(ratings::create))
        .route("/product/{product_id}", get(ratings::for_product))
        .route("/{id}/approve", put(ratings::approve))
        .route("/{id}", delete(ratings::delete))
}

/// Create the bulk order routes router.
pub fn bulk_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(bulk_orders::index).post(bulk_orders::create))
        .route(
            "/{id}",
            get(bulk_orders::show)
                .put(bulk_orders::update)
                .delete(bulk_orders::delete),
        )
}

/// Create the special offer routes router.
pub fn special_offer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(offers::special_index).post(offers::special_create),
        )
        .route("/active", get(offers::special_active))
        .route(
            "/{id}",
            get(offers::special_show)
                .put(offers::special_update)
                .delete(offers::special_delete),
        )
}

/// Create the marquee offer routes router.
pub fn marquee_offer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(offers::marquee_index).post(offers::marquee_create),
        )
        .route("/active", get(offers::marquee_active))
        .route(
            "/{id}",
            get(offers::marquee_show)
                .put(offers::marquee_update)
                .delete(offers::marquee_delete),
        )
}

/// Create the staff routes router.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(staff::index).post(staff::create))
        .route(
            "/{id}",
            get(staff::show).put(staff::update).delete(staff::delete),
        )
}

/// Create the analytics routes router.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(analytics::dashboard))
        .route("/sales", get(analytics::sales))
        .route("/top-products", get(analytics::top_products))
        .route("/inventory", get(analytics::inventory))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        // Catalog
        .nest("/api/products", product_routes())
        .nest("/api/categories", category_routes())
        .nest("/api/subcategories", subcategory_routes())
        // Inventory and sales
        .nest("/api/stock", stock_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/customers", customer_routes())
        .nest("/api/coupons", coupon_routes())
        // Marketing
        .nest("/api/ratings", rating_routes())
        .nest("/api/bulk-orders", bulk_order_routes())
        .nest("/api/special-offers", special_offer_routes())
        .nest("/api/marquee-offers", marquee_offer_routes())
        // Administration
        .nest("/api/staff", staff_routes())
        .nest("/api/analytics", analytics_routes())
}

//! HTTP middleware and auth extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span)
//! 4. CORS
//! 5. Security headers (`tower_http::set_header`, see [`crate::app`])

pub mod auth;
pub mod request_id;

pub use auth::{
    AUTH_COOKIE, OptionalStaff, RequireAdmin, RequireStaff, RequireSuperAdmin, auth_cookie,
    clear_auth_cookie,
};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

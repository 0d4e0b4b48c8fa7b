//! Per-request correlation id.
//!
//! A proxy-supplied `x-request-id` is kept when it is short printable ASCII;
//! anything else is replaced with a fresh UUID v4. Handlers can read the id
//! through the [`RequestId`] request extension.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_LEN: usize = 128;

/// Correlation id of the current request.
#[derive(Debug, Clone)]
pub struct RequestId(HeaderValue);

impl RequestId {
    fn from_upstream(value: &HeaderValue) -> Option<Self> {
        let bytes = value.as_bytes();
        let usable = !bytes.is_empty()
            && bytes.len() <= MAX_LEN
            && bytes.iter().all(|b| b.is_ascii_graphic());
        usable.then(|| Self(value.clone()))
    }

    fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        Self(HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("unknown")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or_default()
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(RequestId::from_upstream)
        .unwrap_or_else(RequestId::generate);

    Span::current().record("request_id", id.as_str());
    sentry::configure_scope(|scope| scope.set_tag("request_id", id.as_str()));

    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, id.0);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_sanitised() {
        let kept = RequestId::from_upstream(&HeaderValue::from_static("req-123"));
        assert_eq!(kept.as_ref().map(RequestId::as_str), Some("req-123"));

        let long = "x".repeat(MAX_LEN + 1);
        for bad in ["", "has space", long.as_str()] {
            let value = HeaderValue::from_str(bad).unwrap_or(HeaderValue::from_static(""));
            assert!(RequestId::from_upstream(&value).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_generated_id_is_a_uuid() {
        let id = RequestId::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }
}

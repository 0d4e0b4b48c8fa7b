//! Authentication extractors for route handlers.
//!
//! A request is authenticated by a JWT in `Authorization: Bearer <token>` or,
//! failing that, in the `authToken` cookie set by `/api/auth/login`. The
//! staff row is reloaded on every request so deactivating an account or
//! changing its role takes effect before the token expires.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::staff::Staff;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Name of the cookie carrying the JWT.
pub const AUTH_COOKIE: &str = "authToken";

/// Extractor that requires any active staff member.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireStaff(staff): RequireStaff) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff(pub Staff);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, state).await.map(Self)
    }
}

/// Extractor that requires an `admin` or `super_admin`.
///
/// Returns 401 without a valid token and 403 for plain staff.
pub struct RequireAdmin(pub Staff);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let staff = authenticate(&parts.headers, state).await?;
        if !staff.role.can_manage_store() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(staff))
    }
}

/// Extractor that requires a `super_admin`.
pub struct RequireSuperAdmin(pub Staff);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let staff = authenticate(&parts.headers, state).await?;
        if staff.role != emporium_core::StaffRole::SuperAdmin {
            return Err(AppError::Forbidden("Super admin access required".to_string()));
        }
        Ok(Self(staff))
    }
}

/// Extractor that optionally gets the current staff member.
///
/// Unlike [`RequireStaff`], a missing or invalid token yields `None` instead
/// of rejecting, so public routes can widen what staff see.
pub struct OptionalStaff(pub Option<Staff>);

impl FromRequestParts<AppState> for OptionalStaff {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_or_cookie(&parts.headers).is_none() {
            return Ok(Self(None));
        }
        Ok(Self(authenticate(&parts.headers, state).await.ok()))
    }
}

async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Staff, AppError> {
    let token = bearer_or_cookie(headers).ok_or(AuthError::MissingToken)?;
    let staff = AuthService::new(state.pool(), state.jwt())
        .authenticate(token)
        .await?;
    set_sentry_user(staff.id.as_i32(), Some(staff.email.as_str()));
    Ok(staff)
}

/// Token from the `Authorization` header, else from the auth cookie.
fn bearer_or_cookie(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|t| !t.is_empty());

    bearer.or_else(|| cookie_value(headers, AUTH_COOKIE))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value that stores `token` for `max_age` seconds.
///
/// # Errors
///
/// Returns `AppError::Internal` if the token is not a valid header value.
pub fn auth_cookie(token: &str, max_age: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}"
    ))
    .map_err(|e| AppError::Internal(format!("invalid auth cookie: {e}")))
}

/// `Set-Cookie` value that removes the auth cookie.
#[must_use]
pub fn clear_auth_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("authToken=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("authToken=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_token() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer abc.def.ghi")]);
        assert_eq!(bearer_or_cookie(&h), Some("abc.def.ghi"));

        let h = headers(&[(header::AUTHORIZATION, "bearer  abc")]);
        assert_eq!(bearer_or_cookie(&h), Some("abc"));

        let h = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(bearer_or_cookie(&h), None);
    }

    #[test]
    fn test_cookie_fallback() {
        let h = headers(&[(header::COOKIE, "theme=dark; authToken=tok123; other=1")]);
        assert_eq!(bearer_or_cookie(&h), Some("tok123"));

        let h = headers(&[(header::COOKIE, "authTokenX=nope")]);
        assert_eq!(bearer_or_cookie(&h), None);

        let h = headers(&[(header::COOKIE, "authToken=")]);
        assert_eq!(bearer_or_cookie(&h), None);
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "authToken=from-cookie"),
        ]);
        assert_eq!(bearer_or_cookie(&h), Some("from-header"));
    }

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie("tok", 3600, false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "authToken=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
        let cookie = auth_cookie("tok", 60, true).unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));

        assert!(clear_auth_cookie(false).to_str().unwrap().contains("Max-Age=0"));
    }
}

//! JWT issuing and validation.
//!
//! Tokens are HS256-signed with `JWT_SECRET` and carry the staff id, email and
//! role. The role in the token is informational; extractors reload the staff
//! row on every request so deactivation and role changes apply immediately.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use emporium_core::{StaffId, StaffRole};

use super::AuthError;
use crate::config::JwtConfig;

const ISSUER: &str = "emporium-api";

/// Claims stored in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Staff id (Subject)
    pub sub: String,
    pub email: String,
    pub role: StaffRole,
    /// Expiry timestamp
    pub exp: i64,
    /// Issued-at timestamp
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    /// Staff id from the subject claim.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the subject is not an id.
    pub fn staff_id(&self) -> Result<StaffId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(StaffId::new)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// JWT token service.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl JwtService {
    /// Build from configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime: Duration::hours(config.expiry_hours),
        }
    }

    /// Issue a token for a staff member.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenGeneration` if signing fails.
    pub fn issue(&self, id: StaffId, email: &str, role: StaffRole) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + self.lifetime).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    /// Validate and decode a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExpiredToken` past expiry, otherwise
    /// `AuthError::InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Token lifetime in seconds, used for the cookie `Max-Age`.
    #[must_use]
    pub fn max_age_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn service(secret: &str, hours: i64) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: SecretString::from(secret),
            expiry_hours: hours,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = service("kV9#mQ2!xL7@pR4$wZ8^nB3&tY6*hJ1%", 24);
        let token = jwt
            .issue(StaffId::new(42), "ops@shop.test", StaffRole::Admin)
            .unwrap();

        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.staff_id().unwrap(), StaffId::new(42));
        assert_eq!(claims.email, "ops@shop.test");
        assert_eq!(claims.role, StaffRole::Admin);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(jwt.max_age_seconds(), 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service("kV9#mQ2!xL7@pR4$wZ8^nB3&tY6*hJ1%", 1)
            .issue(StaffId::new(1), "a@shop.test", StaffRole::Staff)
            .unwrap();
        let other = service("Zq8&uP3@cN6!vB1#mX4$kT7^rW2*yH5%", 1);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative lifetime puts exp well before the default leeway
        let jwt = service("kV9#mQ2!xL7@pR4$wZ8^nB3&tY6*hJ1%", -1);
        let token = jwt
            .issue(StaffId::new(1), "a@shop.test", StaffRole::Staff)
            .unwrap();
        assert!(matches!(jwt.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_garbage_rejected() {
        let jwt = service("kV9#mQ2!xL7@pR4$wZ8^nB3&tY6*hJ1%", 1);
        assert!(matches!(jwt.verify("not.a.jwt"), Err(AuthError::InvalidToken)));
    }
}

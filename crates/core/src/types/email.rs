//! Email address type.
//!
//! Emails are the login key for staff and the identity key for customers, so
//! they are normalized on parse: surrounding whitespace is trimmed and the
//! address is lower-cased. Two spellings of the same mailbox compare equal.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Why a string was rejected as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,
    #[error("email {0}")]
    Malformed(&'static str),
}

/// A normalized email address.
///
/// Accepted addresses are at most 254 bytes, contain no whitespace, and have
/// exactly one `@` between a non-empty mailbox and a dotted domain.
///
/// ```
/// use emporium_core::Email;
///
/// let email = Email::parse("  Jane.Doe@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "jane.doe@example.com");
/// assert!(Email::parse("user@localhost").is_err());
/// ```
///
/// Database values are decoded without re-validation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Trim, validate and lower-case an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the input trips.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let candidate = raw.trim();
        match candidate.len() {
            0 => return Err(EmailError::Empty),
            n if n > Self::MAX_LENGTH => return Err(EmailError::TooLong),
            _ => {}
        }
        if candidate.contains(char::is_whitespace) {
            return Err(EmailError::Malformed("cannot contain whitespace"));
        }

        let mut parts = candidate.split('@');
        let (Some(mailbox), Some(domain), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EmailError::Malformed("must contain exactly one @"));
        };
        if mailbox.is_empty() {
            return Err(EmailError::Malformed("needs a name before the @"));
        }
        let dotted = domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2;
        if !dotted || domain.starts_with('.') || domain.ends_with('.') {
            return Err(EmailError::Malformed("domain is invalid"));
        }

        Ok(Self(candidate.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let email = Email::parse("  Shop.Owner@Example.COM\n").unwrap();
        assert_eq!(email.as_str(), "shop.owner@example.com");
        assert_eq!(email.domain(), "example.com");
        assert_eq!(email, "shop.owner@EXAMPLE.com".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        for bad in [
            "plainaddress",
            "a@b@c.com",
            "@example.com",
            "user@localhost",
            "user@.com",
            "user@shop..",
            "first last@example.com",
        ] {
            assert!(
                matches!(Email::parse(bad), Err(EmailError::Malformed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Email = serde_json::from_str("\"Buyer@Shop.io\"").unwrap();
        assert_eq!(ok.as_str(), "buyer@shop.io");
        let err = serde_json::from_str::<Email>("\"not-an-email\"").unwrap_err();
        assert!(err.to_string().contains("exactly one @"));
    }
}

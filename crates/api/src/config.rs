//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4000)
//! - `API_BASE_URL` - Public URL of this API (default: <http://localhost:4000>).
//!   The `authToken` cookie is marked `Secure` when this is https.
//! - `DASHBOARD_URL` - Admin dashboard URL used in password reset links
//!   (default: `API_BASE_URL`)
//! - `JWT_EXPIRY_HOURS` - Token lifetime in hours (default: 24)
//! - `CORS_ORIGINS` - Comma-separated list of allowed browser origins
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE` - Error tracking
//!
//! ## Optional (SMTP - all or none)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Email sender address
//!
//! Without SMTP, password reset requests are logged and no mail goes out.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Everything the API reads from its environment at startup.
///
/// Secrets are `SecretString`, so the derived `Debug` output redacts them.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public URL of this API. An `https` scheme turns on secure cookies.
    pub base_url: Url,
    /// Where password reset links point. Defaults to `base_url`.
    pub dashboard_url: Url,
    pub jwt: JwtConfig,
    /// Empty means same-origin only.
    pub cors_origins: Vec<String>,
    /// `None` disables outgoing mail.
    pub email: Option<EmailConfig>,
    pub log_format: LogFormat,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub expiry_hours: i64,
}

/// SMTP relay settings for password reset mail.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// `From` header, either `addr@host` or `Name <addr@host>`.
    pub from_address: String,
}

impl ApiConfig {
    /// Load configuration from the environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, or `JWT_SECRET` fails the strength checks.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal in production
        let _ = dotenvy::dotenv();

        let base_url: Url = env::parse_or("API_BASE_URL", "http://localhost:4000")?;
        let dashboard_url = env::parse_opt("DASHBOARD_URL")?.unwrap_or_else(|| base_url.clone());
        let log_format = match env::optional("LOG_FORMAT") {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url: SecretString::from(env::required("DATABASE_URL")?),
            host: env::parse_or("API_HOST", "127.0.0.1")?,
            port: env::parse_or("API_PORT", "4000")?,
            base_url,
            dashboard_url,
            jwt: JwtConfig::from_env()?,
            cors_origins: parse_list(&env::optional("CORS_ORIGINS").unwrap_or_default()),
            email: EmailConfig::from_env()?,
            log_format,
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env::parse_opt("SENTRY_SAMPLE_RATE")?.unwrap_or(1.0),
            sentry_traces_sample_rate: env::parse_opt("SENTRY_TRACES_SAMPLE_RATE")?
                .unwrap_or(0.1),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the auth cookie must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Link emailed to staff for resetting their password.
    #[must_use]
    pub fn password_reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={token}",
            self.dashboard_url.as_str().trim_end_matches('/')
        )
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = env::required("JWT_SECRET")?;
        check_signing_secret("JWT_SECRET", &secret)?;

        let expiry_hours = match env::parse_opt::<i64>("JWT_EXPIRY_HOURS")? {
            Some(hours) if hours <= 0 => {
                return Err(ConfigError::InvalidEnvVar(
                    "JWT_EXPIRY_HOURS".to_string(),
                    "must be a positive integer".to_string(),
                ));
            }
            Some(hours) => hours,
            None => DEFAULT_JWT_EXPIRY_HOURS,
        };

        Ok(Self {
            secret: SecretString::from(secret),
            expiry_hours,
        })
    }
}

impl EmailConfig {
    /// `None` when no SMTP variable is set; an error when only some are.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let vars = (
            env::optional("SMTP_HOST"),
            env::optional("SMTP_USERNAME"),
            env::optional("SMTP_PASSWORD"),
            env::optional("SMTP_FROM"),
        );

        match vars {
            (None, None, None, None) => Ok(None),
            (Some(smtp_host), Some(smtp_username), Some(password), Some(from_address)) => {
                Ok(Some(Self {
                    smtp_host,
                    smtp_port: env::parse_or("SMTP_PORT", "587")?,
                    smtp_username,
                    smtp_password: SecretString::from(password),
                    from_address,
                }))
            }
            _ => Err(ConfigError::InvalidEnvVar(
                "SMTP_*".to_string(),
                "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Typed access to environment variables. Blank values count as unset.
mod env {
    use std::fmt::Display;
    use std::str::FromStr;

    use super::ConfigError;

    pub fn optional(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    pub fn required(key: &str) -> Result<String, ConfigError> {
        optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    pub fn parse_opt<T>(key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        optional(key).map(|raw| parse(key, &raw)).transpose()
    }

    pub fn parse_or<T>(key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        parse(key, &optional(key).unwrap_or_else(|| default.to_string()))
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject short, placeholder or low-entropy signing secrets.
fn check_signing_secret(key: &str, secret: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

    let length = secret.chars().count();
    if length < MIN_JWT_SECRET_LENGTH {
        return insecure(format!(
            "must be at least {MIN_JWT_SECRET_LENGTH} characters (got {length})"
        ));
    }

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return insecure(format!("looks like a placeholder (contains '{pattern}')"));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}); generate a random secret"
        ));
    }
    Ok(())
}

#[cfg(test)]
impl ApiConfig {
    /// Configuration for unit tests. Never touches the environment.
    #[allow(clippy::unwrap_used)]
    pub(crate) fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/emporium_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            base_url: Url::parse("http://localhost:4000").unwrap(),
            dashboard_url: Url::parse("http://localhost:5173").unwrap(),
            jwt: JwtConfig {
                secret: SecretString::from("kV9#mQ2!xL7@pR4$wZ8^nB3&tY6*hJ1%"),
                expiry_hours: 24,
            },
            cors_origins: Vec::new(),
            email: None,
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aaaa").abs() < f64::EPSILON);
    }

    #[test]
    fn test_signing_secret_checks() {
        let rejected = |secret: &str| {
            matches!(
                check_signing_secret("JWT_SECRET", secret),
                Err(ConfigError::InsecureSecret(..))
            )
        };
        assert!(rejected("short"));
        assert!(rejected("your-jwt-key-goes-here-please-now-ok"));
        assert!(rejected(&"ab".repeat(20)));
        assert!(check_signing_secret("JWT_SECRET", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%").is_ok());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" https://admin.shop.test, ,https://shop.test "),
            vec!["https://admin.shop.test", "https://shop.test"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_secure_cookies_follow_scheme() {
        let mut config = ApiConfig::for_tests();
        assert!(!config.secure_cookies());
        config.base_url = Url::parse("https://api.shop.test").unwrap();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_password_reset_link() {
        let mut config = ApiConfig::for_tests();
        config.dashboard_url = Url::parse("https://admin.shop.test/").unwrap();
        assert_eq!(
            config.password_reset_link("abc"),
            "https://admin.shop.test/reset-password?token=abc"
        );
    }

    #[test]
    fn test_socket_addr() {
        let addr = ApiConfig::for_tests().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ApiConfig {
            email: Some(EmailConfig {
                smtp_host: "smtp.shop.test".to_string(),
                smtp_port: 587,
                smtp_username: "mailer".to_string(),
                smtp_password: SecretString::from("super_secret_smtp_password"),
                from_address: "noreply@shop.test".to_string(),
            }),
            ..ApiConfig::for_tests()
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.shop.test"));
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
        assert!(!debug_output.contains("kV9#mQ2"));
    }
}

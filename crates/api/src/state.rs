//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::auth::JwtService;
use crate::services::email::{EmailError, Mailer};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtService,
    mailer: Option<Mailer>,
}

impl AppState {
    /// Build state from configuration and a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if SMTP is configured with a bad sender or relay.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, EmailError> {
        let jwt = JwtService::new(&config.jwt);
        let mailer = config.email.as_ref().map(Mailer::new).transpose()?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                mailer,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.inner.jwt
    }

    /// Mailer, when SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&Mailer> {
        self.inner.mailer.as_ref()
    }
}

//! CLI subcommands.

pub mod migrate;
pub mod staff;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Bad command-line input.
    #[error("{0}")]
    Invalid(String),

    /// Repository refused the write.
    #[error(transparent)]
    Repository(#[from] emporium_api::db::RepositoryError),

    /// Password rules or hashing.
    #[error(transparent)]
    Auth(#[from] emporium_api::services::auth::AuthError),
}

/// Connect to `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = emporium_api::db::create_pool(&database_url).await?;
    Ok(pool)
}

//! Database migration command.
//!
//! ```bash
//! emporium migrate
//! ```
//!
//! Applies every pending migration from `crates/api/migrations/` to
//! `DATABASE_URL`. Already-applied migrations are skipped.

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}

//! Rating repository.
//!
//! Storefront submissions start unapproved; only approved ratings count
//! towards a product's average.

use emporium_core::{PageRequest, ProductId, RatingId};
use sqlx::PgPool;

use super::{RepositoryError, found, like_pattern};
use crate::models::rating::{ProductRatings, Rating, RatingInput, RatingWithProduct};

const RATING_COLUMNS: &str = "id, product_id, customer_id, reviewer_name, rating, comment, \
     is_approved, created_at, updated_at";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR r.reviewer_name ILIKE $1
            OR r.comment ILIKE $1 OR p.name ILIKE $1)
       AND ($2::boolean IS NULL OR r.is_approved = $2)
       AND ($3::integer IS NULL OR r.product_id = $3)";

/// Filters for the moderation list.
#[derive(Debug, Default, Clone)]
pub struct RatingFilter {
    pub search: Option<String>,
    pub is_approved: Option<bool>,
    pub product_id: Option<ProductId>,
}

/// Repository for ratings.
pub struct RatingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RatingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All ratings for moderation, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &RatingFilter,
        page: PageRequest,
    ) -> Result<(Vec<RatingWithProduct>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as(&format!(
            "SELECT r.id, r.product_id, r.customer_id, r.reviewer_name, r.rating, r.comment,
                    r.is_approved, r.created_at, r.updated_at, p.name AS product_name
             FROM ratings r
             JOIN products p ON p.id = r.product_id
             {FILTER_WHERE}
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(&search)
        .bind(filter.is_approved)
        .bind(filter.product_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM ratings r
             JOIN products p ON p.id = r.product_id
             {FILTER_WHERE}"
        ))
        .bind(&search)
        .bind(filter.is_approved)
        .bind(filter.product_id)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Approved ratings of a product with their average.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn for_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<(ProductRatings, i64), RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(self.pool)
            .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let (average_rating, rating_count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::DOUBLE PRECISION, COUNT(*)
             FROM ratings WHERE product_id = $1 AND is_approved",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        let ratings = sqlx::query_as(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings
             WHERE product_id = $1 AND is_approved
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(product_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        Ok((
            ProductRatings {
                product_id,
                average_rating,
                rating_count,
                ratings,
            },
            rating_count,
        ))
    }

    /// Record a submission. It stays hidden until approved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product or customer is missing.
    pub async fn create(&self, input: &RatingInput) -> Result<Rating, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO ratings (product_id, customer_id, reviewer_name, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RATING_COLUMNS}"
        ))
        .bind(input.product_id)
        .bind(input.customer_id)
        .bind(&input.reviewer_name)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Set the approval flag, or flip it when `approved` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rating doesn't exist.
    pub async fn set_approval(
        &self,
        id: RatingId,
        approved: Option<bool>,
    ) -> Result<Rating, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "UPDATE ratings SET is_approved = COALESCE($2, NOT is_approved), updated_at = NOW()
             WHERE id = $1
             RETURNING {RATING_COLUMNS}"
        ))
        .bind(id)
        .bind(approved)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rating doesn't exist.
    pub async fn delete(&self, id: RatingId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM ratings WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

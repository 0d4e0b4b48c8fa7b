//! Special and marquee offer repository.
//!
//! An offer is live when it is active and `NOW()` falls inside its optional
//! `[starts_at, ends_at]` window.

use emporium_core::{MarqueeOfferId, PageRequest, SpecialOfferId};
use sqlx::PgPool;

use super::{RepositoryError, found, like_pattern};
use crate::models::offer::{
    MarqueeOffer, MarqueeOfferInput, MarqueeOfferUpdate, SpecialOffer, SpecialOfferInput,
    SpecialOfferUpdate,
};

const SPECIAL_COLUMNS: &str = "id, title, description, discount_type, discount_value, \
     product_ids, starts_at, ends_at, is_active, banner_image, created_at, updated_at";

const MARQUEE_COLUMNS: &str = "id, text, link, sort_order, is_active, created_at, updated_at";

/// Filters shared by both offer lists.
#[derive(Debug, Default, Clone)]
pub struct OfferFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Repository for special and marquee offers.
pub struct OfferRepository<'a> {
    pool: &'a PgPool,
}

/// Splits `Option<Option<T>>` into the "was it sent" flag and the value.
fn patch<T: Clone>(field: Option<&Option<T>>) -> (bool, Option<T>) {
    field.map_or((false, None), |value| (true, value.clone()))
}

impl<'a> OfferRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Special offers
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_special(
        &self,
        filter: &OfferFilter,
        page: PageRequest,
    ) -> Result<(Vec<SpecialOffer>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let where_clause = "WHERE ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
                              AND ($2::boolean IS NULL OR is_active = $2)";
        let rows = sqlx::query_as(&format!(
            "SELECT {SPECIAL_COLUMNS} FROM special_offers {where_clause}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM special_offers {where_clause}"))
                .bind(&search)
                .bind(filter.is_active)
                .fetch_one(self.pool)
                .await?;
        Ok((rows, total))
    }

    /// Live special offers, ending soonest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_special(&self) -> Result<Vec<SpecialOffer>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "SELECT {SPECIAL_COLUMNS} FROM special_offers
             WHERE is_active
               AND (starts_at IS NULL OR starts_at <= NOW())
               AND (ends_at IS NULL OR ends_at >= NOW())
             ORDER BY ends_at ASC NULLS LAST, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_special(
        &self,
        id: SpecialOfferId,
    ) -> Result<Option<SpecialOffer>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {SPECIAL_COLUMNS} FROM special_offers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_special(
        &self,
        input: &SpecialOfferInput,
    ) -> Result<SpecialOffer, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO special_offers (title, description, discount_type, discount_value,
                                         product_ids, starts_at, ends_at, is_active,
                                         banner_image)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {SPECIAL_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(&input.product_ids)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active.unwrap_or(true))
        .bind(&input.banner_image)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn update_special(
        &self,
        id: SpecialOfferId,
        update: &SpecialOfferUpdate,
    ) -> Result<SpecialOffer, RepositoryError> {
        let (set_description, description) = patch(update.description.as_ref());
        let (set_starts, starts_at) = patch(update.starts_at.as_ref());
        let (set_ends, ends_at) = patch(update.ends_at.as_ref());
        let (set_banner, banner_image) = patch(update.banner_image.as_ref());

        let row = sqlx::query_as(&format!(
            "UPDATE special_offers SET
                 title = COALESCE($2, title),
                 description = CASE WHEN $3 THEN $4 ELSE description END,
                 discount_type = COALESCE($5, discount_type),
                 discount_value = COALESCE($6, discount_value),
                 product_ids = COALESCE($7, product_ids),
                 starts_at = CASE WHEN $8 THEN $9 ELSE starts_at END,
                 ends_at = CASE WHEN $10 THEN $11 ELSE ends_at END,
                 is_active = COALESCE($12, is_active),
                 banner_image = CASE WHEN $13 THEN $14 ELSE banner_image END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {SPECIAL_COLUMNS}"
        ))
        .bind(id)
        .bind(update.title.as_deref().map(str::trim))
        .bind(set_description)
        .bind(description)
        .bind(update.discount_type)
        .bind(update.discount_value)
        .bind(&update.product_ids)
        .bind(set_starts)
        .bind(starts_at)
        .bind(set_ends)
        .bind(ends_at)
        .bind(update.is_active)
        .bind(set_banner)
        .bind(banner_image)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn delete_special(&self, id: SpecialOfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM special_offers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Marquee offers
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_marquee(
        &self,
        filter: &OfferFilter,
        page: PageRequest,
    ) -> Result<(Vec<MarqueeOffer>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let where_clause = "WHERE ($1::text IS NULL OR text ILIKE $1)
                              AND ($2::boolean IS NULL OR is_active = $2)";
        let rows = sqlx::query_as(&format!(
            "SELECT {MARQUEE_COLUMNS} FROM marquee_offers {where_clause}
             ORDER BY sort_order, id
             LIMIT $3 OFFSET $4"
        ))
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM marquee_offers {where_clause}"))
                .bind(&search)
                .bind(filter.is_active)
                .fetch_one(self.pool)
                .await?;
        Ok((rows, total))
    }

    /// Active marquee lines in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_marquee(&self) -> Result<Vec<MarqueeOffer>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "SELECT {MARQUEE_COLUMNS} FROM marquee_offers
             WHERE is_active
             ORDER BY sort_order, id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_marquee(
        &self,
        id: MarqueeOfferId,
    ) -> Result<Option<MarqueeOffer>, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "SELECT {MARQUEE_COLUMNS} FROM marquee_offers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_marquee(
        &self,
        input: &MarqueeOfferInput,
    ) -> Result<MarqueeOffer, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO marquee_offers (text, link, sort_order, is_active)
             VALUES ($1, $2, $3, $4)
             RETURNING {MARQUEE_COLUMNS}"
        ))
        .bind(&input.text)
        .bind(&input.link)
        .bind(input.sort_order.unwrap_or(0))
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn update_marquee(
        &self,
        id: MarqueeOfferId,
        update: &MarqueeOfferUpdate,
    ) -> Result<MarqueeOffer, RepositoryError> {
        let (set_link, link) = patch(update.link.as_ref());
        let row = sqlx::query_as(&format!(
            "UPDATE marquee_offers SET
                 text = COALESCE($2, text),
                 link = CASE WHEN $3 THEN $4 ELSE link END,
                 sort_order = COALESCE($5, sort_order),
                 is_active = COALESCE($6, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {MARQUEE_COLUMNS}"
        ))
        .bind(id)
        .bind(update.text.as_deref().map(str::trim))
        .bind(set_link)
        .bind(link)
        .bind(update.sort_order)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer doesn't exist.
    pub async fn delete_marquee(&self, id: MarqueeOfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM marquee_offers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

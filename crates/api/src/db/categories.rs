//! Category and subcategory repositories.
//!
//! The many-to-many link lives in `category_subcategory_map`. Deleting a
//! category cascades to its map rows; subcategories it leaves without any
//! parent are deleted in the same transaction, while subcategories still
//! mapped elsewhere are untouched.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};

use emporium_core::{CategoryId, PageRequest, SubcategoryId};

use super::{RepositoryError, found, like_pattern};
use crate::models::category::{
    Category, CategoryDeletion, CategoryMapping, CategorySummary, CategoryTreeNode,
    MappedCategory, MappedSubcategory, MappingInput, MappingUpdate, NewTaxonomy, Subcategory,
    SubcategorySummary, TaxonomyUpdate,
};

const COLUMNS: &str = "id, name, slug, description, image, is_active, created_at, updated_at";

/// Filters shared by the category and subcategory lists.
#[derive(Debug, Default, Clone)]
pub struct TaxonomyFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

/// Split an optional `image`/`description` patch into "set?" and "value".
fn patch(field: Option<&Option<String>>) -> (bool, Option<&str>) {
    match field {
        Some(value) => (true, value.as_deref()),
        None => (false, None),
    }
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for categories and their subcategory mappings.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories with subcategory and product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &TaxonomyFilter,
        page: PageRequest,
    ) -> Result<(Vec<CategorySummary>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as::<_, CategorySummary>(
            "SELECT c.id, c.name, c.slug, c.description, c.image, c.is_active,
                    c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM category_subcategory_map m
                      WHERE m.category_id = c.id) AS subcategory_count,
                    (SELECT COUNT(*) FROM products p
                      WHERE p.category_id = c.id) AS product_count
             FROM categories c
             WHERE ($1::text IS NULL OR c.name ILIKE $1 OR c.slug ILIKE $1)
               AND ($2::boolean IS NULL OR c.is_active = $2)
             ORDER BY c.name, c.id
             LIMIT $3 OFFSET $4",
        )
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories c
             WHERE ($1::text IS NULL OR c.name ILIKE $1 OR c.slug ILIKE $1)
               AND ($2::boolean IS NULL OR c.is_active = $2)",
        )
        .bind(&search)
        .bind(filter.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Every category with its subcategories nested, ordered by name and
    /// then by each mapping's sort order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tree(&self, active_only: bool) -> Result<Vec<CategoryTreeNode>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {COLUMNS} FROM categories
             WHERE (NOT $1 OR is_active)
             ORDER BY name, id"
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        let mapped = sqlx::query_as::<_, MappedSubcategory>(
            "SELECT s.id, s.name, s.slug, s.description, s.image, s.is_active,
                    s.created_at, s.updated_at,
                    m.category_id, m.sort_order, m.is_primary
             FROM category_subcategory_map m
             JOIN subcategories s ON s.id = m.subcategory_id
             WHERE (NOT $1 OR s.is_active)
             ORDER BY m.sort_order, s.name, s.id",
        )
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        let mut by_category: HashMap<CategoryId, Vec<MappedSubcategory>> = HashMap::new();
        for sub in mapped {
            by_category.entry(sub.category_id).or_default().push(sub);
        }

        Ok(categories
            .into_iter()
            .map(|category| CategoryTreeNode {
                subcategories: by_category.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as(&format!("SELECT {COLUMNS} FROM categories WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &NewTaxonomy) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "INSERT INTO categories (name, slug, description, image, is_active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CategoryId,
        update: &TaxonomyUpdate,
        slug: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        let (set_description, description) = patch(update.description.as_ref());
        let (set_image, image) = patch(update.image.as_ref());
        let row = sqlx::query_as(&format!(
            "UPDATE categories SET
                 name = COALESCE($2, name),
                 slug = COALESCE($3, slug),
                 description = CASE WHEN $4 THEN $5 ELSE description END,
                 image = CASE WHEN $6 THEN $7 ELSE image END,
                 is_active = COALESCE($8, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(slug)
        .bind(set_description)
        .bind(description)
        .bind(set_image)
        .bind(image)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Delete a category, its mappings, and any subcategory left without a
    /// parent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<CategoryDeletion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        found(exists)?;

        // Lock this category's map rows so a concurrent remap sees the delete.
        let children: Vec<SubcategoryId> = sqlx::query_scalar(
            "SELECT subcategory_id FROM category_subcategory_map
             WHERE category_id = $1
             FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        // A concurrent delete of another parent waits here, then re-reads the map.
        sqlx::query("SELECT id FROM subcategories WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&children)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let removed: Vec<SubcategoryId> = sqlx::query_scalar(
            "DELETE FROM subcategories s
             WHERE s.id = ANY($1)
               AND NOT EXISTS (
                   SELECT 1 FROM category_subcategory_map m WHERE m.subcategory_id = s.id
               )
             RETURNING s.id",
        )
        .bind(&children)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            category_id = %id,
            removed_subcategories = removed.len(),
            "Category deleted"
        );

        Ok(CategoryDeletion {
            id,
            removed_subcategory_ids: removed,
        })
    }

    /// Subcategories of a category in display order, paginated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn subcategories(
        &self,
        id: CategoryId,
        page: PageRequest,
    ) -> Result<(Vec<MappedSubcategory>, i64), RepositoryError> {
        found(self.get(id).await?)?;

        let rows = sqlx::query_as::<_, MappedSubcategory>(
            "SELECT s.id, s.name, s.slug, s.description, s.image, s.is_active,
                    s.created_at, s.updated_at,
                    m.category_id, m.sort_order, m.is_primary
             FROM category_subcategory_map m
             JOIN subcategories s ON s.id = m.subcategory_id
             WHERE m.category_id = $1
             ORDER BY m.sort_order, s.name, s.id
             LIMIT $2 OFFSET $3",
        )
        .bind(id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM category_subcategory_map WHERE category_id = $1")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows, total))
    }

    /// Map a subcategory under a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if already mapped or either side
    /// doesn't exist.
    pub async fn map_subcategory(
        &self,
        id: CategoryId,
        input: &MappingInput,
    ) -> Result<CategoryMapping, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let is_primary = input.is_primary.unwrap_or(false);
        if is_primary {
            clear_primary(&mut tx, input.subcategory_id).await?;
        }
        let mapping = sqlx::query_as(
            "INSERT INTO category_subcategory_map (category_id, subcategory_id, sort_order, is_primary)
             VALUES ($1, $2, $3, $4)
             RETURNING id, category_id, subcategory_id, sort_order, is_primary, created_at",
        )
        .bind(id)
        .bind(input.subcategory_id)
        .bind(input.sort_order.unwrap_or(0))
        .bind(is_primary)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(mapping)
    }

    /// Change a mapping's sort order or primary flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the mapping doesn't exist.
    pub async fn update_mapping(
        &self,
        id: CategoryId,
        subcategory_id: SubcategoryId,
        update: &MappingUpdate,
    ) -> Result<CategoryMapping, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if update.is_primary == Some(true) {
            clear_primary(&mut tx, subcategory_id).await?;
        }
        let mapping = sqlx::query_as(
            "UPDATE category_subcategory_map SET
                 sort_order = COALESCE($3, sort_order),
                 is_primary = COALESCE($4, is_primary)
             WHERE category_id = $1 AND subcategory_id = $2
             RETURNING id, category_id, subcategory_id, sort_order, is_primary, created_at",
        )
        .bind(id)
        .bind(subcategory_id)
        .bind(update.sort_order)
        .bind(update.is_primary)
        .fetch_optional(&mut *tx)
        .await?;
        let mapping = found(mapping)?;
        tx.commit().await?;
        Ok(mapping)
    }

    /// Remove a mapping. The subcategory itself is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the mapping doesn't exist.
    pub async fn unmap_subcategory(
        &self,
        id: CategoryId,
        subcategory_id: SubcategoryId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM category_subcategory_map WHERE category_id = $1 AND subcategory_id = $2",
        )
        .bind(id)
        .bind(subcategory_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn clear_primary(
    tx: &mut Transaction<'_, Postgres>,
    subcategory_id: SubcategoryId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE category_subcategory_map SET is_primary = FALSE
         WHERE subcategory_id = $1 AND is_primary",
    )
    .bind(subcategory_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Subcategories
// =============================================================================

/// Repository for subcategories.
pub struct SubcategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubcategoryRepository<'a> {
    /// Create a new subcategory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List subcategories with parent and product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &TaxonomyFilter,
        page: PageRequest,
    ) -> Result<(Vec<SubcategorySummary>, i64), RepositoryError> {
        let search = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as::<_, SubcategorySummary>(
            "SELECT s.id, s.name, s.slug, s.description, s.image, s.is_active,
                    s.created_at, s.updated_at,
                    (SELECT COUNT(*) FROM category_subcategory_map m
                      WHERE m.subcategory_id = s.id) AS category_count,
                    (SELECT COUNT(*) FROM products p
                      WHERE p.subcategory_id = s.id) AS product_count
             FROM subcategories s
             WHERE ($1::text IS NULL OR s.name ILIKE $1 OR s.slug ILIKE $1)
               AND ($2::boolean IS NULL OR s.is_active = $2)
             ORDER BY s.name, s.id
             LIMIT $3 OFFSET $4",
        )
        .bind(&search)
        .bind(filter.is_active)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subcategories s
             WHERE ($1::text IS NULL OR s.name ILIKE $1 OR s.slug ILIKE $1)
               AND ($2::boolean IS NULL OR s.is_active = $2)",
        )
        .bind(&search)
        .bind(filter.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Get a subcategory by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SubcategoryId) -> Result<Option<Subcategory>, RepositoryError> {
        let row = sqlx::query_as(&format!("SELECT {COLUMNS} FROM subcategories WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a subcategory and map it under `category_ids`. The first
    /// listed category becomes its primary parent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or a category
    /// doesn't exist.
    pub async fn create(
        &self,
        input: &NewTaxonomy,
        category_ids: &[CategoryId],
    ) -> Result<Subcategory, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let sub: Subcategory = sqlx::query_as(&format!(
            "INSERT INTO subcategories (name, slug, description, image, is_active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(&input.image)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        for (position, category_id) in category_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO category_subcategory_map (category_id, subcategory_id, sort_order, is_primary)
                 VALUES ($1, $2, 0, $3)
                 ON CONFLICT (category_id, subcategory_id) DO NOTHING",
            )
            .bind(category_id)
            .bind(sub.id)
            .bind(position == 0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(sub)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: SubcategoryId,
        update: &TaxonomyUpdate,
        slug: Option<&str>,
    ) -> Result<Subcategory, RepositoryError> {
        let (set_description, description) = patch(update.description.as_ref());
        let (set_image, image) = patch(update.image.as_ref());
        let row = sqlx::query_as(&format!(
            "UPDATE subcategories SET
                 name = COALESCE($2, name),
                 slug = COALESCE($3, slug),
                 description = CASE WHEN $4 THEN $5 ELSE description END,
                 image = CASE WHEN $6 THEN $7 ELSE image END,
                 is_active = COALESCE($8, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(slug)
        .bind(set_description)
        .bind(description)
        .bind(set_image)
        .bind(image)
        .bind(update.is_active)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Delete a subcategory and its mappings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the subcategory doesn't exist.
    pub async fn delete(&self, id: SubcategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM subcategories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Categories this subcategory is mapped under.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the subcategory doesn't exist.
    pub async fn categories(&self, id: SubcategoryId) -> Result<Vec<MappedCategory>, RepositoryError> {
        found(self.get(id).await?)?;

        let rows = sqlx::query_as(
            "SELECT c.id, c.name, c.slug, c.description, c.image, c.is_active,
                    c.created_at, c.updated_at, m.sort_order, m.is_primary
             FROM category_subcategory_map m
             JOIN categories c ON c.id = m.category_id
             WHERE m.subcategory_id = $1
             ORDER BY m.is_primary DESC, c.name, c.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

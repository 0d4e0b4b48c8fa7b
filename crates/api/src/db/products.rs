//! Product and variant repository.
//!
//! Creating a product also creates its stock rows: one per variant, or a
//! single product-level row when there are no variants.

use sqlx::{PgPool, Postgres, Transaction};

use emporium_core::{CategoryId, PageRequest, ProductId, ProductStatus, SubcategoryId, VariantId};

use super::{RepositoryError, found, like_pattern};
use crate::models::product::{
    NewProduct, NewVariant, Product, ProductDetail, ProductImportRow, ProductSummary,
    ProductUpdate, ProductVariant, VariantUpdate, VariantWithStock,
};

const PRODUCT_COLUMNS: &str = "id, name, slug, sku, description, cost_price, selling_price, \
     category_id, subcategory_id, images, status, created_at, updated_at";

const VARIANT_COLUMNS: &str =
    "id, product_id, sku, attributes, images, price, created_at, updated_at";

const SUMMARY_SELECT: &str = "SELECT p.id, p.name, p.slug, p.sku, p.description, p.cost_price,
            p.selling_price, p.category_id, p.subcategory_id, p.images, p.status,
            p.created_at, p.updated_at,
            c.name AS category_name,
            sc.name AS subcategory_name,
            COALESCE((SELECT SUM(s.quantity) FROM stock s WHERE s.product_id = p.id), 0)::BIGINT
                AS total_stock,
            (SELECT COUNT(*) FROM product_variants v WHERE v.product_id = p.id) AS variant_count
     FROM products p
     LEFT JOIN categories c ON c.id = p.category_id
     LEFT JOIN subcategories sc ON sc.id = p.subcategory_id";

const FILTER_WHERE: &str = "WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.sku ILIKE $1
            OR EXISTS (SELECT 1 FROM product_variants v
                       WHERE v.product_id = p.id AND v.sku ILIKE $1))
       AND ($2::product_status IS NULL OR p.status = $2)
       AND ($3::integer IS NULL OR p.category_id = $3)
       AND ($4::integer IS NULL OR p.subcategory_id = $4)";

/// Filters for the product list and export.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    /// Matches name, product SKU or any variant SKU.
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
}

/// Outcome of importing one CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Inserted,
    Updated,
}

/// Repository for products and variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let rows = self
            .fetch_summaries(filter, Some(page.sql_limit()), page.sql_offset())
            .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products p {FILTER_WHERE}"))
                .bind(like_pattern(filter.search.as_deref()))
                .bind(filter.status)
                .bind(filter.category_id)
                .bind(filter.subcategory_id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows, total))
    }

    /// Every product matching the filter, for export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export(&self, filter: &ProductFilter) -> Result<Vec<ProductSummary>, RepositoryError> {
        self.fetch_summaries(filter, None, 0).await
    }

    async fn fetch_summaries(
        &self,
        filter: &ProductFilter,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let rows = sqlx::query_as(&format!(
            "{SUMMARY_SELECT} {FILTER_WHERE}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.status)
        .bind(filter.category_id)
        .bind(filter.subcategory_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a product with variants, stock and rating summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let summary: Option<ProductSummary> =
            sqlx::query_as(&format!("{SUMMARY_SELECT} WHERE p.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        match summary {
            Some(summary) => Ok(Some(self.detail(summary).await?)),
            None => Ok(None),
        }
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<ProductDetail>, RepositoryError> {
        let summary: Option<ProductSummary> =
            sqlx::query_as(&format!("{SUMMARY_SELECT} WHERE p.slug = $1"))
                .bind(slug)
                .fetch_optional(self.pool)
                .await?;

        match summary {
            Some(summary) => Ok(Some(self.detail(summary).await?)),
            None => Ok(None),
        }
    }

    async fn detail(&self, summary: ProductSummary) -> Result<ProductDetail, RepositoryError> {
        let id = summary.product.id;
        let variants = sqlx::query_as::<_, VariantWithStock>(
            "SELECT v.id, v.product_id, v.sku, v.attributes, v.images, v.price,
                    v.created_at, v.updated_at, s.quantity, s.min_stock
             FROM product_variants v
             LEFT JOIN stock s ON s.variant_id = v.id
             WHERE v.product_id = $1
             ORDER BY v.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let (average_rating, rating_count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::DOUBLE PRECISION, COUNT(*)
             FROM ratings WHERE product_id = $1 AND is_approved",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(ProductDetail {
            summary,
            variants,
            average_rating,
            rating_count,
        })
    }

    /// Create a product, its variants and their stock rows in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate slug or SKU, or a
    /// missing category.
    pub async fn create(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product: Product = sqlx::query_as(&format!(
            "INSERT INTO products (name, slug, sku, description, cost_price, selling_price,
                                   category_id, subcategory_id, images, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.sku)
        .bind(&input.description)
        .bind(input.cost_price)
        .bind(input.selling_price)
        .bind(input.category_id)
        .bind(input.subcategory_id)
        .bind(&input.images)
        .bind(input.status)
        .fetch_one(&mut *tx)
        .await?;

        if input.variants.is_empty() {
            insert_stock_row(&mut tx, product.id, None, input.initial_stock, input.min_stock)
                .await?;
        }
        for variant in &input.variants {
            insert_variant(&mut tx, product.id, variant).await?;
        }

        tx.commit().await?;
        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
        slug: Option<&str>,
    ) -> Result<Product, RepositoryError> {
        let (set_description, description) = match &update.description {
            Some(value) => (true, value.as_deref().map(str::trim)),
            None => (false, None),
        };
        let (set_category, category_id) = match update.category_id {
            Some(value) => (true, value),
            None => (false, None),
        };
        let (set_subcategory, subcategory_id) = match update.subcategory_id {
            Some(value) => (true, value),
            None => (false, None),
        };

        let row = sqlx::query_as(&format!(
            "UPDATE products SET
                 name = COALESCE($2, name),
                 slug = COALESCE($3, slug),
                 sku = COALESCE($4, sku),
                 description = CASE WHEN $5 THEN $6 ELSE description END,
                 cost_price = COALESCE($7, cost_price),
                 selling_price = COALESCE($8, selling_price),
                 category_id = CASE WHEN $9 THEN $10 ELSE category_id END,
                 subcategory_id = CASE WHEN $11 THEN $12 ELSE subcategory_id END,
                 images = COALESCE($13, images),
                 status = COALESCE($14, status),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(slug)
        .bind(update.sku.as_deref().map(str::trim))
        .bind(set_description)
        .bind(description)
        .bind(update.cost_price)
        .bind(update.selling_price)
        .bind(set_category)
        .bind(category_id)
        .bind(set_subcategory)
        .bind(subcategory_id)
        .bind(&update.images)
        .bind(update.status)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Soft delete: mark the product archived.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn archive(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as(&format!(
            "UPDATE products SET status = 'archived', updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Hard delete. Variants, stock and ratings cascade; products referenced
    /// by orders are refused with a conflict.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(product_id = %id, "Product permanently deleted");
        Ok(())
    }

    /// Add a variant with its stock row. A product gaining its first variant
    /// loses its product-level stock row if that row is empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn add_variant(
        &self,
        id: ProductId,
        variant: &NewVariant,
    ) -> Result<ProductVariant, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        found(exists)?;

        sqlx::query(
            "DELETE FROM stock WHERE product_id = $1 AND variant_id IS NULL AND quantity = 0",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let created = insert_variant(&mut tx, id, variant).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Apply a partial update to a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_variant(
        &self,
        id: ProductId,
        variant_id: VariantId,
        update: &VariantUpdate,
    ) -> Result<ProductVariant, RepositoryError> {
        let (set_price, price) = match update.price {
            Some(value) => (true, value),
            None => (false, None),
        };
        let row = sqlx::query_as(&format!(
            "UPDATE product_variants SET
                 sku = COALESCE($3, sku),
                 attributes = COALESCE($4, attributes),
                 images = COALESCE($5, images),
                 price = CASE WHEN $6 THEN $7 ELSE price END,
                 updated_at = NOW()
             WHERE id = $2 AND product_id = $1
             RETURNING {VARIANT_COLUMNS}"
        ))
        .bind(id)
        .bind(variant_id)
        .bind(update.sku.as_deref().map(str::trim))
        .bind(&update.attributes)
        .bind(&update.images)
        .bind(set_price)
        .bind(price)
        .fetch_optional(self.pool)
        .await?;
        found(row)
    }

    /// Delete a variant and its stock row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, or `RepositoryError::Conflict`
    /// when orders reference the variant.
    pub async fn delete_variant(
        &self,
        id: ProductId,
        variant_id: VariantId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $2 AND product_id = $1")
            .bind(id)
            .bind(variant_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or update a product keyed by SKU. New products get an empty
    /// stock row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a slug clash with another SKU.
    pub async fn upsert_import_row(
        &self,
        row: &ProductImportRow,
    ) -> Result<ImportOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id, inserted): (ProductId, bool) = sqlx::query_as(
            "INSERT INTO products (sku, name, slug, description, cost_price, selling_price,
                                   status, images, category_id, subcategory_id)
             VALUES ($1, $2, $3, $4, COALESCE($5, 0), $6, $7, $8,
                     (SELECT id FROM categories
                       WHERE slug = $9 OR lower(name) = lower($9) ORDER BY id LIMIT 1),
                     (SELECT id FROM subcategories
                       WHERE slug = $10 OR lower(name) = lower($10) ORDER BY id LIMIT 1))
             ON CONFLICT (sku) DO UPDATE SET
                 name = EXCLUDED.name,
                 slug = EXCLUDED.slug,
                 description = COALESCE(EXCLUDED.description, products.description),
                 cost_price = COALESCE($5, products.cost_price),
                 selling_price = EXCLUDED.selling_price,
                 status = EXCLUDED.status,
                 images = CASE WHEN cardinality(EXCLUDED.images) > 0
                               THEN EXCLUDED.images ELSE products.images END,
                 category_id = COALESCE(EXCLUDED.category_id, products.category_id),
                 subcategory_id = COALESCE(EXCLUDED.subcategory_id, products.subcategory_id),
                 updated_at = NOW()
             RETURNING id, (xmax = 0) AS inserted",
        )
        .bind(&row.sku)
        .bind(&row.name)
        .bind(&row.slug)
        .bind(&row.description)
        .bind(row.cost_price)
        .bind(row.selling_price)
        .bind(row.status)
        .bind(&row.images)
        .bind(&row.category)
        .bind(&row.subcategory)
        .fetch_one(&mut *tx)
        .await?;

        if inserted {
            insert_stock_row(&mut tx, id, None, 0, 0).await?;
        }
        tx.commit().await?;

        Ok(if inserted {
            ImportOutcome::Inserted
        } else {
            ImportOutcome::Updated
        })
    }
}

async fn insert_variant(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    variant: &NewVariant,
) -> Result<ProductVariant, RepositoryError> {
    let created: ProductVariant = sqlx::query_as(&format!(
        "INSERT INTO product_variants (product_id, sku, attributes, images, price)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {VARIANT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&variant.sku)
    .bind(&variant.attributes)
    .bind(&variant.images)
    .bind(variant.price)
    .fetch_one(&mut **tx)
    .await?;

    insert_stock_row(
        tx,
        product_id,
        Some(created.id),
        variant.initial_stock,
        variant.min_stock,
    )
    .await?;
    Ok(created)
}

async fn insert_stock_row(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
    min_stock: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO stock (product_id, variant_id, quantity, min_stock, notes)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(product_id)
    .bind(variant_id)
    .bind(quantity)
    .bind(min_stock)
    .bind((quantity > 0).then(|| format!("Opening stock: {quantity}")))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

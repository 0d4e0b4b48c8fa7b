//! Category and subcategory types.
//!
//! Subcategories belong to categories through `category_subcategory_map`, so
//! one subcategory can sit under several categories with its own sort order
//! and primary flag in each.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{CategoryId, SubcategoryId};

use super::{blank, clean, double_option, resolve_slug};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category list row with counts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub subcategory_count: i64,
    pub product_count: i64,
}

/// Subcategory list row with counts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubcategorySummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub subcategory: Subcategory,
    pub category_count: i64,
    pub product_count: i64,
}

/// A subcategory as seen from one of its categories.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MappedSubcategory {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub subcategory: Subcategory,
    #[serde(skip)]
    pub category_id: CategoryId,
    pub sort_order: i32,
    pub is_primary: bool,
}

/// A category as seen from one of its subcategories.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MappedCategory {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub sort_order: i32,
    pub is_primary: bool,
}

/// One row of `category_subcategory_map`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMapping {
    pub id: i32,
    pub category_id: CategoryId,
    pub subcategory_id: SubcategoryId,
    pub sort_order: i32,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Category with its subcategories in display order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTreeNode {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<MappedSubcategory>,
}

/// Result of deleting a category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDeletion {
    pub id: CategoryId,
    /// Subcategories that had no other parent and were removed with it.
    pub removed_subcategory_ids: Vec<SubcategoryId>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Body for creating a category or subcategory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

/// Validated create payload.
#[derive(Debug, Clone)]
pub struct NewTaxonomy {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
}

impl TaxonomyInput {
    /// Validate, deriving the slug from the name when absent.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<NewTaxonomy, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.name), "name", "is required");
        let slug = resolve_slug(&mut errors, self.slug.as_deref(), &self.name);
        errors.finish()?;

        Ok(NewTaxonomy {
            name: self.name.trim().to_string(),
            slug,
            description: clean(self.description.as_deref()),
            image: clean(self.image.as_deref()),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

/// Body for `POST /api/subcategories`: details plus optional parents.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryInput {
    #[serde(flatten)]
    pub details: TaxonomyInput,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
}

/// Partial update for a category or subcategory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl TaxonomyUpdate {
    /// Validate the fields that were sent. Returns the new slug, if any.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<Option<String>, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.name.as_deref().is_some_and(blank),
            "name",
            "must not be blank",
        );
        let slug = self
            .slug
            .as_deref()
            .map(|slug| resolve_slug(&mut errors, Some(slug), ""));
        errors.finish()?;
        Ok(slug.filter(|s| !s.is_empty()))
    }
}

/// Body for `POST /api/categories/{id}/subcategories`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingInput {
    pub subcategory_id: SubcategoryId,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
}

/// Body for `PUT /api/categories/{id}/subcategories/{sub_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingUpdate {
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_input_derives_slug() {
        let input: TaxonomyInput =
            serde_json::from_str(r#"{"name":" Men's Wear ","description":"  "}"#).unwrap();
        let new = input.validate().unwrap();
        assert_eq!(new.name, "Men's Wear");
        assert_eq!(new.slug, "men-s-wear");
        assert_eq!(new.description, None);
        assert!(new.is_active);
    }

    #[test]
    fn test_taxonomy_input_rejects_blank_name() {
        let input: TaxonomyInput = serde_json::from_str(r#"{"name":""}"#).unwrap();
        assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_subcategory_input_flattens_details() {
        let input: SubcategoryInput =
            serde_json::from_str(r#"{"name":"Tees","categoryIds":[1,2]}"#).unwrap();
        assert_eq!(input.details.name, "Tees");
        assert_eq!(input.category_ids, vec![CategoryId::new(1), CategoryId::new(2)]);
    }

    #[test]
    fn test_taxonomy_update_slug() {
        let update: TaxonomyUpdate = serde_json::from_str(r#"{"slug":"new-slug"}"#).unwrap();
        assert_eq!(update.validate().unwrap(), Some("new-slug".to_string()));

        let update: TaxonomyUpdate = serde_json::from_str(r#"{"slug":"Bad Slug"}"#).unwrap();
        assert!(update.validate().is_err());
    }
}

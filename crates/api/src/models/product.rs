//! Product and variant types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::csv::{CsvColumn, CsvError, CsvRecord};
use emporium_core::{CategoryId, ProductId, ProductStatus, SubcategoryId, VariantId, fits_amount};

use emporium_core::slug::{is_valid_slug, slugify};

use super::{blank, check_amount, clean, double_option, resolve_slug};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
    /// Public image URLs.
    pub images: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    /// Free-form attributes such as `{"size": "M", "color": "red"}`.
    pub attributes: serde_json::Value,
    pub images: Vec<String>,
    /// Overrides the product's selling price when set.
    pub price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List row: product plus taxonomy names and stock on hand.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub subcategory_name: Option<String>,
    /// Sum over the product's stock rows, variants included.
    pub total_stock: i64,
    pub variant_count: i64,
}

impl ProductSummary {
    /// Export layout. The columns read back by [`ProductImportRow::from_record`]
    /// use the same labels so an export can be edited and re-imported.
    #[must_use]
    pub fn csv_columns() -> Vec<CsvColumn<Self>> {
        vec![
            CsvColumn::new("ID", |p: &Self| p.product.id.as_i32().into()),
            CsvColumn::new("SKU", |p: &Self| p.product.sku.as_str().into()),
            CsvColumn::new("Name", |p: &Self| p.product.name.as_str().into()),
            CsvColumn::new("Slug", |p: &Self| p.product.slug.as_str().into()),
            CsvColumn::new("Description", |p: &Self| p.product.description.clone().into()),
            CsvColumn::currency("Cost Price", |p: &Self| p.product.cost_price.into()),
            CsvColumn::currency("Selling Price", |p: &Self| p.product.selling_price.into()),
            CsvColumn::new("Status", |p: &Self| p.product.status.as_str().into()),
            CsvColumn::new("Category", |p: &Self| p.category_name.clone().into()),
            CsvColumn::new("Subcategory", |p: &Self| p.subcategory_name.clone().into()),
            CsvColumn::new("Images", |p: &Self| p.product.images.join(IMAGE_SEPARATOR).into()),
            CsvColumn::new("Total Stock", |p: &Self| p.total_stock.into()),
            CsvColumn::new("Variants", |p: &Self| p.variant_count.into()),
            CsvColumn::datetime("Created At", |p: &Self| p.product.created_at.into()),
        ]
    }
}

/// Separator between image URLs in one CSV cell.
const IMAGE_SEPARATOR: &str = " | ";

/// Variant with its stock row, if one exists.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VariantWithStock {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub quantity: Option<i32>,
    pub min_stock: Option<i32>,
}

/// Full product view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub variants: Vec<VariantWithStock>,
    /// Average of approved ratings.
    pub average_rating: Option<f64>,
    pub rating_count: i64,
}

// =============================================================================
// Inputs
// =============================================================================

/// Body of `POST /api/products`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub slug: Option<String>,
    pub sku: String,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Decimal,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
    /// Opening stock for a product without variants.
    pub initial_stock: Option<i32>,
    pub min_stock: Option<i32>,
}

/// Body of `POST /api/products/{id}/variants`, also nested in [`ProductInput`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    pub sku: String,
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: Option<Decimal>,
    pub initial_stock: Option<i32>,
    pub min_stock: Option<i32>,
}

/// Validated product ready to insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
    pub images: Vec<String>,
    pub status: ProductStatus,
    pub variants: Vec<NewVariant>,
    pub initial_stock: i32,
    pub min_stock: i32,
}

/// Validated variant ready to insert.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub sku: String,
    pub attributes: serde_json::Value,
    pub images: Vec<String>,
    pub price: Option<Decimal>,
    pub initial_stock: i32,
    pub min_stock: i32,
}

fn clean_images(images: &[String]) -> Vec<String> {
    images
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect()
}

fn check_attributes(errors: &mut FieldErrors, attributes: Option<&serde_json::Value>) {
    errors.check(
        attributes.is_some_and(|a| !a.is_object() && !a.is_null()),
        "attributes",
        "must be an object",
    );
}

impl VariantInput {
    fn check(&self, errors: &mut FieldErrors) {
        errors.check(blank(&self.sku), "sku", "is required");
        check_amount(errors, "price", self.price);
        errors.check(
            self.initial_stock.is_some_and(|q| q < 0),
            "initialStock",
            "must not be negative",
        );
        errors.check(
            self.min_stock.is_some_and(|q| q < 0),
            "minStock",
            "must not be negative",
        );
        check_attributes(errors, self.attributes.as_ref());
    }

    fn normalized(&self) -> NewVariant {
        NewVariant {
            sku: self.sku.trim().to_string(),
            attributes: match &self.attributes {
                Some(value @ serde_json::Value::Object(_)) => value.clone(),
                _ => serde_json::json!({}),
            },
            images: clean_images(&self.images),
            price: self.price,
            initial_stock: self.initial_stock.unwrap_or(0),
            min_stock: self.min_stock.unwrap_or(0),
        }
    }

    /// Validate a standalone variant.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&self) -> Result<NewVariant, AppError> {
        let mut errors = FieldErrors::new();
        self.check(&mut errors);
        errors.finish()?;
        Ok(self.normalized())
    }
}

impl ProductInput {
    /// Validate and normalize.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field. Variant problems are reported
    /// as `variants`.
    pub fn validate(&self) -> Result<NewProduct, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.name), "name", "is required");
        errors.check(blank(&self.sku), "sku", "is required");
        check_amount(&mut errors, "sellingPrice", Some(self.selling_price));
        check_amount(&mut errors, "costPrice", self.cost_price);
        errors.check(
            self.initial_stock.is_some_and(|q| q < 0),
            "initialStock",
            "must not be negative",
        );
        errors.check(
            self.min_stock.is_some_and(|q| q < 0),
            "minStock",
            "must not be negative",
        );
        let slug = resolve_slug(&mut errors, self.slug.as_deref(), &self.name);

        let mut variant_errors = FieldErrors::new();
        let mut skus = HashSet::from([self.sku.trim().to_ascii_lowercase()]);
        for variant in &self.variants {
            variant.check(&mut variant_errors);
            if !skus.insert(variant.sku.trim().to_ascii_lowercase()) {
                variant_errors.add("sku", "duplicate SKU");
            }
        }
        if !variant_errors.is_empty() {
            errors.add("variants", format!("invalid fields: {variant_errors}"));
        }
        errors.finish()?;

        Ok(NewProduct {
            name: self.name.trim().to_string(),
            slug,
            sku: self.sku.trim().to_string(),
            description: clean(self.description.as_deref()),
            cost_price: self.cost_price.unwrap_or_default(),
            selling_price: self.selling_price,
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            images: clean_images(&self.images),
            status: self.status.unwrap_or_default(),
            variants: self.variants.iter().map(VariantInput::normalized).collect(),
            initial_stock: self.initial_stock.unwrap_or(0),
            min_stock: self.min_stock.unwrap_or(0),
        })
    }
}

/// Body of `PUT /api/products/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub subcategory_id: Option<Option<SubcategoryId>>,
    pub images: Option<Vec<String>>,
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Validate the fields that were sent. Returns the new slug, if any.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<Option<String>, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.name.as_deref().is_some_and(blank),
            "name",
            "must not be blank",
        );
        errors.check(
            self.sku.as_deref().is_some_and(blank),
            "sku",
            "must not be blank",
        );
        check_amount(&mut errors, "sellingPrice", self.selling_price);
        check_amount(&mut errors, "costPrice", self.cost_price);
        let slug = self
            .slug
            .as_deref()
            .map(|slug| resolve_slug(&mut errors, Some(slug), ""));
        errors.finish()?;

        self.images = self.images.as_deref().map(clean_images);
        Ok(slug.filter(|s| !s.is_empty()))
    }
}

/// Body of `PUT /api/products/{id}/variants/{variant_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantUpdate {
    pub sku: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<Decimal>>,
}

impl VariantUpdate {
    /// Validate the fields that were sent.
    ///
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(
            self.sku.as_deref().is_some_and(blank),
            "sku",
            "must not be blank",
        );
        check_amount(&mut errors, "price", self.price.flatten());
        check_attributes(&mut errors, self.attributes.as_ref());
        errors.finish()?;

        self.images = self.images.as_deref().map(clean_images);
        if matches!(self.attributes, Some(serde_json::Value::Null)) {
            self.attributes = Some(serde_json::json!({}));
        }
        Ok(())
    }
}

/// One parsed row of a product CSV import.
#[derive(Debug, Clone)]
pub struct ProductImportRow {
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Decimal,
    pub status: ProductStatus,
    /// Category slug or name.
    pub category: Option<String>,
    /// Subcategory slug or name.
    pub subcategory: Option<String>,
    pub images: Vec<String>,
}

impl ProductImportRow {
    /// Columns a product import must carry.
    pub const REQUIRED_COLUMNS: [&'static str; 3] = ["SKU", "Name", "Selling Price"];

    /// Read one CSV record. The slug is derived from the name when the
    /// column is absent or blank; status defaults to active.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed field.
    pub fn from_record(record: &CsvRecord<'_>) -> Result<Self, CsvError> {
        let sku = record.require("SKU")?.to_string();
        let name = record.require("Name")?.to_string();
        let slug = match record.get("Slug") {
            Some(slug) if is_valid_slug(slug) => slug.to_string(),
            Some(raw) => {
                return Err(CsvError::InvalidValue {
                    column: "Slug".to_string(),
                    value: raw.to_string(),
                });
            }
            None => slugify(&name),
        };
        if slug.is_empty() {
            return Err(CsvError::MissingValue("Slug".to_string()));
        }

        let cost_price: Option<Decimal> = record.parse_opt("Cost Price")?;
        let selling_price: Decimal = record.parse_required("Selling Price")?;
        for (column, price) in [("Cost Price", cost_price), ("Selling Price", Some(selling_price))] {
            if let Some(price) = price.filter(|p| p.is_sign_negative() || !fits_amount(*p)) {
                return Err(CsvError::InvalidValue {
                    column: column.to_string(),
                    value: price.to_string(),
                });
            }
        }

        Ok(Self {
            sku,
            name,
            slug,
            description: record.get("Description").map(String::from),
            cost_price,
            selling_price,
            status: record.parse_opt("Status")?.unwrap_or_default(),
            category: record.get("Category").map(String::from),
            subcategory: record.get("Subcategory").map(String::from),
            images: record
                .get("Images")
                .map(|cell| {
                    cell.split('|')
                        .map(str::trim)
                        .filter(|url| !url.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::csv::{CsvTable, to_csv};

    use super::*;

    fn input(json: &str) -> ProductInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_product_input_defaults() {
        let product = input(r#"{"name":"Linen Shirt","sku":"LS-1","sellingPrice":"49.90"}"#)
            .validate()
            .unwrap();
        assert_eq!(product.slug, "linen-shirt");
        assert_eq!(product.cost_price, Decimal::ZERO);
        assert_eq!(product.selling_price, Decimal::new(4990, 2));
        assert_eq!(product.status, ProductStatus::Active);
        assert!(product.variants.is_empty());
    }

    #[test]
    fn test_product_input_accepts_numeric_prices() {
        let product = input(r#"{"name":"Mug","sku":"MUG","sellingPrice":12.5}"#)
            .validate()
            .unwrap();
        assert_eq!(product.selling_price, Decimal::new(125, 1));
    }

    #[test]
    fn test_product_input_reports_fields() {
        let err = input(r#"{"name":"","sku":" ","sellingPrice":"-1","costPrice":"-2"}"#)
            .validate()
            .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "costPrice, name, sellingPrice, sku, slug");
    }

    #[test]
    fn test_prices_past_column_limit_rejected() {
        let err = input(
            r#"{"name":"Mug","sku":"MUG","sellingPrice":"10000000000","variants":[{"sku":"MUG-XL","price":"79228162514264337593543950335"}]}"#,
        )
        .validate()
        .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.to_string(), "sellingPrice, variants");

        let mut update: ProductUpdate =
            serde_json::from_str(r#"{"costPrice":"9999999999.99"}"#).unwrap();
        assert!(update.validate().is_ok());
        let mut update: ProductUpdate =
            serde_json::from_str(r#"{"costPrice":"10000000000.00"}"#).unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_duplicate_variant_skus_rejected() {
        let err = input(
            r#"{"name":"Tee","sku":"TEE","sellingPrice":"10",
                "variants":[{"sku":"TEE-S"},{"sku":"tee-s"}]}"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = input(
            r#"{"name":"Tee","sku":"TEE","sellingPrice":"10","variants":[{"sku":"tee"}]}"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_variant_attributes_default_to_object() {
        let variant: VariantInput = serde_json::from_str(r#"{"sku":"V1"}"#).unwrap();
        let new = variant.validate().unwrap();
        assert_eq!(new.attributes, serde_json::json!({}));

        let variant: VariantInput =
            serde_json::from_str(r#"{"sku":"V1","attributes":[1,2]}"#).unwrap();
        assert!(variant.validate().is_err());
    }

    #[test]
    fn test_product_update_clears_description() {
        let mut update: ProductUpdate =
            serde_json::from_str(r#"{"description":null,"images":[" a.jpg ",""]}"#).unwrap();
        assert_eq!(update.validate().unwrap(), None);
        assert_eq!(update.description, Some(None));
        assert_eq!(update.images, Some(vec!["a.jpg".to_string()]));
    }

    #[test]
    fn test_import_row_from_record() {
        let table = CsvTable::parse(
            "SKU,Name,Selling Price,Cost Price,Status,Images,Category\r\n\
             LS-1,Linen Shirt,49.90,,draft,a.jpg | b.jpg,Shirts\r\n\
             ,No Sku,1,,,,\r\n\
             MUG,Mug,-1,,,,\r\n\
             BIG,Big,1000000000000,,,,\r\n",
        )
        .unwrap();
        table.require_columns(&ProductImportRow::REQUIRED_COLUMNS).unwrap();
        let rows: Vec<_> = table
            .records()
            .map(|(n, r)| (n, ProductImportRow::from_record(&r)))
            .collect();

        let (line, first) = &rows[0];
        let first = first.as_ref().unwrap();
        assert_eq!(*line, 2);
        assert_eq!(first.slug, "linen-shirt");
        assert_eq!(first.status, ProductStatus::Draft);
        assert_eq!(first.cost_price, None);
        assert_eq!(first.images, vec!["a.jpg", "b.jpg"]);
        assert_eq!(first.category.as_deref(), Some("Shirts"));

        assert_eq!(rows[1].1.as_ref().unwrap_err(), &CsvError::MissingValue("SKU".to_string()));
        assert!(matches!(rows[2].1, Err(CsvError::InvalidValue { .. })));
        assert!(matches!(
            &rows[3].1,
            Err(CsvError::InvalidValue { column, .. }) if column == "Selling Price"
        ));
    }

    #[test]
    fn test_export_header_matches_import_labels() {
        let csv = to_csv::<ProductSummary>(&[], &ProductSummary::csv_columns());
        let table = CsvTable::parse(&csv).unwrap();
        table.require_columns(&ProductImportRow::REQUIRED_COLUMNS).unwrap();
        table
            .require_columns(&["Slug", "Cost Price", "Status", "Category", "Subcategory", "Images"])
            .unwrap();
    }
}

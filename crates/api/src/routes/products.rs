//! Product and variant handlers.
//!
//! Reads are public so the storefront can render the catalog; anonymous
//! callers only ever see active products. Writes need an admin.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{
    CategoryId, Page, PageRequest, ProductId, ProductStatus, SubcategoryId, VariantId,
};

use super::export::{ExportFormat, ImportReport, read_csv_upload};
use crate::db::ProductRepository;
use crate::db::products::{ImportOutcome, ProductFilter};
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{OptionalStaff, RequireAdmin, RequireStaff};
use crate::models::product::{
    Product, ProductDetail, ProductImportRow, ProductInput, ProductSummary, ProductUpdate,
    ProductVariant, VariantInput, VariantUpdate,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
}

impl ProductQuery {
    /// Anonymous callers are pinned to active products.
    fn filter(&self, is_staff: bool) -> ProductFilter {
        ProductFilter {
            search: self.search.clone(),
            status: if is_staff {
                self.status
            } else {
                Some(ProductStatus::Active)
            },
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub permanent: bool,
}

#[instrument(skip(state, staff))]
pub async fn index(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<Json<Page<ProductSummary>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = ProductRepository::new(state.pool())
        .list(&query.filter(staff.is_some()), page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

/// Look a product up by numeric id or by slug.
#[instrument(skip(state, staff))]
pub async fn show(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    PathParam(key): PathParam<String>,
) -> Result<Json<ProductDetail>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let detail = match key.parse::<i32>() {
        Ok(id) => repo.get(ProductId::new(id)).await?,
        Err(_) => repo.get_by_slug(&key).await?,
    };

    detail
        .filter(|d| staff.is_some() || d.summary.product.status == ProductStatus::Active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {key} not found")))
}

#[instrument(skip(state, admin, input), fields(staff_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<(StatusCode, Json<ProductDetail>), AppError> {
    let new = input.validate()?;
    let repo = ProductRepository::new(state.pool());
    let product = repo.create(&new).await?;
    let detail = repo
        .get(product.id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("product {} vanished", product.id)))?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[instrument(skip(state, _admin, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
    JsonBody(mut update): JsonBody<ProductUpdate>,
) -> Result<Json<Product>, AppError> {
    let slug = update.validate()?;
    let product = ProductRepository::new(state.pool())
        .update(id, &update, slug.as_deref())
        .await?;
    Ok(Json(product))
}

/// Archive by default; `?permanent=true` removes the row.
#[instrument(skip(state, admin), fields(staff_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
    QueryParams(query): QueryParams<DeleteQuery>,
) -> Result<Response, AppError> {
    let repo = ProductRepository::new(state.pool());
    if query.permanent {
        repo.delete(id).await?;
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        let product = repo.archive(id).await?;
        tracing::info!(product_id = %id, "Product archived");
        Ok(Json(product).into_response())
    }
}

#[instrument(skip(state, _admin, input))]
pub async fn add_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
    JsonBody(input): JsonBody<VariantInput>,
) -> Result<(StatusCode, Json<ProductVariant>), AppError> {
    let variant = input.validate()?;
    let created = ProductRepository::new(state.pool())
        .add_variant(id, &variant)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, _admin, update))]
pub async fn update_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam((id, variant_id)): PathParam<(ProductId, VariantId)>,
    JsonBody(mut update): JsonBody<VariantUpdate>,
) -> Result<Json<ProductVariant>, AppError> {
    update.validate()?;
    let variant = ProductRepository::new(state.pool())
        .update_variant(id, variant_id, &update)
        .await?;
    Ok(Json(variant))
}

#[instrument(skip(state, _admin))]
pub async fn delete_variant(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam((id, variant_id)): PathParam<(ProductId, VariantId)>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool())
        .delete_variant(id, variant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every matching product, unpaginated.
#[instrument(skip(state, _staff))]
pub async fn export(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(format): PathParam<ExportFormat>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<Response, AppError> {
    let rows = ProductRepository::new(state.pool())
        .export(&query.filter(true))
        .await?;
    Ok(format.download("products", &rows, ProductSummary::csv_columns))
}

/// Upsert products by SKU from a CSV upload.
#[instrument(skip(state, admin, upload), fields(staff_id = %admin.id))]
pub async fn import(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    upload: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportReport>, AppError> {
    let table = read_csv_upload(upload, &ProductImportRow::REQUIRED_COLUMNS).await?;
    let repo = ProductRepository::new(state.pool());
    let mut report = ImportReport::default();

    for (row, record) in table.records() {
        let parsed = match ProductImportRow::from_record(&record) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.record_failure(row, e);
                continue;
            }
        };
        match repo.upsert_import_row(&parsed).await {
            Ok(ImportOutcome::Inserted) => report.record_imported(),
            Ok(ImportOutcome::Updated) => report.record_updated(),
            Err(e) => report.record_write_failure(row, e),
        }
    }

    tracing::info!(
        imported = report.imported,
        updated = report.updated,
        failed = report.failed.len(),
        "Product import finished"
    );
    Ok(Json(report))
}

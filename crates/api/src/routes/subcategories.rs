//! Subcategory handlers.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use emporium_core::{Page, PageRequest, SubcategoryId};

use super::categories::TaxonomyQuery;
use crate::db::SubcategoryRepository;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{OptionalStaff, RequireAdmin};
use crate::models::category::{
    MappedCategory, Subcategory, SubcategoryInput, SubcategorySummary, TaxonomyUpdate,
};
use crate::state::AppState;

#[instrument(skip(state, staff))]
pub async fn index(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    QueryParams(query): QueryParams<TaxonomyQuery>,
) -> Result<Json<Page<SubcategorySummary>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = SubcategoryRepository::new(state.pool())
        .list(&query.filter(staff.is_some()), page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, staff))]
pub async fn show(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    PathParam(id): PathParam<SubcategoryId>,
) -> Result<Json<Subcategory>, AppError> {
    SubcategoryRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|s| staff.is_some() || s.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Subcategory {id} not found")))
}

/// Create a subcategory, optionally mapped under `categoryIds` at once.
#[instrument(skip(state, _admin, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(input): JsonBody<SubcategoryInput>,
) -> Result<(StatusCode, Json<Subcategory>), AppError> {
    let new = input.details.validate()?;
    let subcategory = SubcategoryRepository::new(state.pool())
        .create(&new, &input.category_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(subcategory)))
}

#[instrument(skip(state, _admin, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<SubcategoryId>,
    JsonBody(update): JsonBody<TaxonomyUpdate>,
) -> Result<Json<Subcategory>, AppError> {
    let slug = update.validate()?;
    let subcategory = SubcategoryRepository::new(state.pool())
        .update(id, &update, slug.as_deref())
        .await?;
    Ok(Json(subcategory))
}

#[instrument(skip(state, admin), fields(staff_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<SubcategoryId>,
) -> Result<StatusCode, AppError> {
    SubcategoryRepository::new(state.pool()).delete(id).await?;
    tracing::info!(subcategory_id = %id, "Subcategory deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn categories(
    State(state): State<AppState>,
    PathParam(id): PathParam<SubcategoryId>,
) -> Result<Json<Vec<MappedCategory>>, AppError> {
    let rows = SubcategoryRepository::new(state.pool())
        .categories(id)
        .await?;
    Ok(Json(rows))
}

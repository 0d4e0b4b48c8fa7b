//! Category handlers and the category-subcategory mapping.
//!
//! Reads are public and limited to active categories for anonymous callers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{CategoryId, Page, PageRequest, SubcategoryId};

use crate::db::CategoryRepository;
use crate::db::categories::TaxonomyFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{OptionalStaff, RequireAdmin};
use crate::models::category::{
    Category, CategoryDeletion, CategoryMapping, CategorySummary, CategoryTreeNode,
    MappedSubcategory, MappingInput, MappingUpdate, TaxonomyInput, TaxonomyUpdate,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl TaxonomyQuery {
    /// Anonymous callers only see active rows.
    pub(super) fn filter(&self, is_staff: bool) -> TaxonomyFilter {
        TaxonomyFilter {
            search: self.search.clone(),
            is_active: if is_staff { self.is_active } else { Some(true) },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[instrument(skip(state, staff))]
pub async fn index(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    QueryParams(query): QueryParams<TaxonomyQuery>,
) -> Result<Json<Page<CategorySummary>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = CategoryRepository::new(state.pool())
        .list(&query.filter(staff.is_some()), page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

/// Categories with their subcategories nested, for navigation menus.
#[instrument(skip(state, staff))]
pub async fn tree(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
) -> Result<Json<Vec<CategoryTreeNode>>, AppError> {
    let nodes = CategoryRepository::new(state.pool())
        .tree(staff.is_none())
        .await?;
    Ok(Json(nodes))
}

#[instrument(skip(state, staff))]
pub async fn show(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    PathParam(id): PathParam<CategoryId>,
) -> Result<Json<Category>, AppError> {
    CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|c| staff.is_some() || c.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))
}

#[instrument(skip(state, _admin, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(input): JsonBody<TaxonomyInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let new = input.validate()?;
    let category = CategoryRepository::new(state.pool()).create(&new).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, _admin, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<CategoryId>,
    JsonBody(update): JsonBody<TaxonomyUpdate>,
) -> Result<Json<Category>, AppError> {
    let slug = update.validate()?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &update, slug.as_deref())
        .await?;
    Ok(Json(category))
}

/// Delete a category. Subcategories mapped only to it go with it; those
/// shared with another category stay.
#[instrument(skip(state, admin), fields(staff_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<CategoryId>,
) -> Result<Json<CategoryDeletion>, AppError> {
    let deletion = CategoryRepository::new(state.pool()).delete(id).await?;
    tracing::info!(
        category_id = %id,
        removed_subcategories = deletion.removed_subcategory_ids.len(),
        "Category deleted"
    );
    Ok(Json(deletion))
}

#[instrument(skip(state, staff))]
pub async fn subcategories(
    State(state): State<AppState>,
    OptionalStaff(staff): OptionalStaff,
    PathParam(id): PathParam<CategoryId>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<Page<MappedSubcategory>>, AppError> {
    let repo = CategoryRepository::new(state.pool());
    let visible = repo
        .get(id)
        .await?
        .is_some_and(|c| staff.is_some() || c.is_active);
    if !visible {
        return Err(AppError::NotFound(format!("Category {id} not found")));
    }

    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = repo.subcategories(id, page).await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _admin, input))]
pub async fn map_subcategory(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<CategoryId>,
    JsonBody(input): JsonBody<MappingInput>,
) -> Result<(StatusCode, Json<CategoryMapping>), AppError> {
    let mapping = CategoryRepository::new(state.pool())
        .map_subcategory(id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

#[instrument(skip(state, _admin, update))]
pub async fn update_mapping(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam((id, subcategory_id)): PathParam<(CategoryId, SubcategoryId)>,
    JsonBody(update): JsonBody<MappingUpdate>,
) -> Result<Json<CategoryMapping>, AppError> {
    let mapping = CategoryRepository::new(state.pool())
        .update_mapping(id, subcategory_id, &update)
        .await?;
    Ok(Json(mapping))
}

#[instrument(skip(state, _admin))]
pub async fn unmap_subcategory(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam((id, subcategory_id)): PathParam<(CategoryId, SubcategoryId)>,
) -> Result<StatusCode, AppError> {
    CategoryRepository::new(state.pool())
        .unmap_subcategory(id, subcategory_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_filter_pins_active() {
        let query = TaxonomyQuery {
            is_active: Some(false),
            ..TaxonomyQuery::default()
        };
        assert_eq!(query.filter(false).is_active, Some(true));
        assert_eq!(query.filter(true).is_active, Some(false));
    }
}

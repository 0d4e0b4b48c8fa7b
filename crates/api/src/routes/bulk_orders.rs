//! Bulk order inquiries. Submission is public, the rest needs staff.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{BulkOrderId, BulkOrderStatus, Page, PageRequest};

use crate::db::BulkOrderRepository;
use crate::db::bulk_orders::BulkOrderFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireStaff;
use crate::models::bulk_order::{BulkOrder, BulkOrderInput, BulkOrderUpdate};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<BulkOrderStatus>,
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<BulkOrderQuery>,
) -> Result<Json<Page<BulkOrder>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = BulkOrderFilter {
        search: query.search,
        status: query.status,
    };
    let (rows, total) = BulkOrderRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<BulkOrderId>,
) -> Result<Json<BulkOrder>, AppError> {
    BulkOrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Bulk order {id} not found")))
}

#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<BulkOrderInput>,
) -> Result<(StatusCode, Json<BulkOrder>), AppError> {
    let new = input.validate()?;
    let inquiry = BulkOrderRepository::new(state.pool()).create(&new).await?;
    tracing::info!(bulk_order_id = %inquiry.id, quantity = inquiry.quantity, "Bulk order received");
    Ok((StatusCode::CREATED, Json(inquiry)))
}

#[instrument(skip(state, _staff, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<BulkOrderId>,
    JsonBody(mut update): JsonBody<BulkOrderUpdate>,
) -> Result<Json<BulkOrder>, AppError> {
    update.validate()?;
    let inquiry = BulkOrderRepository::new(state.pool())
        .update(id, &update)
        .await?;
    Ok(Json(inquiry))
}

#[instrument(skip(state, _staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<BulkOrderId>,
) -> Result<StatusCode, AppError> {
    BulkOrderRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

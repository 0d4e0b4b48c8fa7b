//! Order handlers.
//!
//! Orders are entered by staff. Status moves go through their own endpoint so
//! the lifecycle and stock dispatch are enforced in one place.

use axum::{Json, extract::State, http::StatusCode, response::Response};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{CustomerId, OrderId, OrderStatus, Page, PageRequest};

use super::export::ExportFormat;
use crate::db::OrderRepository;
use crate::db::orders::OrderFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireStaff};
use crate::models::order::{
    Order, OrderDetail, OrderInput, OrderSummary, OrderUpdate, StatusChange, StatusInput,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub customer_id: Option<CustomerId>,
}

impl OrderQuery {
    fn filter(&self) -> Result<OrderFilter, AppError> {
        if matches!((self.from, self.to), (Some(from), Some(to)) if from > to) {
            return Err(AppError::BadRequest(
                "'from' must not be after 'to'".to_string(),
            ));
        }
        Ok(OrderFilter {
            search: self.search.clone(),
            status: self.status,
            from: self.from,
            to: self.to,
            customer_id: self.customer_id,
        })
    }
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<OrderQuery>,
) -> Result<Json<Page<OrderSummary>>, AppError> {
    let filter = query.filter()?;
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = OrderRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<OrderDetail>, AppError> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}

/// Price the lines, apply any coupon and store the order as pending.
#[instrument(skip(state, staff, input), fields(staff_id = %staff.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    JsonBody(mut input): JsonBody<OrderInput>,
) -> Result<(StatusCode, Json<OrderDetail>), AppError> {
    input.validate()?;
    let detail = OrderRepository::new(state.pool()).create(&input).await?;
    tracing::info!(
        order_id = %detail.order.id,
        order_number = %detail.order.order_number,
        total = %detail.order.total_amount,
        "Order created"
    );
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Edit payment method, address or notes. Status has its own endpoint.
#[instrument(skip(state, _staff, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<OrderId>,
    JsonBody(mut update): JsonBody<OrderUpdate>,
) -> Result<Json<Order>, AppError> {
    update.validate()?;
    let order = OrderRepository::new(state.pool()).update(id, &update).await?;
    Ok(Json(order))
}

/// Move the order along its lifecycle. Entering `dispatched` takes the
/// ordered units out of stock.
#[instrument(skip(state, staff, input), fields(staff_id = %staff.id))]
pub async fn change_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    PathParam(id): PathParam<OrderId>,
    JsonBody(input): JsonBody<StatusInput>,
) -> Result<Json<StatusChange>, AppError> {
    let target = input.parse()?;
    let change = OrderRepository::new(state.pool())
        .change_status(id, target)
        .await?;
    Ok(Json(change))
}

#[instrument(skip(state, admin), fields(staff_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<OrderId>,
) -> Result<StatusCode, AppError> {
    OrderRepository::new(state.pool()).delete(id).await?;
    tracing::info!(order_id = %id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _staff))]
pub async fn export(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(format): PathParam<ExportFormat>,
    QueryParams(query): QueryParams<OrderQuery>,
) -> Result<Response, AppError> {
    let rows = OrderRepository::new(state.pool())
        .export(&query.filter()?)
        .await?;
    Ok(format.download("orders", &rows, OrderSummary::csv_columns))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_rejects_inverted_range() {
        let query = OrderQuery {
            from: NaiveDate::from_ymd_opt(2025, 6, 2),
            to: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..OrderQuery::default()
        };
        assert!(matches!(query.filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_query_status_must_be_known() {
        let ok: OrderQuery = serde_json::from_str(r#"{"status":"dispatched"}"#).unwrap();
        assert_eq!(ok.status, Some(OrderStatus::Dispatched));
        assert!(serde_json::from_str::<OrderQuery>(r#"{"status":"lost"}"#).is_err());
    }
}

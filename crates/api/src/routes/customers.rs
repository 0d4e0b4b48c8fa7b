//! Customer handlers. Staff only.

use axum::{Json, extract::State, http::StatusCode, response::Response};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{CustomerId, Page, PageRequest};

use super::export::ExportFormat;
use crate::db::CustomerRepository;
use crate::db::customers::CustomerFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireStaff};
use crate::models::customer::{
    Customer, CustomerDetail, CustomerInput, CustomerSummary, CustomerUpdate,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl CustomerQuery {
    fn filter(&self) -> CustomerFilter {
        CustomerFilter {
            search: self.search.clone(),
            is_active: self.is_active,
        }
    }
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<CustomerQuery>,
) -> Result<Json<Page<CustomerSummary>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = CustomerRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

/// Customer with order statistics and their latest orders.
#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<CustomerId>,
) -> Result<Json<CustomerDetail>, AppError> {
    CustomerRepository::new(state.pool())
        .get_detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Customer {id} not found")))
}

#[instrument(skip(state, _staff))]
pub async fn by_firebase_uid(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(uid): PathParam<String>,
) -> Result<Json<Customer>, AppError> {
    CustomerRepository::new(state.pool())
        .get_by_firebase_uid(uid.trim())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No customer with that Firebase UID".to_string()))
}

#[instrument(skip(state, _staff, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    JsonBody(input): JsonBody<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let new = input.validate()?;
    let customer = CustomerRepository::new(state.pool()).create(&new).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

#[instrument(skip(state, _staff, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<CustomerId>,
    JsonBody(update): JsonBody<CustomerUpdate>,
) -> Result<Json<Customer>, AppError> {
    let email = update.validate()?;
    let customer = CustomerRepository::new(state.pool())
        .update(id, &update, email.as_ref())
        .await?;
    Ok(Json(customer))
}

#[instrument(skip(state, admin), fields(staff_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<CustomerId>,
) -> Result<StatusCode, AppError> {
    CustomerRepository::new(state.pool()).delete(id).await?;
    tracing::info!(customer_id = %id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _staff))]
pub async fn export(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(format): PathParam<ExportFormat>,
    QueryParams(query): QueryParams<CustomerQuery>,
) -> Result<Response, AppError> {
    let rows = CustomerRepository::new(state.pool())
        .export(&query.filter())
        .await?;
    Ok(format.download("customers", &rows, CustomerSummary::csv_columns))
}

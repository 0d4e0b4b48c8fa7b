//! Stock handlers. All of them need a staff session.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::stock::StockChange;
use emporium_core::{Page, PageRequest, ProductId, StockId};

use super::export::{ExportFormat, ImportReport, read_csv_upload};
use crate::db::stock::{StockFilter, StockImportOutcome};
use crate::db::{RepositoryError, StockRepository};
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireStaff;
use crate::models::stock::{
    LowStockSummary, Stock, StockAdjustment, StockImportRow, StockInput, StockItem, StockUpdate,
};
use crate::state::AppState;

const DEFAULT_LOW_STOCK_ROWS: i64 = 20;
const MAX_LOW_STOCK_ROWS: i64 = 200;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub product_id: Option<ProductId>,
}

impl StockQuery {
    fn filter(&self) -> StockFilter {
        StockFilter {
            search: self.search.clone(),
            low_stock: self.low_stock,
            product_id: self.product_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub limit: Option<i64>,
}

/// Result of a manual adjustment.
#[derive(Debug, Serialize)]
pub struct AdjustmentResponse {
    pub stock: Stock,
    pub change: StockChange,
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<StockQuery>,
) -> Result<Json<Page<StockItem>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (rows, total) = StockRepository::new(state.pool())
        .list(&query.filter(), page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _staff))]
pub async fn low_stock(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<LowStockQuery>,
) -> Result<Json<LowStockSummary>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOW_STOCK_ROWS)
        .clamp(1, MAX_LOW_STOCK_ROWS);
    let summary = StockRepository::new(state.pool()).low_stock(limit).await?;
    Ok(Json(summary))
}

#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<StockId>,
) -> Result<Json<StockItem>, AppError> {
    StockRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Stock {id} not found")))
}

#[instrument(skip(state, staff, input), fields(staff_id = %staff.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    JsonBody(input): JsonBody<StockInput>,
) -> Result<(StatusCode, Json<Stock>), AppError> {
    input.validate()?;
    let stock = StockRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(stock)))
}

#[instrument(skip(state, staff, update), fields(staff_id = %staff.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    PathParam(id): PathParam<StockId>,
    JsonBody(update): JsonBody<StockUpdate>,
) -> Result<Json<Stock>, AppError> {
    update.validate()?;
    let stock = StockRepository::new(state.pool()).update(id, &update).await?;
    Ok(Json(stock))
}

/// Receive or remove units. The result may not go below zero.
#[instrument(skip(state, staff, input), fields(staff_id = %staff.id))]
pub async fn adjust(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    PathParam(id): PathParam<StockId>,
    JsonBody(input): JsonBody<StockAdjustment>,
) -> Result<Json<AdjustmentResponse>, AppError> {
    if input.delta == 0 {
        return Err(AppError::BadRequest("delta must not be zero".to_string()));
    }
    let (stock, change) = StockRepository::new(state.pool())
        .adjust(id, input.delta, &input.reason)
        .await?;
    Ok(Json(AdjustmentResponse { stock, change }))
}

#[instrument(skip(state, staff), fields(staff_id = %staff.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    PathParam(id): PathParam<StockId>,
) -> Result<StatusCode, AppError> {
    StockRepository::new(state.pool()).delete(id).await?;
    tracing::info!(stock_id = %id, "Stock row deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _staff))]
pub async fn export(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(format): PathParam<ExportFormat>,
    QueryParams(query): QueryParams<StockQuery>,
) -> Result<Response, AppError> {
    let rows = StockRepository::new(state.pool())
        .export(&query.filter())
        .await?;
    Ok(format.download("stock", &rows, StockItem::csv_columns))
}

/// Set quantities by SKU from a CSV upload.
#[instrument(skip(state, staff, upload), fields(staff_id = %staff.id))]
pub async fn import(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    upload: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportReport>, AppError> {
    let table = read_csv_upload(upload, &StockImportRow::REQUIRED_COLUMNS).await?;
    let repo = StockRepository::new(state.pool());
    let mut report = ImportReport::default();

    for (row, record) in table.records() {
        let parsed = match StockImportRow::from_record(&record) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.record_failure(row, e);
                continue;
            }
        };
        match repo.import_row(&parsed).await {
            Ok(StockImportOutcome::Created) => report.record_imported(),
            Ok(StockImportOutcome::Updated) => report.record_updated(),
            Err(RepositoryError::NotFound) => {
                report.record_failure(row, format!("unknown SKU {}", parsed.sku));
            }
            Err(e) => report.record_write_failure(row, e),
        }
    }

    tracing::info!(
        imported = report.imported,
        updated = report.updated,
        failed = report.failed.len(),
        "Stock import finished"
    );
    Ok(Json(report))
}

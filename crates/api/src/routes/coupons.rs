//! Coupon handlers.
//!
//! Staff can browse coupons and admins manage them. `POST /validate` is
//! public so the storefront can preview a discount before checkout.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{CouponId, Page, PageRequest};

use crate::db::CouponRepository;
use crate::db::coupons::CouponFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireStaff};
use crate::models::coupon::{Coupon, CouponCheck, CouponInput, CouponUpdate, CouponValidation};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<CouponQuery>,
) -> Result<Json<Page<Coupon>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = CouponFilter {
        search: query.search,
        is_active: query.is_active,
    };
    let (rows, total) = CouponRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _staff))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<CouponId>,
) -> Result<Json<Coupon>, AppError> {
    CouponRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Coupon {id} not found")))
}

#[instrument(skip(state, admin, input), fields(staff_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(input): JsonBody<CouponInput>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    let definition = input.validate()?;
    let coupon = CouponRepository::new(state.pool()).create(&definition).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Partial update. The merged definition is validated as a whole.
#[instrument(skip(state, _admin, update))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<CouponId>,
    JsonBody(update): JsonBody<CouponUpdate>,
) -> Result<Json<Coupon>, AppError> {
    let repo = CouponRepository::new(state.pool());
    let current = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Coupon {id} not found")))?;
    let definition = update.merge(&current)?;
    let coupon = repo.replace(id, &definition).await?;
    Ok(Json(coupon))
}

#[instrument(skip(state, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<CouponId>,
) -> Result<StatusCode, AppError> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Preview a coupon against a cart. Nothing is used up.
#[instrument(skip(state, check), fields(code = %check.code))]
pub async fn validate(
    State(state): State<AppState>,
    JsonBody(check): JsonBody<CouponCheck>,
) -> Result<Json<CouponValidation>, AppError> {
    check.validate()?;
    let validation = CouponRepository::new(state.pool()).check(&check).await?;
    Ok(Json(validation))
}

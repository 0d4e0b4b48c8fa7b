//! Special offer and marquee offer handlers.
//!
//! Both kinds share a shape: `/active` is public for the storefront, the
//! listing and detail need staff, and changes need an admin.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{MarqueeOfferId, Page, PageRequest, SpecialOfferId};

use crate::db::OfferRepository;
use crate::db::offers::OfferFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireStaff};
use crate::models::offer::{
    MarqueeOffer, MarqueeOfferInput, MarqueeOfferUpdate, SpecialOffer, SpecialOfferInput,
    SpecialOfferUpdate,
};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

impl OfferQuery {
    fn split(self) -> (OfferFilter, PageRequest) {
        (
            OfferFilter {
                search: self.search,
                is_active: self.is_active,
            },
            PageRequest::new(self.page, self.limit),
        )
    }
}

// =============================================================================
// Special offers
// =============================================================================

#[instrument(skip(state, _staff))]
pub async fn special_index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<OfferQuery>,
) -> Result<Json<Page<SpecialOffer>>, AppError> {
    let (filter, page) = query.split();
    let (rows, total) = OfferRepository::new(state.pool())
        .list_special(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

/// Offers that are switched on and inside their date window.
#[instrument(skip(state))]
pub async fn special_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<SpecialOffer>>, AppError> {
    let offers = OfferRepository::new(state.pool()).active_special().await?;
    Ok(Json(offers))
}

#[instrument(skip(state, _staff))]
pub async fn special_show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<SpecialOfferId>,
) -> Result<Json<SpecialOffer>, AppError> {
    OfferRepository::new(state.pool())
        .get_special(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Special offer {id} not found")))
}

#[instrument(skip(state, _admin, input))]
pub async fn special_create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(mut input): JsonBody<SpecialOfferInput>,
) -> Result<(StatusCode, Json<SpecialOffer>), AppError> {
    input.validate()?;
    let offer = OfferRepository::new(state.pool())
        .create_special(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// Partial update. The date window is checked against the stored values.
#[instrument(skip(state, _admin, update))]
pub async fn special_update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<SpecialOfferId>,
    JsonBody(mut update): JsonBody<SpecialOfferUpdate>,
) -> Result<Json<SpecialOffer>, AppError> {
    let repo = OfferRepository::new(state.pool());
    let current = repo
        .get_special(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Special offer {id} not found")))?;
    update.validate(&current)?;
    let offer = repo.update_special(id, &update).await?;
    Ok(Json(offer))
}

#[instrument(skip(state, _admin))]
pub async fn special_delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<SpecialOfferId>,
) -> Result<StatusCode, AppError> {
    OfferRepository::new(state.pool()).delete_special(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Marquee offers
// =============================================================================

#[instrument(skip(state, _staff))]
pub async fn marquee_index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<OfferQuery>,
) -> Result<Json<Page<MarqueeOffer>>, AppError> {
    let (filter, page) = query.split();
    let (rows, total) = OfferRepository::new(state.pool())
        .list_marquee(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

/// Active marquee lines in display order.
#[instrument(skip(state))]
pub async fn marquee_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<MarqueeOffer>>, AppError> {
    let offers = OfferRepository::new(state.pool()).active_marquee().await?;
    Ok(Json(offers))
}

#[instrument(skip(state, _staff))]
pub async fn marquee_show(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<MarqueeOfferId>,
) -> Result<Json<MarqueeOffer>, AppError> {
    OfferRepository::new(state.pool())
        .get_marquee(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Marquee offer {id} not found")))
}

#[instrument(skip(state, _admin, input))]
pub async fn marquee_create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    JsonBody(mut input): JsonBody<MarqueeOfferInput>,
) -> Result<(StatusCode, Json<MarqueeOffer>), AppError> {
    input.validate()?;
    let offer = OfferRepository::new(state.pool())
        .create_marquee(&input)
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

#[instrument(skip(state, _admin, update))]
pub async fn marquee_update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<MarqueeOfferId>,
    JsonBody(mut update): JsonBody<MarqueeOfferUpdate>,
) -> Result<Json<MarqueeOffer>, AppError> {
    update.validate()?;
    let offer = OfferRepository::new(state.pool())
        .update_marquee(id, &update)
        .await?;
    Ok(Json(offer))
}

#[instrument(skip(state, _admin))]
pub async fn marquee_delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<MarqueeOfferId>,
) -> Result<StatusCode, AppError> {
    OfferRepository::new(state.pool()).delete_marquee(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

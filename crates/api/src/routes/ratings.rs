//! Product ratings.
//!
//! Anyone can submit a rating; it stays hidden until staff approve it.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use emporium_core::{Page, PageRequest, Pagination, ProductId, RatingId};

use crate::db::RatingRepository;
use crate::db::ratings::RatingFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireStaff;
use crate::models::rating::{ApprovalInput, ProductRatings, Rating, RatingInput, RatingWithProduct};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub is_approved: Option<bool>,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Approved ratings of a product, one page at a time.
#[derive(Debug, Serialize)]
pub struct ProductRatingsPage {
    #[serde(flatten)]
    pub ratings: ProductRatings,
    pub pagination: Pagination,
}

/// Parse an optional approval body. An empty body toggles.
fn parse_approval(body: &[u8]) -> Result<Option<bool>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let input: ApprovalInput = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
    Ok(input.is_approved)
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    QueryParams(query): QueryParams<RatingQuery>,
) -> Result<Json<Page<RatingWithProduct>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = RatingFilter {
        search: query.search,
        is_approved: query.is_approved,
        product_id: query.product_id,
    };
    let (rows, total) = RatingRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state))]
pub async fn for_product(
    State(state): State<AppState>,
    PathParam(product_id): PathParam<ProductId>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<ProductRatingsPage>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let (ratings, total) = RatingRepository::new(state.pool())
        .for_product(product_id, page)
        .await?;
    Ok(Json(ProductRatingsPage {
        ratings,
        pagination: page.paginate(total),
    }))
}

#[instrument(skip(state, input), fields(product_id = %input.product_id))]
pub async fn create(
    State(state): State<AppState>,
    JsonBody(mut input): JsonBody<RatingInput>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    input.validate()?;
    let rating = RatingRepository::new(state.pool()).create(&input).await?;
    tracing::info!(rating_id = %rating.id, "Rating submitted");
    Ok((StatusCode::CREATED, Json(rating)))
}

/// Set `isApproved`, or flip it when the body is empty.
#[instrument(skip(state, staff, body), fields(staff_id = %staff.id))]
pub async fn approve(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    PathParam(id): PathParam<RatingId>,
    body: Bytes,
) -> Result<Json<Rating>, AppError> {
    let approved = parse_approval(&body)?;
    let rating = RatingRepository::new(state.pool())
        .set_approval(id, approved)
        .await?;
    Ok(Json(rating))
}

#[instrument(skip(state, _staff))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    PathParam(id): PathParam<RatingId>,
) -> Result<StatusCode, AppError> {
    RatingRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_approval() {
        assert_eq!(parse_approval(b"").unwrap(), None);
        assert_eq!(parse_approval(b"  \n").unwrap(), None);
        assert_eq!(parse_approval(b"{}").unwrap(), None);
        assert_eq!(parse_approval(br#"{"isApproved":true}"#).unwrap(), Some(true));
        assert_eq!(parse_approval(br#"{"isApproved":false}"#).unwrap(), Some(false));
        assert!(matches!(
            parse_approval(b"yes"),
            Err(AppError::BadRequest(_))
        ));
    }
}

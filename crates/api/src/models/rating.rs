//! Product rating types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{CustomerId, ProductId, RatingId};

use super::{blank, clean};
use crate::error::{AppError, FieldErrors};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: RatingId,
    pub product_id: ProductId,
    pub customer_id: Option<CustomerId>,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating with the product it is about, for the moderation list.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingWithProduct {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rating: Rating,
    pub product_name: String,
}

/// Approved ratings of one product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRatings {
    pub product_id: ProductId,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
    pub ratings: Vec<Rating>,
}

/// Body of `POST /api/ratings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    pub product_id: ProductId,
    pub customer_id: Option<CustomerId>,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
}

impl RatingInput {
    /// # Errors
    ///
    /// Returns validation errors keyed by field.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors.check(blank(&self.reviewer_name), "reviewerName", "is required");
        errors.check(
            !(1..=5).contains(&self.rating),
            "rating",
            "must be between 1 and 5",
        );
        errors.finish()?;
        self.reviewer_name = self.reviewer_name.trim().to_string();
        self.comment = clean(self.comment.as_deref());
        Ok(())
    }
}

/// Body of `PUT /api/ratings/{id}/approve`. Without a body the approval flag
/// is toggled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalInput {
    pub is_approved: Option<bool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range() {
        for (score, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let mut input = RatingInput {
                product_id: ProductId::new(1),
                customer_id: None,
                reviewer_name: "Asha".to_string(),
                rating: score,
                comment: Some("  ".to_string()),
            };
            assert_eq!(input.validate().is_ok(), ok, "score {score}");
            if ok {
                assert_eq!(input.comment, None);
            }
        }
    }
}

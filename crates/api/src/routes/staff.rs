//! Staff management.
//!
//! Admins may look; only super admins change accounts. The last active super
//! admin can't be deleted, deactivated or demoted, and nobody deletes
//! themselves.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{Page, PageRequest, StaffId, StaffRole};

use crate::db::StaffRepository;
use crate::db::staff::StaffFilter;
use crate::error::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireSuperAdmin};
use crate::models::staff::{RegisterInput, Staff, StaffUpdate};
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
}

/// Whether applying `update` to `target` takes away an active super admin.
fn removes_super_admin(target: &Staff, update: &StaffUpdate) -> bool {
    let is_super = target.role == StaffRole::SuperAdmin && target.is_active;
    let demoted = update.role.is_some_and(|r| r != StaffRole::SuperAdmin);
    let deactivated = update.is_active == Some(false);
    is_super && (demoted || deactivated)
}

async fn ensure_not_last_super_admin(repo: &StaffRepository<'_>) -> Result<(), AppError> {
    if repo.count_active_super_admins().await? <= 1 {
        return Err(AppError::Conflict(
            "At least one active super admin must remain".to_string(),
        ));
    }
    Ok(())
}

#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    QueryParams(query): QueryParams<StaffQuery>,
) -> Result<Json<Page<Staff>>, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = StaffFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };
    let (rows, total) = StaffRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Page::new(rows, page, total)))
}

#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(id): PathParam<StaffId>,
) -> Result<Json<Staff>, AppError> {
    StaffRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Staff {id} not found")))
}

#[instrument(skip(state, caller, input), fields(staff_id = %caller.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireSuperAdmin(caller): RequireSuperAdmin,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    input.field_errors().finish()?;
    let staff = AuthService::new(state.pool(), state.jwt())
        .create_staff(
            &input.name,
            &input.email,
            &input.password,
            input.role.unwrap_or(StaffRole::Staff),
            input.image,
        )
        .await?;
    tracing::info!(created_id = %staff.id, role = %staff.role, "Staff created");
    Ok((StatusCode::CREATED, Json(staff)))
}

#[instrument(skip(state, caller, update), fields(staff_id = %caller.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireSuperAdmin(caller): RequireSuperAdmin,
    PathParam(id): PathParam<StaffId>,
    JsonBody(update): JsonBody<StaffUpdate>,
) -> Result<Json<Staff>, AppError> {
    let email = update.validate()?;
    let repo = StaffRepository::new(state.pool());
    let target = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff {id} not found")))?;

    if removes_super_admin(&target, &update) {
        ensure_not_last_super_admin(&repo).await?;
    }

    let staff = repo.update(id, &update, email.as_ref()).await?;
    Ok(Json(staff))
}

#[instrument(skip(state, caller), fields(staff_id = %caller.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireSuperAdmin(caller): RequireSuperAdmin,
    PathParam(id): PathParam<StaffId>,
) -> Result<StatusCode, AppError> {
    if id == caller.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let repo = StaffRepository::new(state.pool());
    let target = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff {id} not found")))?;
    if target.role == StaffRole::SuperAdmin && target.is_active {
        ensure_not_last_super_admin(&repo).await?;
    }

    repo.delete(id).await?;
    tracing::info!(deleted_id = %id, "Staff deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use emporium_core::Email;

    use super::*;

    fn staff(role: StaffRole, is_active: bool) -> Staff {
        Staff {
            id: StaffId::new(1),
            name: "Mira".to_string(),
            email: Email::parse("mira@shop.test").unwrap(),
            role,
            is_active,
            image: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_removes_super_admin() {
        let demote = StaffUpdate {
            role: Some(StaffRole::Admin),
            ..StaffUpdate::default()
        };
        let deactivate = StaffUpdate {
            is_active: Some(false),
            ..StaffUpdate::default()
        };
        let rename = StaffUpdate {
            name: Some("Mira K".to_string()),
            ..StaffUpdate::default()
        };

        let super_admin = staff(StaffRole::SuperAdmin, true);
        assert!(removes_super_admin(&super_admin, &demote));
        assert!(removes_super_admin(&super_admin, &deactivate));
        assert!(!removes_super_admin(&super_admin, &rename));
        assert!(!removes_super_admin(&staff(StaffRole::Admin, true), &deactivate));
        assert!(!removes_super_admin(&staff(StaffRole::SuperAdmin, false), &demote));
    }
}

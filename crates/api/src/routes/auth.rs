//! Staff authentication handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use emporium_core::StaffRole;

use crate::db::StaffRepository;
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::middleware::{OptionalStaff, RequireStaff, auth_cookie, clear_auth_cookie};
use crate::models::staff::{
    ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput, Staff, UpdatePasswordInput,
};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Generic answer to a reset request, so it can't be used to enumerate accounts.
const RESET_REQUESTED: &str = "If that email belongs to an account, a reset link has been sent";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub staff: Staff,
}

/// Exchange credentials for a JWT, returned in the body and as a cookie.
#[instrument(skip(state, input), fields(email = %input.email))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<Response, AppError> {
    let (staff, token) = AuthService::new(state.pool(), state.jwt())
        .login(&input.email, &input.password)
        .await?;

    let cookie = auth_cookie(
        &token,
        state.jwt().max_age_seconds(),
        state.config().secure_cookies(),
    )?;
    tracing::info!(staff_id = %staff.id, "Staff logged in");

    Ok(([(header::SET_COOKIE, cookie)], Json(LoginResponse { token, staff })).into_response())
}

/// Create a staff account.
///
/// The very first account needs no token and is always a super admin; after
/// that only super admins may register staff.
#[instrument(skip(state, caller, input))]
pub async fn register(
    State(state): State<AppState>,
    OptionalStaff(caller): OptionalStaff,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    input.field_errors().finish()?;
    let auth = AuthService::new(state.pool(), state.jwt());

    if StaffRepository::new(state.pool()).count().await? == 0
        && let Some(staff) = auth
            .create_first_staff(&input.name, &input.email, &input.password, input.image.clone())
            .await?
    {
        tracing::info!(staff_id = %staff.id, "First super admin registered");
        return Ok((StatusCode::CREATED, Json(staff)));
    }

    let role = match caller {
        None => return Err(AuthError::MissingToken.into()),
        Some(caller) if caller.role != StaffRole::SuperAdmin => {
            return Err(AppError::Forbidden(
                "Super admin access required".to_string(),
            ));
        }
        Some(_) => input.role.unwrap_or(StaffRole::Staff),
    };

    let staff = auth
        .create_staff(&input.name, &input.email, &input.password, role, input.image)
        .await?;

    tracing::info!(staff_id = %staff.id, role = %staff.role, "Staff registered");
    Ok((StatusCode::CREATED, Json(staff)))
}

/// Clear the auth cookie. Bearer tokens stay valid until they expire.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(
            header::SET_COOKIE,
            clear_auth_cookie(state.config().secure_cookies()),
        )],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response()
}

/// The authenticated staff member.
pub async fn me(RequireStaff(staff): RequireStaff) -> Json<Staff> {
    Json(staff)
}

#[instrument(skip(state, staff, input), fields(staff_id = %staff.id))]
pub async fn update_password(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    JsonBody(input): JsonBody<UpdatePasswordInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    AuthService::new(state.pool(), state.jwt())
        .change_password(staff.id, &input.current_password, &input.new_password)
        .await?;
    tracing::info!("Password changed");
    Ok(Json(json!({ "message": "Password updated" })))
}

/// Start a password reset. Always answers with the same message.
#[instrument(skip(state, input))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ForgotPasswordInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pending = AuthService::new(state.pool(), state.jwt())
        .begin_password_reset(&input.email)
        .await?;

    if let Some((staff, token)) = pending {
        let link = state.config().password_reset_link(&token);
        match state.mailer() {
            Some(mailer) => {
                if let Err(e) = mailer.send_password_reset(&staff, &link).await {
                    tracing::error!(staff_id = %staff.id, error = %e, "Failed to send reset email");
                }
            }
            None => {
                tracing::warn!(
                    staff_id = %staff.id,
                    "No mailer configured; password reset link was not sent"
                );
            }
        }
    }

    Ok(Json(json!({ "message": RESET_REQUESTED })))
}

#[instrument(skip(state, input))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResetPasswordInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let staff = AuthService::new(state.pool(), state.jwt())
        .complete_password_reset(&input.token, &input.new_password)
        .await?;
    tracing::info!(staff_id = %staff.id, "Password reset completed");
    Ok(Json(json!({ "message": "Password has been reset" })))
}

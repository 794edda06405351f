// src/api/users.rs

use actix_web::{delete, get, put, web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::auth::{hash_password, require_role, require_self_or_admin, Principal};
use crate::api::ApiResponse;
use crate::errors::{AppError, AppResult};
use crate::models::{Role, User, UserUpdate};
use crate::validation::{normalize_email, validate_password};
use crate::{db, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Admin only.
    pub role: Option<Role>,
    /// Admin only.
    pub is_active: Option<bool>,
    /// Admin only.
    pub email_verified: Option<bool>,
}

impl UpdateUserRequest {
    fn touches_admin_fields(&self) -> bool {
        self.role.is_some() || self.is_active.is_some() || self.email_verified.is_some()
    }

    /// Validated changes; the password is hashed here when present.
    fn into_update(self) -> AppResult<UserUpdate> {
        let email = self.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match self.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };
        let first_name = match self.first_name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::validation("firstName cannot be empty"))
            }
            other => other.map(|n| n.trim().to_string()),
        };

        Ok(UserUpdate {
            email,
            password_hash,
            first_name,
            last_name: self.last_name.map(|n| n.trim().to_string()),
            role: self.role,
            email_verified: self.email_verified,
            is_active: self.is_active,
        })
    }
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Admin only")
    ),
    tag = "users"
)]
#[get("/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    principal: Principal,
) -> AppResult<HttpResponse> {
    require_role(&principal, Role::Admin)?;
    let users = db::list_users(&state.pool).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(users)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Neither self nor admin"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
#[get("/users/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let id = id.into_inner();
    require_self_or_admin(&principal, id)?;

    let user = db::get_user(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid data or email taken"),
        (status = 403, description = "Not allowed to change these fields"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
#[put("/users/{id}")]
pub async fn update_user(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
    payload: web::Json<UpdateUserRequest>,
) -> AppResult<HttpResponse> {
    let id = id.into_inner();
    require_self_or_admin(&principal, id)?;

    let payload = payload.into_inner();
    if payload.touches_admin_fields() {
        require_role(&principal, Role::Admin)?;
    }

    let changes = payload.into_update()?;
    let user = db::update_user(&state.pool, id, &changes)
        .await
        .map_err(|e| AppError::from_unique(e, "Email is already in use"))?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(user).with_message("User updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated"),
        (status = 403, description = "Neither self nor admin"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
#[delete("/users/{id}")]
pub async fn delete_user(
    state: web::Data<AppState>,
    principal: Principal,
    id: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let id = id.into_inner();
    require_self_or_admin(&principal, id)?;

    let changes = UserUpdate {
        is_active: Some(false),
        ..Default::default()
    };
    let user: User = db::update_user(&state.pool, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    log::info!("user {} deactivated by user {}", user.id, principal.user_id);
    Ok(HttpResponse::Ok().json(ApiResponse::message("User deactivated successfully")))
}

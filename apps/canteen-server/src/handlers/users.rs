//! `/api/users` handlers (admin only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use canteen_core::{Role, User};
use canteen_db::UserUpdate;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{Ack, ApiJson};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<UsersResponse>> {
    Ok(Json(UsersResponse {
        users: state.users.list().await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Seller
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<CreateUserBody>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state
        .users
        .create(&body.username, &body.password, body.role)
        .await?;

    tracing::info!(
        admin = %admin.username,
        username = %user.username,
        role = user.role.as_str(),
        "User created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
    pub username: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateUserBody>,
) -> ApiResult<Json<User>> {
    let update = UserUpdate {
        username: body.username,
        role: body.role,
        active: body.active,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let user = state.users.update(&id, update).await?;
    tracing::info!(admin = %admin.username, username = %user.username, "User updated");
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
    #[serde(default)]
    pub password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PasswordBody>,
) -> ApiResult<Json<Ack>> {
    state.users.change_password(&id, &body.password).await?;
    Ok(Ack::ok())
}

pub async fn delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.users.delete(&id, &admin.id).await?;
    tracing::info!(admin = %admin.username, id = %id, "User deleted");
    Ok(Ack::ok())
}

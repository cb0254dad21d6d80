//! `/auth` handlers: login, logout, current identity.

use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};

use canteen_core::{Role, User};

use crate::auth::{clear_session_cookie, AuthUser, ClientIp};
use crate::error::ApiResult;
use crate::handlers::{Ack, ApiJson};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    /// Seconds.
    pub expires_in: i64,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    ApiJson(body): ApiJson<LoginBody>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .users
        .login(&client, &body.username, &body.password)
        .await?;

    let token = state.jwt.generate_token(&user)?;
    let cookie = state.jwt.session_cookie(&token);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            success: true,
            token,
            expires_in: state.jwt.lifetime_secs(),
            user,
        }),
    ))
}

pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Ack::ok(),
    )
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
    pub role: Role,
}

pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}

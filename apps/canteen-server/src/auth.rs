//! JWT authentication module.
//!
//! Handles token generation and validation, and the axum extractors that
//! turn a request into an operator identity.
//!
//! ```text
//! Authorization: Bearer <jwt> ─┐
//!                              ├──► JwtManager::validate_token ──► users lookup
//! Cookie: token=<jwt> ─────────┘                                    (must be active)
//!                                                                        │
//!                      AuthUser ◄── any role                             │
//!                      AdminUser ◄── role = admin, else 403  ◄───────────┘
//!                      MaybeUser ◄── never rejects (public purchase)
//! ```

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use canteen_core::{Role, User};

use crate::error::ApiError;
use crate::AppState;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub username: String,

    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Generate a session token for an operator.
    pub fn generate_token(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {e}")))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "Rejected token");
            ApiError::unauthorized("Invalid or expired session")
        })?;

        Ok(token_data.claims)
    }

    /// `Set-Cookie` value carrying a fresh token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{TOKEN_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            self.lifetime_secs
        )
    }
}

/// `Set-Cookie` value that clears the session.
pub fn clear_session_cookie() -> String {
    format!("{TOKEN_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token);

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

// =============================================================================
// Extractors
// =============================================================================

/// Authenticated operator.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthUser, ApiError> {
    let token = token_from_headers(&parts.headers)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let claims = state.jwt.validate_token(&token)?;

    // Role and activity come from the database, not the token
    let user = state
        .db
        .users()
        .get_by_id(&claims.sub)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| ApiError::unauthorized("Account is missing or disabled"))?;

    Ok(AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await
    }
}

/// Authenticated operator with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;

        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }

        Ok(AdminUser(user))
    }
}

/// Optional identity: anonymous callers and bad tokens yield `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if token_from_headers(&parts.headers).is_none() {
            return Ok(MaybeUser(None));
        }

        match authenticate(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(err) => {
                debug!(error = %err, "Ignoring invalid credentials on public route");
                Ok(MaybeUser(None))
            }
        }
    }
}

/// Client address for login throttling.
///
/// First `X-Forwarded-For` hop, then the socket peer, then `"unknown"`.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ClientIp(ip.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}

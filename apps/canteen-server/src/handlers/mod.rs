//! HTTP handlers.
//!
//! Request DTOs are declared here per route group and converted to domain
//! values once, at the boundary. Amounts cross the wire as decimal major
//! units (`0.5`) and become [`Money`] cents immediately.
//!
//! [`Money`]: canteen_core::Money

pub mod auth;
pub mod health;
pub mod tickets;
pub mod users;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;

/// `Json` whose rejection renders as a standard error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
}

/// `Query` whose rejection renders as a standard error body.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid query string: {}", rejection.body_text()))
}

/// `{"success": true}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Json<Ack> {
        Json(Ack { success: true })
    }
}

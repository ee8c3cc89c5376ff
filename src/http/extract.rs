//! Request principals.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;
use crate::app::Storefront;
use crate::domain::aggregates::Profile;
use super::error::ApiError;

/// Header set by the authenticating gateway in front of this service.
pub const USER_HEADER: &str = "x-user-id";

/// The signed-in customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal { pub user_id: Uuid }

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(USER_HEADER).ok_or_else(|| ApiError::unauthorized("Sign in to continue"))?;
        let user_id = value.to_str().ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| ApiError::unauthorized("Invalid user id"))?;
        Ok(Self { user_id })
    }
}

/// A principal whose profile carries the admin role.
#[derive(Clone, Debug)]
pub struct AdminUser(pub Profile);

#[async_trait]
impl FromRequestParts<Storefront> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Storefront) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        Ok(Self(state.access.require_admin(principal.user_id).await?))
    }
}

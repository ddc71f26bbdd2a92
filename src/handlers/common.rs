use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::returns::Actor;
use crate::state_machine::ActorRole;

/// Header carrying the authenticated staff member's id, set by the upstream
/// gateway after authentication (authn itself is out of scope here).
pub const ADMIN_ID_HEADER: &str = "x-admin-id";
/// Header carrying the authenticated staff member's role.
pub const ADMIN_ROLE_HEADER: &str = "x-admin-role";
/// Header carrying the authenticated storefront customer's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for staff-initiated calls: builds an explicit actor from the
/// gateway headers. No ambient session state reaches the engine.
#[derive(Debug, Clone, Copy)]
pub struct AdminActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AdminActor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ADMIN_ID_HEADER)?;
        let role = header_value(parts, ADMIN_ROLE_HEADER)?;

        let id = Uuid::parse_str(&id).map_err(|_| {
            ServiceError::ValidationError(format!("{} must be a UUID", ADMIN_ID_HEADER))
        })?;
        let role = ActorRole::from_str(&role)
            .map_err(|_| ServiceError::ValidationError(format!("Unknown actor role '{}'", role)))?;

        Ok(AdminActor(Actor { id, role }))
    }
}

/// Extractor for customer-initiated calls from the storefront client.
#[derive(Debug, Clone, Copy)]
pub struct CustomerActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CustomerActor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, USER_ID_HEADER)?;
        let id = Uuid::parse_str(&id).map_err(|_| {
            ServiceError::ValidationError(format!("{} must be a UUID", USER_ID_HEADER))
        })?;

        Ok(CustomerActor(Actor {
            id,
            role: ActorRole::Customer,
        }))
    }
}

fn header_value(parts: &Parts, name: &str) -> Result<String, ServiceError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Forbidden(format!("missing {} header", name)))
}

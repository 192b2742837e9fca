//! Extracts `ActorContext` from request headers (§6: "Extract `tenant_id`,
//! `actor_user_id`, `role` from request headers; unknown or missing ⇒
//! authentication failure").
//!
//! Header names follow the reference implementation's `X-Actor-User-Id` /
//! `X-Role` convention (`original_source/app/api/deps.py`,
//! `original_source/app/main.py`), widened with `X-Tenant-Id` for this
//! core's multi-tenant data model.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shopfloor_core::models::ActorContext;
use uuid::Uuid;

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-user-id";
pub const ROLE_HEADER: &str = "x-role";

pub struct Actor(pub ActorContext);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_HEADER)?;
        let actor_user_id = header_uuid(parts, ACTOR_HEADER)?;
        let role = header_str(parts, ROLE_HEADER)?;

        Ok(Actor(ActorContext {
            tenant_id,
            actor_user_id,
            role,
        }))
    }
}

fn header_str(parts: &Parts, name: &str) -> Result<String, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::unauthenticated(format!("missing {name} header")))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthenticated(format!("{name} header is not valid text")))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::unauthenticated(format!("empty {name} header")));
    }
    Ok(value.to_string())
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, ApiError> {
    let raw = header_str(parts, name)?;
    Uuid::parse_str(&raw)
        .map_err(|_| ApiError::unauthenticated(format!("{name} header is not a valid UUID")))
}

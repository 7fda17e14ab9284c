//! Caller identity as asserted by the upstream gateway.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;
use waypost_model::{Actor, Role};

use super::errors::AppError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated [`Actor`] behind a request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let id = header(ACTOR_ID_HEADER)
            .ok_or_else(|| AppError::unauthenticated("missing x-actor-id header"))?;
        let role = header(ACTOR_ROLE_HEADER)
            .ok_or_else(|| AppError::unauthenticated("missing x-actor-role header"))?;

        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::unauthenticated("x-actor-id is not a UUID"))?;
        let role: Role = role
            .parse()
            .map_err(|_| AppError::unauthenticated(format!("unknown role '{role}'")))?;

        Ok(CurrentActor(Actor { id, role }))
    }
}

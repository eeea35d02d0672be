//! Bearer-token actor extractor.
//!
//! Sign-in happens at the external identity provider. Handlers receive the
//! verified caller as a domain [`Actor`].

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::actor::{Actor, ActorRole};
use shared::jwt::{IdentityClaims, JwtError};

use crate::app::AppState;
use crate::error::ApiError;

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl AuthenticatedActor {
    /// Maps verified claims to an actor. A missing role means `user`.
    pub fn from_claims(claims: IdentityClaims) -> Result<Self, ApiError> {
        let role = match claims.role.as_deref() {
            None => ActorRole::User,
            Some(role) => ActorRole::parse(role)
                .ok_or_else(|| ApiError::Unauthorized(format!("Unknown role '{}'", role)))?,
        };

        Ok(Self(Actor::new(claims.sub, role)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ApiError::Unauthorized("Invalid Authorization header format".to_string())
            })?;

        let claims = state.verifier.verify(token).map_err(|e| match e {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
            JwtError::InvalidKey(msg) => ApiError::Internal(msg),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        })?;

        let actor = Self::from_claims(claims)?;
        tracing::debug!(user_id = %actor.0.user_id, role = %actor.0.role, "Authenticated caller");
        Ok(actor)
    }
}

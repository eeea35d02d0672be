//! Subscription and eligibility handlers.

use axum::{extract::State, Json};
use domain::models::subscription::{RequestEligibility, Subscription};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthenticatedActor;

/// The caller's subscription. A basic plan is created on first access.
///
/// GET /api/v1/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = state.quota.ensure_subscription(&actor.user_id).await?;
    Ok(Json(subscription))
}

/// Whether the caller may submit a request right now.
///
/// GET /api/v1/subscription/eligibility
pub async fn get_eligibility(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<RequestEligibility>, ApiError> {
    let eligibility = state.quota.can_make_request(&actor.user_id).await?;
    Ok(Json(eligibility))
}

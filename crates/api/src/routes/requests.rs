//! Emergency request handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::emergency_request::{
    AssignProviderRequest, CreateEmergencyRequest, EmergencyRequest, ListRequestsResponse,
    RateRequestPayload, UpdateStatusRequest,
};
use domain::DomainError;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthenticatedActor;

/// Submit a new request on behalf of the caller. Consumes one unit of quota.
///
/// POST /api/v1/requests
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(payload): Json<CreateEmergencyRequest>,
) -> Result<(StatusCode, Json<EmergencyRequest>), ApiError> {
    let request = state
        .requests
        .create_request(&actor.user_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's own requests, newest first.
///
/// GET /api/v1/requests
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<ListRequestsResponse>, ApiError> {
    let requests = state.lifecycle.history(&actor.user_id).await?;
    Ok(Json(ListRequestsResponse {
        total: requests.len(),
        requests,
    }))
}

/// GET /api/v1/requests/:request_id
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(request_id): Path<Uuid>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    let request = state.lifecycle.get(request_id, &actor).await?;
    Ok(Json(request))
}

/// PATCH /api/v1/requests/:request_id/status
pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(request_id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    let to = body.parse_status()?;
    let request = state
        .lifecycle
        .transition_by_id(request_id, to, &actor)
        .await?;
    Ok(Json(request))
}

/// Assign a provider to a pending request. Admins only.
///
/// POST /api/v1/requests/:request_id/assign
pub async fn assign_provider(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(request_id): Path<Uuid>,
    Json(body): Json<AssignProviderRequest>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    let request = state
        .lifecycle
        .assign_provider(request_id, body.provider, body.estimated_arrival, &actor)
        .await?;
    Ok(Json(request))
}

/// POST /api/v1/requests/:request_id/rating
pub async fn rate_request(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(request_id): Path<Uuid>,
    Json(body): Json<RateRequestPayload>,
) -> Result<Json<EmergencyRequest>, ApiError> {
    body.validate().map_err(DomainError::from)?;
    let request = state
        .lifecycle
        .rate(request_id, body.rating, body.feedback, &actor)
        .await?;
    Ok(Json(request))
}

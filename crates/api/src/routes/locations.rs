//! Location reporting handlers.

use axum::{extract::State, Json};
use domain::models::location::{LocationEvent, ReportLocationRequest, UserLocationSample};
use domain::models::user_zone_state::UserZoneState;
use shared::geo::Coordinates;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthenticatedActor;

/// Report the caller's position and receive the resulting zone transitions.
///
/// POST /api/v1/locations
pub async fn report_location(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(request): Json<ReportLocationRequest>,
) -> Result<Json<LocationEvent>, ApiError> {
    request.check()?;

    let mut sample = UserLocationSample::new(
        actor.user_id.as_str(),
        Coordinates::new(request.latitude, request.longitude),
        request.accuracy,
    );
    sample.timestamp = request.captured_at();

    let event = state.locations.process_sample(sample).await?;
    Ok(Json(event))
}

/// The caller's eligibility, pricing tier and current service area.
///
/// GET /api/v1/locations/zone-state
pub async fn get_zone_state(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<Json<UserZoneState>, ApiError> {
    let zone_state = state.locations.zone_state(&actor.user_id).await?;
    Ok(Json(zone_state))
}

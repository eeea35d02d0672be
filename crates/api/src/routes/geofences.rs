//! Geofence endpoint handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::models::geofence::{
    ContainingZonesQuery, CreateGeofenceRequest, Geofence, ListGeofencesResponse,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthenticatedActor;

/// List registered zones in registration order.
///
/// GET /api/v1/geofences
pub async fn list_geofences(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
) -> Json<ListGeofencesResponse> {
    let geofences = state.zones.all_zones();
    Json(ListGeofencesResponse {
        total: geofences.len(),
        geofences,
    })
}

/// Register a new zone. Admins only.
///
/// POST /api/v1/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<Geofence>), ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::Forbidden(
            "Only admins may register zones".to_string(),
        ));
    }

    let zone = state.zones.add_zone(request)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// Zones containing a point.
///
/// GET /api/v1/geofences/containing?latitude=..&longitude=..
pub async fn containing_zones(
    State(state): State<AppState>,
    AuthenticatedActor(_actor): AuthenticatedActor,
    Query(query): Query<ContainingZonesQuery>,
) -> Result<Json<ListGeofencesResponse>, ApiError> {
    let geofences = state
        .zones
        .containing_zones(query.latitude, query.longitude)?;
    Ok(Json(ListGeofencesResponse {
        total: geofences.len(),
        geofences,
    }))
}

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::{
    EmergencyRequestService, InMemoryNotificationSink, InMemoryRequestStore,
    InMemorySubscriptionStore, InMemoryUserZoneStateStore, LocationEventProcessor,
    NotificationEmitter, NotificationSink, QuotaService, RequestLifecycleManager, RequestStore,
    SubscriptionStore, UserZoneStateStore, ZoneRegistry,
};
use persistence::repositories::{
    EmergencyRequestRepository, NotificationRepository, SubscriptionRepository,
    UserZoneStateRepository,
};
use shared::jwt::IdentityVerifier;
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{geofences, health, locations, requests, subscription};

/// Storage backends behind the core services.
#[derive(Clone)]
pub struct Collaborators {
    pub requests: Arc<dyn RequestStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub zone_states: Arc<dyn UserZoneStateStore>,
}

impl Collaborators {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            requests: Arc::new(EmergencyRequestRepository::new(pool.clone())),
            subscriptions: Arc::new(SubscriptionRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            zone_states: Arc::new(UserZoneStateRepository::new(pool.clone())),
        }
    }

    /// Process-local stores, used for tests and local runs without a database.
    pub fn in_memory() -> Self {
        Self {
            requests: Arc::new(InMemoryRequestStore::new()),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            notifications: Arc::new(InMemoryNotificationSink::new()),
            zone_states: Arc::new(InMemoryUserZoneStateStore::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Present when backed by PostgreSQL; used for health and pool metrics.
    pub pool: Option<PgPool>,
    pub verifier: Arc<IdentityVerifier>,
    pub zones: Arc<ZoneRegistry>,
    pub locations: Arc<LocationEventProcessor>,
    pub lifecycle: RequestLifecycleManager,
    pub quota: QuotaService,
    pub requests: EmergencyRequestService,
}

impl AppState {
    /// Wires the core services over `collaborators`.
    pub fn new(
        config: Config,
        pool: Option<PgPool>,
        collaborators: Collaborators,
    ) -> anyhow::Result<Self> {
        let verifier = IdentityVerifier::from_rsa_pem(
            &config.identity.public_key,
            config.identity.issuer.clone(),
            config.identity.audience.clone(),
            config.identity.leeway_secs,
        )?;

        let zones = Arc::new(if config.geofencing.seed_default_zones {
            ZoneRegistry::with_default_zones()
        } else {
            ZoneRegistry::new()
        });

        let retry = config.retry.policy();
        let notifications =
            NotificationEmitter::new(collaborators.notifications).with_retry_policy(retry.clone());

        let locations = Arc::new(LocationEventProcessor::new(
            zones.clone(),
            notifications.clone(),
            collaborators.zone_states.clone(),
            config.geofencing.cache_config(),
        ));
        let lifecycle = RequestLifecycleManager::new(collaborators.requests, notifications.clone())
            .with_retry_policy(retry.clone());
        let quota = QuotaService::new(collaborators.subscriptions).with_retry_policy(retry);
        let requests = EmergencyRequestService::new(
            quota.clone(),
            lifecycle.clone(),
            notifications,
            collaborators.zone_states,
        );

        tracing::info!(zones = zones.len(), "Core services initialized");

        Ok(Self {
            config: Arc::new(config),
            pool,
            verifier: Arc::new(verifier),
            zones,
            locations,
            lifecycle,
            quota,
            requests,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Every v1 handler takes an AuthenticatedActor, so auth is enforced per route
    let v1_routes = Router::new()
        .route(
            "/api/v1/geofences",
            get(geofences::list_geofences).post(geofences::create_geofence),
        )
        .route(
            "/api/v1/geofences/containing",
            get(geofences::containing_zones),
        )
        .route("/api/v1/locations", post(locations::report_location))
        .route(
            "/api/v1/locations/zone-state",
            get(locations::get_zone_state),
        )
        .route(
            "/api/v1/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route("/api/v1/requests/:request_id", get(requests::get_request))
        .route(
            "/api/v1/requests/:request_id/status",
            patch(requests::update_status),
        )
        .route(
            "/api/v1/requests/:request_id/assign",
            post(requests::assign_provider),
        )
        .route(
            "/api/v1/requests/:request_id/rating",
            post(requests::rate_request),
        )
        .route(
            "/api/v1/subscription",
            get(subscription::get_subscription),
        )
        .route(
            "/api/v1/subscription/eligibility",
            get(subscription::get_eligibility),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(v1_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

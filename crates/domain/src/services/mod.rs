//! Core services.
//!
//! Every service talks to its collaborators through the store and sink
//! traits defined alongside it, so the same logic runs against PostgreSQL
//! in production and against the in-memory implementations in tests.

pub mod emergency_request;
pub mod location_processor;
pub mod notification;
pub mod quota;
pub mod request_lifecycle;
pub mod zone_registry;

pub use emergency_request::EmergencyRequestService;
pub use location_processor::{
    InMemoryUserZoneStateStore, LocationCacheConfig, LocationEventProcessor, UserZoneStateStore,
};
pub use notification::{
    InMemoryNotificationSink, NotificationEmitter, NotificationResult, NotificationSink,
};
pub use quota::{InMemorySubscriptionStore, QuotaService, SubscriptionStore};
pub use request_lifecycle::{
    InMemoryRequestStore, RequestLifecycleManager, RequestStore, StatusChange,
};
pub use zone_registry::{default_zones, ZoneRegistry};

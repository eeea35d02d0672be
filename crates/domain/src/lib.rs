//! Domain layer for the EV Assist backend.
//!
//! This crate contains:
//! - Domain models (Geofence, EmergencyRequest, Subscription, Notification)
//! - The zone registry, location event processor, request lifecycle manager
//!   and quota service
//! - Collaborator traits for persistence and notifications, with in-memory
//!   implementations
//! - Domain error types

pub mod error;
pub mod models;
pub mod retry;
pub mod services;

pub use error::DomainError;

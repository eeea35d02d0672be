//! Shared utilities and common types for the EV Assist backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Coordinate math (haversine great-circle distance)
//! - Identity token verification for the external identity provider
//! - Common validation logic

pub mod geo;
pub mod jwt;
pub mod validation;

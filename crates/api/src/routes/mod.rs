pub mod geofences;
pub mod health;
pub mod locations;
pub mod requests;
pub mod subscription;

//! Observability server (§4.11).
//!
//! Health, version, Prometheus metrics, and a per-source debug snapshot.
//! This module carries no pipeline logic: it only reads [`crate::metrics`]
//! counters and a [`crate::scene::SceneSnapshot`] the scene-controller loop
//! publishes after every tick.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

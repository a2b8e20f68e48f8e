//! Shared state for the observability server.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::scene::SceneSnapshot;

pub struct AppState {
    pub config: ServerConfig,
    pub metrics: Arc<Metrics>,
    pub scene: Arc<RwLock<SceneSnapshot>>,
    pub pool_alive: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: ServerConfig, metrics: Arc<Metrics>, scene: Arc<RwLock<SceneSnapshot>>, pool_alive: Arc<AtomicBool>) -> Self {
        Self { config, metrics, scene, pool_alive }
    }
}

//! Multi-source HLS ingestion pipeline.
//!
//! Wires the worker pool (C6), scene controller (C9), and observability
//! server together. The four pipeline stages run on plain OS threads inside
//! [`hls_pipeline::worker_pool`]; this binary owns only the scene-tick loop
//! and the axum server that reports on it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_pipeline::config_file::load_config;
use hls_pipeline::error::PipelineError;
use hls_pipeline::external::demux::MpegTsDemuxer;
use hls_pipeline::external::http_client::ReqwestHttpClient;
use hls_pipeline::external::m3u8::M3u8Parser;
use hls_pipeline::http::{create_router, AppState};
use hls_pipeline::limits::MAX_SOURCES;
use hls_pipeline::media_cache::RawMediaCache;
use hls_pipeline::metrics::Metrics;
use hls_pipeline::scene::{SceneController, SceneSnapshot};
use hls_pipeline::segment_ring::SegmentRingStore;
use hls_pipeline::url_pool::UrlInternPool;
use hls_pipeline::worker_pool::{WorkerContext, WorkerPool};

const APP_NAME: &str = "hls-pipeline";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const SCENE_TICK_INTERVAL_MS: u64 = 40;

/// Plain text by default; `HLS_PIPELINE_LOG_FORMAT=json` switches to
/// structured JSON lines for log aggregators.
fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("hls_pipeline={log_level}").into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("HLS_PIPELINE_LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Sources are read once at startup from the `HLS_PIPELINE_SOURCES`
/// environment variable, a comma-separated list of playlist URLs. Runtime
/// source changes are a REDESIGN FLAG: nothing here exposes an admin
/// endpoint to call `SceneController::set_sources` again yet.
fn initial_sources() -> Vec<String> {
    std::env::var("HLS_PIPELINE_SOURCES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path);
    init_logging(&config.log_level);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!(?config, "configuration loaded");

    let sources = initial_sources();
    if sources.len() > MAX_SOURCES {
        return Err(PipelineError::TooManySources(sources.len(), MAX_SOURCES));
    }

    let metrics = Arc::new(Metrics::new());
    let url_pool = Arc::new(UrlInternPool::new());
    let rings = Arc::new(SegmentRingStore::new(MAX_SOURCES));

    let worker_ctx = Arc::new(WorkerContext {
        url_pool: url_pool.clone(),
        media_cache: Arc::new(RawMediaCache::new()),
        rings: rings.clone(),
        http: Arc::new(ReqwestHttpClient::default()),
        playlist_parser: Arc::new(M3u8Parser),
        demuxer: Arc::new(MpegTsDemuxer),
        metrics: metrics.clone(),
    });
    let worker_pool = WorkerPool::start(&config.pipeline, worker_ctx);
    let pool_alive = worker_pool.liveness_handle();

    let mut scene = SceneController::new(url_pool, rings, worker_pool);
    scene.set_sources(sources);

    let scene_snapshot = Arc::new(RwLock::new(SceneSnapshot::default()));
    spawn_scene_thread(scene, scene_snapshot.clone(), metrics.clone());

    let state = Arc::new(AppState::new(config.clone(), metrics, scene_snapshot, pool_alive));
    let app = create_router(state);

    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| PipelineError::Config(format!("invalid host/port {:?}: {e}", config.socket_addr())))?;
    tracing::info!(%addr, "starting observability server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received shutdown signal, stopping observability server");
}

/// Runs the scene controller's tick loop on its own OS thread (nothing in
/// `scene` is `Sync`, so it cannot be shared directly with the async
/// server) and publishes a snapshot for `/debug/sources` after every tick.
fn spawn_scene_thread(mut scene: SceneController, snapshot: Arc<RwLock<SceneSnapshot>>, metrics: Arc<Metrics>) {
    std::thread::Builder::new()
        .name("scene-controller".to_string())
        .spawn(move || {
            let tick_interval = Duration::from_millis(SCENE_TICK_INTERVAL_MS);
            let started = std::time::Instant::now();
            let tick_count = AtomicU64::new(0);
            loop {
                let now_sec = started.elapsed().as_secs_f32();
                scene.tick(now_sec, tick_interval);
                *snapshot.write() = scene.snapshot();
                metrics.set_active_sources(scene.source_count() as u64);
                tick_count.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(tick_interval);
            }
        })
        .expect("failed to spawn scene controller thread");
}

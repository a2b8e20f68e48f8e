//! Concurrent ingestion pipeline for a multi-source HLS player.
//!
//! `worker_pool` runs the four OS-thread stages (playlist refresh, segment
//! download, demux, and the implicit decode/present stage inside
//! [`playback`]); `scene` is the single-threaded controller that owns
//! per-source state and drains the pipeline's output. `http` exposes the
//! whole thing's health and metrics over an axum server; it carries no
//! pipeline logic of its own.

pub mod config;
pub mod config_file;
pub mod decoder_pool;
pub mod error;
pub mod external;
pub mod h264;
pub mod http;
pub mod limits;
pub mod media_cache;
pub mod metrics;
pub mod playback;
pub mod scene;
pub mod segment_ring;
pub mod stream;
pub mod url_pool;
pub mod worker_pool;

//! Worker Pool (C6).
//!
//! Four channel-connected thread groups: 4 playlist workers, 8 download
//! workers, 2 demux workers, feeding a single `ready_channel` the scene
//! controller drains with `try_recv`. Cancellation is the `sources_hash`
//! epoch token: every task carries the hash that was live when it was
//! enqueued, and a worker drops (rather than processes) any task whose hash
//! no longer matches the pool's current epoch.

pub mod tasks;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::config::PipelineConfig;
use crate::external::demux::TransportDemuxer;
use crate::external::http_client::HttpClient;
use crate::external::m3u8::{ParsedPlaylist, PlaylistParser};
use crate::media_cache::RawMediaCache;
use crate::metrics::Metrics;
use crate::segment_ring::{SegmentPayload, SegmentRingStore};
use crate::url_pool::UrlInternPool;

use tasks::{DemuxTask, MediaTask, ReadyPayload, SourceTask};

/// Collaborators shared by every worker thread. Each field is independently
/// guarded (or lock-free); no operation here holds more than one of their
/// internal mutexes at a time.
pub struct WorkerContext {
    pub url_pool: Arc<UrlInternPool>,
    pub media_cache: Arc<RawMediaCache>,
    pub rings: Arc<SegmentRingStore>,
    pub http: Arc<dyn HttpClient>,
    pub playlist_parser: Arc<dyn PlaylistParser>,
    pub demuxer: Arc<dyn TransportDemuxer>,
    pub metrics: Arc<Metrics>,
}

pub struct WorkerPool {
    source_tx: Sender<SourceTask>,
    ready_rx: Receiver<ReadyPayload>,
    sources_hash: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    // Kept alive so download/demux workers' senders aren't orphaned once the
    // pool itself still holds a receiver; dropping the pool drops these too.
    download_tx: Sender<MediaTask>,
    demux_tx: Sender<DemuxTask>,
}

impl WorkerPool {
    pub fn start(config: &PipelineConfig, ctx: Arc<WorkerContext>) -> Self {
        let (source_tx, source_rx) = unbounded::<SourceTask>();
        let (download_tx, download_rx) = unbounded::<MediaTask>();
        let (demux_tx, demux_rx) = unbounded::<DemuxTask>();
        let (ready_tx, ready_rx) = unbounded::<ReadyPayload>();

        let running = Arc::new(AtomicBool::new(true));
        let sources_hash = Arc::new(AtomicU64::new(0));
        let recv_timeout = Duration::from_millis(config.worker_recv_timeout_ms);
        let refresh_floor_ms = config.playlist_refresh_floor_ms;

        let mut handles = Vec::with_capacity(config.playlist_workers + config.download_workers + config.demux_workers);

        for id in 0..config.playlist_workers {
            let source_rx = source_rx.clone();
            let source_tx = source_tx.clone();
            let download_tx = download_tx.clone();
            let ctx = ctx.clone();
            let running = running.clone();
            let sources_hash = sources_hash.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("playlist-worker-{id}"))
                    .spawn(move || {
                        playlist_worker_loop(source_rx, source_tx, download_tx, ctx, running, sources_hash, recv_timeout, refresh_floor_ms)
                    })
                    .expect("failed to spawn playlist worker"),
            );
        }

        for id in 0..config.download_workers {
            let download_rx = download_rx.clone();
            let demux_tx = demux_tx.clone();
            let ctx = ctx.clone();
            let running = running.clone();
            let sources_hash = sources_hash.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("download-worker-{id}"))
                    .spawn(move || download_worker_loop(download_rx, demux_tx, ctx, running, sources_hash, recv_timeout))
                    .expect("failed to spawn download worker"),
            );
        }

        for id in 0..config.demux_workers {
            let demux_rx = demux_rx.clone();
            let ready_tx = ready_tx.clone();
            let ctx = ctx.clone();
            let running = running.clone();
            let sources_hash = sources_hash.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("demux-worker-{id}"))
                    .spawn(move || demux_worker_loop(demux_rx, ready_tx, ctx, running, sources_hash, recv_timeout))
                    .expect("failed to spawn demux worker"),
            );
        }

        Self {
            source_tx,
            ready_rx,
            sources_hash,
            running,
            handles,
            download_tx,
            demux_tx,
        }
    }

    /// Updates the pool's live epoch. Tasks already in flight carrying an
    /// older hash will be dropped at their next stage boundary.
    pub fn set_sources_hash(&self, hash: u64) {
        self.sources_hash.store(hash, Ordering::SeqCst);
    }

    pub fn enqueue_source_task(&self, task: SourceTask) {
        let _ = self.source_tx.send(task);
    }

    /// Drains every currently-queued ready payload without blocking.
    pub fn try_recv_ready(&self) -> Vec<ReadyPayload> {
        self.ready_rx.try_iter().collect()
    }

    /// Drops every pending item on every channel. Rust's `Drop` on the
    /// payload types (in particular `ReadyPayload`'s `H264Video`) runs as
    /// each item is discarded, which is the destructor-on-discard behavior
    /// the channel contract requires.
    pub fn flush(&self) {
        while self.ready_rx.try_recv().is_ok() {}
    }

    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// A cloneable liveness flag for the observability server's health
    /// check: `true` until [`WorkerPool::shutdown`] is called.
    pub fn liveness_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}

fn stale(task_hash: u64, live: &AtomicU64) -> bool {
    task_hash != live.load(Ordering::SeqCst)
}

fn playlist_worker_loop(
    rx: Receiver<SourceTask>,
    source_tx: Sender<SourceTask>,
    download_tx: Sender<MediaTask>,
    ctx: Arc<WorkerContext>,
    running: Arc<AtomicBool>,
    sources_hash: Arc<AtomicU64>,
    recv_timeout: Duration,
    refresh_floor_ms: u64,
) {
    while running.load(Ordering::SeqCst) {
        let task = match rx.recv_timeout(recv_timeout) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if stale(task.sources_hash, &sources_hash) {
            ctx.metrics.record_stale_epoch_drop("playlist");
            continue;
        }

        let Some(base_url) = ctx.url_pool.get(task.source_url_hash) else {
            continue;
        };

        let body = match ctx.http.get_string(&base_url) {
            Ok(body) => {
                ctx.metrics.record_playlist_fetch(true);
                body
            }
            Err(e) => {
                ctx.metrics.record_playlist_fetch(false);
                tracing::warn!(source = task.source_index, error = %e, "playlist fetch failed");
                continue;
            }
        };

        let parsed = match ctx.playlist_parser.parse(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(source = task.source_index, error = %e, "playlist parse failed");
                continue;
            }
        };

        let (media_sequence, segments) = match parsed {
            ParsedPlaylist::Master => {
                tracing::warn!(source = task.source_index, "master playlists are unsupported, dropping");
                continue;
            }
            ParsedPlaylist::Media { media_sequence, segments } => (media_sequence, segments),
        };

        let Ok(base) = url::Url::parse(&base_url) else { continue };
        let refresh_interval_ms = segments.first().map(|s| (s.duration * 1000.0) as u32).unwrap_or(1000);

        for (i, segment) in segments.iter().enumerate() {
            let Ok(absolute) = base.join(&segment.uri) else { continue };
            let Some(url_hash) = ctx.url_pool.insert(absolute.as_str()) else { continue };
            let segment_id = media_sequence as u32 + i as u32;

            if !ctx.rings.reserve(task.source_index, segment_id) {
                continue;
            }

            let media_task = MediaTask {
                segment_id,
                source_index: task.source_index,
                duration: segment.duration,
                refresh_interval_ms,
                url_hash,
                sources_hash: task.sources_hash,
            };
            if download_tx.send(media_task).is_err() {
                break;
            }
        }

        // The playlist must be refetched periodically to pick up newly
        // published segments; re-enqueue this source's task after the
        // playlist's own target duration (floored so a short playlist can't
        // busy-poll). The requeued task still carries the epoch it was
        // issued under, so a stale rotation is dropped by the usual
        // `stale()` check the next time it's dequeued, the same as any
        // other in-flight task.
        let refresh_ms = (refresh_interval_ms as u64).max(refresh_floor_ms);
        let requeue_tx = source_tx.clone();
        let requeue_running = running.clone();
        let requeue_task = SourceTask {
            source_index: task.source_index,
            sources_hash: task.sources_hash,
            source_url_hash: task.source_url_hash,
        };
        std::thread::Builder::new()
            .name(format!("playlist-refresh-{}", task.source_index))
            .spawn(move || {
                std::thread::sleep(Duration::from_millis(refresh_ms));
                if requeue_running.load(Ordering::SeqCst) {
                    let _ = requeue_tx.send(requeue_task);
                }
            })
            .expect("failed to spawn playlist refresh timer");
    }
}

fn download_worker_loop(
    rx: Receiver<MediaTask>,
    demux_tx: Sender<DemuxTask>,
    ctx: Arc<WorkerContext>,
    running: Arc<AtomicBool>,
    sources_hash: Arc<AtomicU64>,
    recv_timeout: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let task = match rx.recv_timeout(recv_timeout) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if stale(task.sources_hash, &sources_hash) {
            ctx.metrics.record_stale_epoch_drop("download");
            continue;
        }

        let bytes = if let Some(cached) = ctx.media_cache.query(task.url_hash) {
            ctx.metrics.record_cache_hit();
            cached
        } else {
            ctx.metrics.record_cache_miss();
            let Some(url) = ctx.url_pool.get(task.url_hash) else { continue };
            match ctx.http.get_bytes(&url) {
                Ok(bytes) => {
                    ctx.metrics.record_segment_download();
                    ctx.media_cache.insert(task.url_hash, bytes.clone());
                    bytes
                }
                Err(e) => {
                    tracing::warn!(source = task.source_index, segment = task.segment_id, error = %e, "segment download failed");
                    continue;
                }
            }
        };

        let demux_task = DemuxTask {
            segment_id: task.segment_id,
            source_index: task.source_index,
            duration: task.duration,
            data: bytes,
            sources_hash: task.sources_hash,
        };
        if demux_tx.send(demux_task).is_err() {
            break;
        }
    }
}

fn demux_worker_loop(
    rx: Receiver<DemuxTask>,
    ready_tx: Sender<ReadyPayload>,
    ctx: Arc<WorkerContext>,
    running: Arc<AtomicBool>,
    sources_hash: Arc<AtomicU64>,
    recv_timeout: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let task = match rx.recv_timeout(recv_timeout) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if stale(task.sources_hash, &sources_hash) {
            ctx.metrics.record_stale_epoch_drop("demux");
            continue;
        }

        let demuxed = match ctx.demuxer.demux(&task.data) {
            Ok(demuxed) => demuxed,
            Err(e) => {
                tracing::warn!(source = task.source_index, segment = task.segment_id, error = %e, "demux failed");
                continue;
            }
        };

        ctx.metrics.record_demux();

        // NAL boundary discovery and SPS/PPS tracking happen once the
        // playback context owns these bytes, not here - the demux stage's
        // job ends at producing elementary streams.
        let payload = ReadyPayload {
            segment_id: task.segment_id,
            source_index: task.source_index,
            duration: task.duration,
            payload: Some(SegmentPayload { video: demuxed.video, audio: demuxed.audio }),
            sources_hash: task.sources_hash,
        };
        if ready_tx.send(payload).is_err() {
            break;
        }
    }
}

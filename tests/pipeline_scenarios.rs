//! End-to-end scenarios exercising the worker pool and segment ring
//! together, with a fake HTTP client and the stand-in demuxer's
//! no-sync-byte-found path standing in for a real transport stream (these
//! scenarios never inspect decoded media content, only pipeline state).

use std::sync::Arc;
use std::time::{Duration, Instant};

use hls_pipeline::config::PipelineConfig;
use hls_pipeline::external::demux::MpegTsDemuxer;
use hls_pipeline::external::http_client::fake::FakeHttpClient;
use hls_pipeline::external::m3u8::M3u8Parser;
use hls_pipeline::media_cache::RawMediaCache;
use hls_pipeline::metrics::Metrics;
use hls_pipeline::segment_ring::SegmentRingStore;
use hls_pipeline::url_pool::UrlInternPool;
use hls_pipeline::worker_pool::tasks::{ReadyPayload, SourceTask};
use hls_pipeline::worker_pool::{WorkerContext, WorkerPool};

const PLAYLIST_URL: &str = "http://h/m.m3u8";
const FAKE_SEGMENT_BYTES: usize = 188 * 3;

fn media_playlist() -> String {
    "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:4\n\
#EXT-X-MEDIA-SEQUENCE:100\n\
#EXTINF:4.0,\n\
s0.ts\n\
#EXTINF:4.0,\n\
s1.ts\n\
#EXTINF:4.0,\n\
s2.ts\n"
        .to_string()
}

struct Harness {
    url_pool: Arc<UrlInternPool>,
    rings: Arc<SegmentRingStore>,
    ctx: Arc<WorkerContext>,
    pool: WorkerPool,
}

fn build_harness() -> Harness {
    let http = FakeHttpClient::new();
    http.set_string(PLAYLIST_URL, media_playlist());
    for seg in ["s0.ts", "s1.ts", "s2.ts"] {
        let url = format!("http://h/{seg}");
        http.set_bytes(url, vec![0u8; FAKE_SEGMENT_BYTES]);
    }

    let url_pool = Arc::new(UrlInternPool::new());
    let rings = Arc::new(SegmentRingStore::new(1));
    let ctx = Arc::new(WorkerContext {
        url_pool: url_pool.clone(),
        media_cache: Arc::new(RawMediaCache::new()),
        rings: rings.clone(),
        http: Arc::new(http),
        playlist_parser: Arc::new(M3u8Parser),
        demuxer: Arc::new(MpegTsDemuxer),
        metrics: Arc::new(Metrics::new()),
    });
    let pool = WorkerPool::start(&PipelineConfig::default(), ctx.clone());
    Harness { url_pool, rings, ctx, pool }
}

fn drain_ready_until(pool: &WorkerPool, want: usize, timeout: Duration) -> Vec<ReadyPayload> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while out.len() < want && Instant::now() < deadline {
        out.extend(pool.try_recv_ready());
        if out.len() < want {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
    out
}

/// Scenario E1 — single-source happy path.
#[test]
fn single_source_happy_path_reserves_and_readies_three_segments() {
    let harness = build_harness();
    let sources_hash = 1;
    harness.pool.set_sources_hash(sources_hash);

    let source_url_hash = harness.url_pool.insert(PLAYLIST_URL).unwrap();
    harness.pool.enqueue_source_task(SourceTask {
        source_index: 0,
        sources_hash,
        source_url_hash,
    });

    let ready = drain_ready_until(&harness.pool, 3, Duration::from_secs(5));
    assert_eq!(ready.len(), 3, "expected three ready payloads for segments 100..103");

    let mut ids: Vec<u32> = ready.iter().map(|r| r.segment_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![100, 101, 102]);

    for r in ready {
        assert_eq!(r.sources_hash, sources_hash);
        let payload = r.payload.expect("demux produced a payload");
        assert!(harness.rings.commit(r.source_index, r.segment_id, payload, r.duration));
    }

    assert_eq!(harness.rings.find_next(0, 99), Some(100));
    let acquired = harness.rings.acquire(0, 100).expect("segment 100 should be ready");
    drop(acquired);
    assert_eq!(harness.rings.duration_of(0, 101), Some(4.0));

    harness.pool.shutdown();
}

/// Scenario E2 — cache hit suppresses re-download on a second run against
/// the same URLs.
#[test]
fn replaying_the_same_source_does_not_grow_the_media_cache() {
    let harness = build_harness();
    let sources_hash = 1;
    harness.pool.set_sources_hash(sources_hash);
    let source_url_hash = harness.url_pool.insert(PLAYLIST_URL).unwrap();

    harness.pool.enqueue_source_task(SourceTask {
        source_index: 0,
        sources_hash,
        source_url_hash,
    });
    let first_run = drain_ready_until(&harness.pool, 3, Duration::from_secs(5));
    assert_eq!(first_run.len(), 3);
    let cache_len_after_first_run = harness.ctx.media_cache.len();
    assert_eq!(cache_len_after_first_run, 3);

    harness.rings.clear();
    harness.pool.enqueue_source_task(SourceTask {
        source_index: 0,
        sources_hash,
        source_url_hash,
    });
    let second_run = drain_ready_until(&harness.pool, 3, Duration::from_secs(5));
    assert_eq!(second_run.len(), 3);
    assert_eq!(harness.ctx.media_cache.len(), cache_len_after_first_run, "second run must reuse cached bytes, not grow the cache");

    harness.pool.shutdown();
}

/// Scenario E3 — playlist rotation cancels stale work: a task stamped with
/// a hash the pool no longer considers live is dropped at the playlist
/// stage, never reaching the ready channel.
#[test]
fn stale_epoch_task_is_dropped_before_producing_a_ready_payload() {
    let harness = build_harness();
    let stale_hash = 1;
    let live_hash = 2;
    harness.pool.set_sources_hash(live_hash);

    let source_url_hash = harness.url_pool.insert(PLAYLIST_URL).unwrap();
    harness.pool.enqueue_source_task(SourceTask {
        source_index: 0,
        sources_hash: stale_hash,
        source_url_hash,
    });

    let ready = drain_ready_until(&harness.pool, 1, Duration::from_millis(500));
    assert!(ready.is_empty(), "a task carrying a stale sources_hash must never reach the ready channel");

    let exported = harness.ctx.metrics.export_prometheus();
    assert!(exported.contains("stale_epoch_drops_total{stage=\"playlist\"} 1"));

    harness.pool.shutdown();
}

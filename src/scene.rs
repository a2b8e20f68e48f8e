//! Scene Controller (C9).
//!
//! Owns one [`PlaybackContext`] per active source, drives the
//! `IDLE -> FETCHING -> STREAMING` per-source state machine, and is the sole
//! writer of `sources_hash`: every call to [`SceneController::set_sources`]
//! bumps the epoch, flushes in-flight worker-pool tasks, and reconfigures
//! the ring store's per-source watermarks. `tick` is meant to be called once
//! per scene frame from a single thread; nothing here is `Sync`.

use std::sync::Arc;
use std::time::Duration;

use crate::external::audio::NullAudioPlayer;
use crate::external::bitstream::H264ParserAdapter;
use crate::external::gpu::NullVideoDecoder;
use crate::limits::MAX_SOURCES;
use crate::playback::PlaybackContext;
use crate::segment_ring::SegmentRingStore;
use crate::url_pool::UrlInternPool;
use crate::worker_pool::tasks::SourceTask;
use crate::worker_pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Idle,
    Fetching,
    Streaming,
}

struct SourceSlot {
    url: String,
    url_hash: u32,
    state: SourceState,
    playback: PlaybackContext<H264ParserAdapter, NullVideoDecoder, NullAudioPlayer>,
}

impl SourceSlot {
    fn new(url: String, url_hash: u32) -> Self {
        Self {
            url,
            url_hash,
            state: SourceState::Idle,
            playback: PlaybackContext::new(H264ParserAdapter, NullVideoDecoder::default(), NullAudioPlayer::default()),
        }
    }
}

pub struct SceneController {
    sources: Vec<SourceSlot>,
    url_pool: Arc<UrlInternPool>,
    rings: Arc<SegmentRingStore>,
    worker_pool: WorkerPool,
    sources_hash: u64,
    epoch_id: String,
}

impl SceneController {
    pub fn new(url_pool: Arc<UrlInternPool>, rings: Arc<SegmentRingStore>, worker_pool: WorkerPool) -> Self {
        Self {
            sources: Vec::new(),
            url_pool,
            rings,
            worker_pool,
            sources_hash: 0,
            epoch_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_streaming(&self, index: usize) -> bool {
        self.sources.get(index).is_some_and(|s| s.state == SourceState::Streaming)
    }

    /// Replaces the live source list (at most [`MAX_SOURCES`]). Any source
    /// whose URL is unchanged keeps its playback context and ring contents;
    /// everything else is torn down: the ring is flushed, the worker pool's
    /// epoch is bumped so in-flight tasks for the old list are dropped at
    /// their next stage boundary, and playback starts over from IDLE.
    pub fn set_sources(&mut self, urls: Vec<String>) {
        let urls: Vec<String> = urls.into_iter().take(MAX_SOURCES).collect();
        let unchanged = urls.len() == self.sources.len() && urls.iter().zip(&self.sources).all(|(u, s)| u == &s.url);
        if unchanged {
            return;
        }

        self.sources_hash = compute_sources_hash(&urls);
        self.epoch_id = uuid::Uuid::new_v4().to_string();
        self.worker_pool.set_sources_hash(self.sources_hash);
        self.worker_pool.flush();
        self.rings.clear();

        tracing::info!(epoch_id = %self.epoch_id, source_count = urls.len(), "source list replaced");

        self.sources = urls
            .into_iter()
            .map(|url| {
                let url_hash = self.url_pool.insert(&url).unwrap_or(0);
                SourceSlot::new(url, url_hash)
            })
            .collect();
    }

    /// Runs one scene frame: drains the ready channel into the ring store,
    /// advances each source's state machine, and ticks active playback
    /// contexts for up to `frame_budget` of decode work each.
    pub fn tick(&mut self, now_sec: f32, frame_budget: Duration) {
        for ready in self.worker_pool.try_recv_ready() {
            if ready.sources_hash != self.sources_hash {
                continue;
            }
            if let Some(payload) = ready.payload {
                self.rings.commit(ready.source_index, ready.segment_id, payload, ready.duration);
            }
        }

        for index in 0..self.sources.len() {
            self.step_source(index, now_sec, frame_budget);
        }
    }

    fn step_source(&mut self, index: usize, now_sec: f32, frame_budget: Duration) {
        match self.sources[index].state {
            SourceState::Idle => {
                self.worker_pool.enqueue_source_task(SourceTask {
                    source_index: index,
                    sources_hash: self.sources_hash,
                    source_url_hash: self.sources[index].url_hash,
                });
                self.sources[index].state = SourceState::Fetching;
            }
            SourceState::Fetching => {
                let Some(segment_id) = self.first_ready_segment(index) else { return };
                let Some(payload) = self.rings.acquire(index, segment_id) else { return };
                let slot = &mut self.sources[index];
                match slot.playback.init_with_first_segment(segment_id, &payload.video, &payload.audio, now_sec) {
                    Ok(()) => slot.state = SourceState::Streaming,
                    Err(e) => {
                        tracing::warn!(source = index, segment = segment_id, error = %e, "playback init failed, will retry on next ready segment");
                    }
                }
            }
            SourceState::Streaming => {
                let slot = &mut self.sources[index];
                let current = slot.playback.current_segment();
                if let Some(next_segment) = self.rings.find_next(index, current) {
                    if let Some(payload) = self.rings.acquire(index, next_segment) {
                        slot.playback.add_segment(next_segment, &payload.video, &payload.audio);
                    }
                }
                if let Err(e) = slot.playback.update(now_sec, frame_budget) {
                    tracing::warn!(source = index, error = %e, "playback update failed");
                }
            }
        }
    }

    /// The smallest ready/playing segment id for a source that hasn't pulled
    /// its first segment yet. `find_next` is exclusive of its `current`
    /// argument, so segment id `0` (an in-practice-unused HLS media sequence
    /// number) needs the explicit `has_segment` check here.
    fn first_ready_segment(&self, index: usize) -> Option<u32> {
        if self.rings.has_segment(index, 0) {
            return Some(0);
        }
        self.rings.find_next(index, 0)
    }

    /// A read-only view of per-source state for the observability server.
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            sources: self
                .sources
                .iter()
                .map(|s| SourceSnapshot {
                    url: s.url.clone(),
                    state: match s.state {
                        SourceState::Idle => "idle",
                        SourceState::Fetching => "fetching",
                        SourceState::Streaming => "streaming",
                    },
                    current_segment: s.playback.current_segment(),
                    decoded_frames_in_flight: s.playback.decoded_frames_in_flight(),
                    queued_audio_bytes: s.playback.queued_audio_bytes(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SourceSnapshot {
    pub url: String,
    pub state: &'static str,
    pub current_segment: u32,
    pub decoded_frames_in_flight: usize,
    pub queued_audio_bytes: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SceneSnapshot {
    pub sources: Vec<SourceSnapshot>,
}

fn compute_sources_hash(urls: &[String]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for url in urls {
        for &b in url.as_bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(PRIME);
        }
        hash ^= 0xff;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::external::demux::MpegTsDemuxer;
    use crate::external::http_client::fake::FakeHttpClient;
    use crate::external::m3u8::M3u8Parser;
    use crate::media_cache::RawMediaCache;
    use crate::metrics::Metrics;
    use crate::worker_pool::WorkerContext;

    fn controller_with(source_count: usize) -> SceneController {
        let url_pool = Arc::new(UrlInternPool::new());
        let rings = Arc::new(SegmentRingStore::new(source_count.max(1)));
        let ctx = Arc::new(WorkerContext {
            url_pool: url_pool.clone(),
            media_cache: Arc::new(RawMediaCache::new()),
            rings: rings.clone(),
            http: Arc::new(FakeHttpClient::new()),
            playlist_parser: Arc::new(M3u8Parser),
            demuxer: Arc::new(MpegTsDemuxer),
            metrics: Arc::new(Metrics::new()),
        });
        let pool = WorkerPool::start(&PipelineConfig::default(), ctx);
        SceneController::new(url_pool, rings, pool)
    }

    #[test]
    fn compute_sources_hash_is_order_sensitive() {
        let a = compute_sources_hash(&["http://a".to_string(), "http://b".to_string()]);
        let b = compute_sources_hash(&["http://b".to_string(), "http://a".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn set_sources_is_a_noop_when_unchanged() {
        let mut scene = controller_with(1);
        scene.set_sources(vec!["http://example.com/a.m3u8".to_string()]);
        let hash_before = scene.sources_hash;
        scene.set_sources(vec!["http://example.com/a.m3u8".to_string()]);
        assert_eq!(scene.sources_hash, hash_before);
    }

    #[test]
    fn set_sources_starts_every_source_idle() {
        let mut scene = controller_with(2);
        scene.set_sources(vec!["http://example.com/a.m3u8".to_string(), "http://example.com/b.m3u8".to_string()]);
        assert_eq!(scene.source_count(), 2);
        assert!(!scene.is_streaming(0));
        assert!(!scene.is_streaming(1));
    }

    #[test]
    fn tick_advances_idle_source_to_fetching() {
        let mut scene = controller_with(1);
        scene.set_sources(vec!["http://example.com/a.m3u8".to_string()]);
        scene.tick(0.0, Duration::from_millis(16));
        assert_eq!(scene.sources[0].state, SourceState::Fetching);
    }
}

//! Prometheus-compatible metrics for the pipeline (§4.11).
//!
//! Counters here are the ones the worker pool and scene controller can
//! cheaply update from any thread: task throughput per stage, cancellation
//! drops, cache hit ratio, and reservation-race outcomes. None of this
//! drives pipeline decisions — it is read-only observability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct Metrics {
    start_time: Option<Instant>,
    playlist_fetches: AtomicU64,
    playlist_fetch_errors: AtomicU64,
    segment_downloads: AtomicU64,
    segment_cache_hits: AtomicU64,
    segment_cache_misses: AtomicU64,
    segments_demuxed: AtomicU64,
    segments_committed: AtomicU64,
    commits_lost_to_race: AtomicU64,
    tasks_dropped_stale_epoch: RwLock<HashMap<&'static str, u64>>,
    active_sources: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_playlist_fetch(&self, ok: bool) {
        self.playlist_fetches.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.playlist_fetch_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_segment_download(&self) {
        self.segment_downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.segment_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.segment_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_demux(&self) {
        self.segments_demuxed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self, committed: bool) {
        if committed {
            self.segments_committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.commits_lost_to_race.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stale_epoch_drop(&self, stage: &'static str) {
        *self.tasks_dropped_stale_epoch.write().entry(stage).or_insert(0) += 1;
    }

    pub fn set_active_sources(&self, count: u64) {
        self.active_sources.store(count, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP hls_pipeline_uptime_seconds Process uptime in seconds\n");
        out.push_str("# TYPE hls_pipeline_uptime_seconds counter\n");
        out.push_str(&format!("hls_pipeline_uptime_seconds {}\n", self.uptime_secs()));

        out.push_str("\n# HELP hls_pipeline_start_time_seconds Process start time, Unix epoch\n");
        out.push_str("# TYPE hls_pipeline_start_time_seconds gauge\n");
        let start_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            .saturating_sub(self.uptime_secs());
        out.push_str(&format!("hls_pipeline_start_time_seconds {start_epoch}\n"));

        out.push_str("\n# HELP hls_pipeline_playlist_fetches_total Playlist fetch attempts\n");
        out.push_str("# TYPE hls_pipeline_playlist_fetches_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_playlist_fetches_total {}\n",
            self.playlist_fetches.load(Ordering::Relaxed)
        ));

        out.push_str("\n# HELP hls_pipeline_playlist_fetch_errors_total Playlist fetch failures\n");
        out.push_str("# TYPE hls_pipeline_playlist_fetch_errors_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_playlist_fetch_errors_total {}\n",
            self.playlist_fetch_errors.load(Ordering::Relaxed)
        ));

        out.push_str("\n# HELP hls_pipeline_segment_downloads_total Segment downloads performed\n");
        out.push_str("# TYPE hls_pipeline_segment_downloads_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_segment_downloads_total {}\n",
            self.segment_downloads.load(Ordering::Relaxed)
        ));

        let hits = self.segment_cache_hits.load(Ordering::Relaxed);
        let misses = self.segment_cache_misses.load(Ordering::Relaxed);
        out.push_str("\n# HELP hls_pipeline_segment_cache_hit_ratio Raw media cache hit ratio\n");
        out.push_str("# TYPE hls_pipeline_segment_cache_hit_ratio gauge\n");
        let ratio = if hits + misses > 0 { hits as f64 / (hits + misses) as f64 } else { 0.0 };
        out.push_str(&format!("hls_pipeline_segment_cache_hit_ratio {ratio:.4}\n"));

        out.push_str("\n# HELP hls_pipeline_segments_demuxed_total Segments demuxed\n");
        out.push_str("# TYPE hls_pipeline_segments_demuxed_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_segments_demuxed_total {}\n",
            self.segments_demuxed.load(Ordering::Relaxed)
        ));

        out.push_str("\n# HELP hls_pipeline_segments_committed_total Segment ring commits that succeeded\n");
        out.push_str("# TYPE hls_pipeline_segments_committed_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_segments_committed_total {}\n",
            self.segments_committed.load(Ordering::Relaxed)
        ));

        out.push_str("\n# HELP hls_pipeline_commits_lost_to_race_total Commits discarded due to a raced advance\n");
        out.push_str("# TYPE hls_pipeline_commits_lost_to_race_total counter\n");
        out.push_str(&format!(
            "hls_pipeline_commits_lost_to_race_total {}\n",
            self.commits_lost_to_race.load(Ordering::Relaxed)
        ));

        out.push_str("\n# HELP hls_pipeline_stale_epoch_drops_total Tasks dropped for carrying a stale sources_hash\n");
        out.push_str("# TYPE hls_pipeline_stale_epoch_drops_total counter\n");
        for (stage, count) in self.tasks_dropped_stale_epoch.read().iter() {
            out.push_str(&format!("hls_pipeline_stale_epoch_drops_total{{stage=\"{stage}\"}} {count}\n"));
        }

        out.push_str("\n# HELP hls_pipeline_active_sources Number of currently active sources\n");
        out.push_str("# TYPE hls_pipeline_active_sources gauge\n");
        out.push_str(&format!("hls_pipeline_active_sources {}\n", self.active_sources.load(Ordering::Relaxed)));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_contains_counters_after_recording() {
        let metrics = Metrics::new();
        metrics.record_playlist_fetch(true);
        metrics.record_playlist_fetch(false);
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_commit(true);
        metrics.record_commit(false);
        metrics.record_stale_epoch_drop("download");

        let out = metrics.export_prometheus();
        assert!(out.contains("hls_pipeline_playlist_fetches_total 2"));
        assert!(out.contains("hls_pipeline_playlist_fetch_errors_total 1"));
        assert!(out.contains("hls_pipeline_segments_committed_total 1"));
        assert!(out.contains("hls_pipeline_commits_lost_to_race_total 1"));
        assert!(out.contains("stage=\"download\"} 1"));
    }

    #[test]
    fn hit_ratio_is_zero_with_no_samples() {
        let metrics = Metrics::new();
        assert!(metrics.export_prometheus().contains("hls_pipeline_segment_cache_hit_ratio 0.0000"));
    }
}

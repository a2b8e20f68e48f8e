//! Task/payload types carried on C6's four channels (§4.6).
//!
//! Every task carries `sources_hash`, the epoch token the scene controller
//! bumps on every source-list edit. Workers compare it against the live
//! value before doing work; stale tasks are dropped (not processed, not
//! retried) at dequeue.

use bytes::Bytes;

use crate::segment_ring::SegmentPayload;

#[derive(Debug, Clone)]
pub struct SourceTask {
    pub source_index: usize,
    pub sources_hash: u64,
    pub source_url_hash: u32,
}

#[derive(Debug, Clone)]
pub struct MediaTask {
    pub segment_id: u32,
    pub source_index: usize,
    pub duration: f32,
    pub refresh_interval_ms: u32,
    pub url_hash: u32,
    pub sources_hash: u64,
}

#[derive(Debug, Clone)]
pub struct DemuxTask {
    pub segment_id: u32,
    pub source_index: usize,
    pub duration: f32,
    pub data: Bytes,
    pub sources_hash: u64,
}

/// Not `Clone`: `payload` is a unique, non-duplicable ownership handoff from
/// the demux worker to the scene controller, which commits it into the ring
/// (or discards it) once it has re-checked the hash against its own epoch.
#[derive(Debug)]
pub struct ReadyPayload {
    pub segment_id: u32,
    pub source_index: usize,
    pub duration: f32,
    pub payload: Option<SegmentPayload>,
    pub sources_hash: u64,
}

//! Fixed capacities for the bounded stores.
//!
//! These mirror the constants baked into the original implementation. They
//! are exposed as `const`s (not config) because the ring-index arithmetic
//! (`segment_id % SEGMENT_RING_SIZE`) and the fixed-size slot arrays in
//! [`crate::segment_ring`] and [`crate::decoder_pool`] are sized against them
//! at compile time; [`crate::config::PipelineConfig`] carries the *runtime*
//! knobs (worker counts, timeouts) that are safe to vary.

/// URL intern pool capacity (C1).
pub const URL_POOL_CAPACITY: usize = 256;
/// Maximum URL length accepted by the intern pool, in bytes.
pub const URL_MAX_LENGTH: usize = 1024;

/// Raw media cache entry count (C2).
pub const MEDIA_CACHE_SIZE: usize = 16;

/// Segment slots per source ring (C3).
pub const SEGMENT_RING_SIZE: usize = 8;
/// Maximum number of concurrently active sources.
pub const MAX_SOURCES: usize = 4;

/// Decoder slots per playback context (C8).
pub const DECODER_SLOTS: usize = 8;

/// SPS table size referenced by the H.264 chunk loader (C5).
pub const MAX_SPS: usize = 32;
/// PPS table size referenced by the H.264 chunk loader (C5).
pub const MAX_PPS: usize = 256;

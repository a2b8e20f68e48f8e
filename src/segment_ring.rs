//! Segment Ring Store (C3).
//!
//! Per-source bounded ring of slots implementing the
//! `EMPTY -> RESERVED -> READY -> PLAYING -> EMPTY` ownership handoff that
//! chains the playlist, download, demux and playback stages together. One
//! [`parking_lot::Mutex`] per source ring, so traffic for different sources
//! never contends.

use bytes::Bytes;
use parking_lot::Mutex;

use crate::limits::{MAX_SOURCES, SEGMENT_RING_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Reserved,
    Ready,
    Playing,
}

/// The demuxed elementary streams for one segment, handed from the demux
/// worker to whichever playback context acquires the slot. NAL/chunk parsing
/// happens in the playback context, not here — a ring slot is just storage.
#[derive(Debug, Clone, Default)]
pub struct SegmentPayload {
    pub video: Bytes,
    pub audio: Bytes,
}

struct Slot {
    segment_id: u32,
    duration_sec: f32,
    state: SlotState,
    payload: Option<SegmentPayload>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            segment_id: 0,
            duration_sec: 0.0,
            state: SlotState::Empty,
            payload: None,
        }
    }

    fn reset(&mut self) {
        *self = Slot::empty();
    }
}

struct Ring {
    slots: Vec<Slot>,
    min_segment_id: u32,
}

impl Ring {
    fn new() -> Self {
        Self {
            slots: (0..SEGMENT_RING_SIZE).map(|_| Slot::empty()).collect(),
            min_segment_id: 0,
        }
    }
}

/// Bounded per-source segment rings, each guarded independently.
pub struct SegmentRingStore {
    rings: Vec<Mutex<Ring>>,
}

impl SegmentRingStore {
    /// Create a store for `source_count` sources (`<= MAX_SOURCES`).
    pub fn new(source_count: usize) -> Self {
        assert!(source_count <= MAX_SOURCES);
        Self {
            rings: (0..source_count).map(|_| Mutex::new(Ring::new())).collect(),
        }
    }

    fn ring(&self, source: usize) -> &Mutex<Ring> {
        &self.rings[source]
    }

    /// `EMPTY -> RESERVED`. Fails if `segment_id` is below the watermark, or
    /// if the resident slot holds a *different* segment id (caller must
    /// `advance` first). Re-reserving the resident id is an idempotent no-op
    /// that returns `false`.
    pub fn reserve(&self, source: usize, segment_id: u32) -> bool {
        let mut ring = self.ring(source).lock();
        if segment_id < ring.min_segment_id {
            return false;
        }

        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        if ring.slots[idx].state != SlotState::Empty {
            // Resident slot holds either this same id (idempotent no-op) or
            // a different one (caller must `advance` first) - both false.
            return false;
        }

        ring.slots[idx] = Slot {
            segment_id,
            duration_sec: 0.0,
            state: SlotState::Reserved,
            payload: None,
        };
        true
    }

    /// `RESERVED -> READY`. On a race loss (mismatched id or state), the
    /// supplied payload is dropped here and `false` is returned.
    pub fn commit(&self, source: usize, segment_id: u32, payload: SegmentPayload, duration_sec: f32) -> bool {
        let mut ring = self.ring(source).lock();
        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        let slot = &mut ring.slots[idx];

        if slot.segment_id != segment_id || slot.state != SlotState::Reserved {
            drop(payload);
            return false;
        }

        slot.duration_sec = duration_sec;
        slot.payload = Some(payload);
        slot.state = SlotState::Ready;
        true
    }

    /// `READY -> PLAYING`. Returns the slot's payload, leaving it owned by
    /// the caller; returns `None` without changing state on a mismatch.
    pub fn acquire(&self, source: usize, segment_id: u32) -> Option<SegmentPayload> {
        let mut ring = self.ring(source).lock();
        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        let slot = &mut ring.slots[idx];

        if slot.segment_id != segment_id || slot.state != SlotState::Ready {
            return None;
        }

        slot.state = SlotState::Playing;
        slot.payload.take()
    }

    /// Any state `-> EMPTY`, dropping the held video if any.
    pub fn release(&self, source: usize, segment_id: u32) {
        let mut ring = self.ring(source).lock();
        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        if ring.slots[idx].segment_id == segment_id {
            ring.slots[idx].reset();
        }
    }

    /// Purge every slot (of any state) holding `segment_id < new_min`; raise
    /// the ring's watermark to `new_min`. No-op if `new_min <= watermark`.
    pub fn advance(&self, source: usize, new_min: u32) {
        let mut ring = self.ring(source).lock();
        if new_min <= ring.min_segment_id {
            return;
        }
        for slot in ring.slots.iter_mut() {
            if slot.state != SlotState::Empty && slot.segment_id < new_min {
                slot.reset();
            }
        }
        ring.min_segment_id = new_min;
    }

    /// True iff the ring holds `segment_id` in `READY` or `PLAYING`.
    pub fn has_segment(&self, source: usize, segment_id: u32) -> bool {
        let ring = self.ring(source).lock();
        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        let slot = &ring.slots[idx];
        slot.segment_id == segment_id
            && matches!(slot.state, SlotState::Ready | SlotState::Playing)
    }

    /// Smallest `id > current` among `READY`/`PLAYING` slots, if any.
    pub fn find_next(&self, source: usize, current: u32) -> Option<u32> {
        let ring = self.ring(source).lock();
        ring.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Ready | SlotState::Playing) && s.segment_id > current)
            .map(|s| s.segment_id)
            .min()
    }

    /// Duration recorded for `segment_id`, if it is resident (any state).
    pub fn duration_of(&self, source: usize, segment_id: u32) -> Option<f32> {
        let ring = self.ring(source).lock();
        let idx = (segment_id as usize) % SEGMENT_RING_SIZE;
        let slot = &ring.slots[idx];
        (slot.segment_id == segment_id).then_some(slot.duration_sec)
    }

    /// 8-bit-per-source active mask: bit `j+1` of source `i` is set iff ring
    /// `i` holds a `READY`/`PLAYING` slot at `current_ids[i] + j`.
    pub fn active_mask(&self, current_ids: &[u32]) -> u32 {
        let mut result: u32 = 0;
        for (i, &current) in current_ids.iter().enumerate().take(self.rings.len()) {
            let ring = self.ring(i).lock();
            let mut byte: u8 = 0;
            for j in 0..8u32 {
                let check_id = current + j;
                let idx = (check_id as usize) % SEGMENT_RING_SIZE;
                let slot = &ring.slots[idx];
                if slot.segment_id == check_id && matches!(slot.state, SlotState::Ready | SlotState::Playing) {
                    byte |= 1 << (j + 1);
                }
            }
            result |= (byte as u32) << (i * 8);
        }
        result
    }

    /// Reset every ring to its freshly-initialized state.
    pub fn clear(&self) {
        for ring in &self.rings {
            let mut ring = ring.lock();
            for slot in ring.slots.iter_mut() {
                slot.reset();
            }
            ring.min_segment_id = 0;
        }
    }

    pub fn source_count(&self) -> usize {
        self.rings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SegmentPayload {
        SegmentPayload {
            video: Bytes::from_static(b"video"),
            audio: Bytes::from_static(b"audio"),
        }
    }

    #[test]
    fn reserve_commit_acquire_release_cycle() {
        let store = SegmentRingStore::new(1);
        assert!(store.reserve(0, 5));
        assert!(store.commit(0, 5, payload(), 4.0));
        assert!(store.has_segment(0, 5));
        assert!(store.acquire(0, 5).is_some());
        store.release(0, 5);
        assert!(!store.has_segment(0, 5));
    }

    #[test]
    fn reserving_resident_id_twice_is_idempotent_noop() {
        let store = SegmentRingStore::new(1);
        assert!(store.reserve(0, 5));
        assert!(!store.reserve(0, 5));
    }

    #[test]
    fn reserve_below_watermark_fails() {
        let store = SegmentRingStore::new(1);
        store.advance(0, 10);
        assert!(!store.reserve(0, 3));
    }

    #[test]
    fn commit_on_race_loss_drops_video_and_returns_false() {
        let store = SegmentRingStore::new(1);
        store.reserve(0, 5);
        store.advance(0, 6); // reclaims slot 5 before the commit lands
        assert!(!store.commit(0, 5, payload(), 4.0));
    }

    #[test]
    fn acquire_on_mismatch_returns_none_without_state_change() {
        let store = SegmentRingStore::new(1);
        assert!(store.acquire(0, 5).is_none());
        assert!(!store.has_segment(0, 5));
    }

    #[test]
    fn advance_purges_slots_below_new_min_any_state() {
        let store = SegmentRingStore::new(1);
        store.reserve(0, 1);
        store.commit(0, 1, payload(), 4.0);
        store.acquire(0, 1); // now PLAYING
        store.advance(0, 2);
        assert!(!store.has_segment(0, 1));
        assert!(store.reserve(0, 1));
    }

    #[test]
    fn advance_with_smaller_new_min_is_noop() {
        let store = SegmentRingStore::new(1);
        store.advance(0, 10);
        store.advance(0, 5);
        assert!(!store.reserve(0, 5));
        assert!(store.reserve(0, 10));
    }

    #[test]
    fn ring_wraparound_after_advance() {
        let store = SegmentRingStore::new(1);
        assert!(store.reserve(0, 0));
        assert!(!store.reserve(0, 8)); // collides with resident id 0
        store.advance(0, 1);
        assert!(store.reserve(0, 8));
    }

    #[test]
    fn find_next_returns_smallest_ready_above_current() {
        let store = SegmentRingStore::new(1);
        store.reserve(0, 100);
        store.commit(0, 100, payload(), 4.0);
        store.reserve(0, 101);
        store.commit(0, 101, payload(), 4.0);
        assert_eq!(store.find_next(0, 99), Some(100));
        assert_eq!(store.find_next(0, 100), Some(101));
    }

    #[test]
    fn active_mask_reports_per_source_bits() {
        let store = SegmentRingStore::new(2);
        store.reserve(0, 10);
        store.commit(0, 10, payload(), 4.0);
        store.reserve(1, 20);
        store.commit(1, 20, payload(), 4.0);
        store.acquire(1, 20);

        let mask = store.active_mask(&[10, 20]);
        assert_eq!(mask & 0xFF, 0b0000_0010); // source 0, j=0 -> bit 1
        assert_eq!((mask >> 8) & 0xFF, 0b0000_0010); // source 1, j=0 -> bit 1
    }

    #[test]
    fn commit_requires_matching_reservation() {
        let store = SegmentRingStore::new(1);
        assert!(!store.commit(0, 5, payload(), 4.0)); // never reserved
    }

    #[test]
    fn committed_duration_matches_input() {
        let store = SegmentRingStore::new(1);
        store.reserve(0, 1);
        store.commit(0, 1, payload(), 6.006);
        assert_eq!(store.duration_of(0, 1), Some(6.006));
    }
}

//! H.264 chunk loader (C5).
//!
//! `H264Video` is the parsed-parameters-plus-chunk object that flows through
//! the segment ring (C3) and on into the playback context (C7). Parsing
//! itself — NAL boundary discovery, IDR-bounded chunk assembly, and SPS/PPS
//! field extraction — lives in [`loader`].

pub mod loader;

pub use loader::{ChunkLoadError, H264ChunkLoader};

use crate::external::bitstream::{PpsInfo, SpsInfo};

/// One NAL unit retained in an assembled chunk, in Annex-B form (including
/// its start code) so it can be handed straight to a decoder.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub nal_type: u8,
    pub bytes: Vec<u8>,
}

/// A contiguous run of NAL units between two IDR slices (or IDR→EOF).
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub nals: Vec<FrameInfo>,
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.nals.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.nals
            .iter()
            .filter(|n| matches!(n.nal_type, crate::external::bitstream::nal_type::SLICE_IDR | crate::external::bitstream::nal_type::SLICE_NON_IDR))
            .count()
    }
}

fn fnv1a_32_u32(value: u32) -> u32 {
    crate::url_pool::fnv1a_32(&value.to_le_bytes())
}

/// Parsed parameter-set state plus the most recently assembled chunk. Ring
/// slots (C3) and decoder submission (C7) both hold this by value, so it
/// must be cheap to clone; `Chunk` data is the only non-trivial payload and
/// it only exists transiently between `load_chunk` calls.
#[derive(Debug, Clone)]
pub struct H264Video {
    sps_table: [Option<SpsInfo>; crate::limits::MAX_SPS],
    pps_table: Vec<Option<PpsInfo>>,
    sps_dirty_hash: u32,
    pps_dirty_hash: u32,
    pub width: u32,
    pub height: u32,
    pub padded_width: u32,
    pub padded_height: u32,
    pub num_dpb_slots: u32,
    pub framerate: Option<f32>,
    pub frame_duration_sec: f32,
}

impl Default for H264Video {
    fn default() -> Self {
        Self::empty()
    }
}

impl H264Video {
    pub fn empty() -> Self {
        Self {
            sps_table: [None; crate::limits::MAX_SPS],
            pps_table: vec![None; crate::limits::MAX_PPS],
            sps_dirty_hash: 0,
            pps_dirty_hash: 0,
            width: 0,
            height: 0,
            padded_width: 0,
            padded_height: 0,
            num_dpb_slots: 0,
            framerate: None,
            frame_duration_sec: 0.0,
        }
    }

    pub fn has_sps(&self) -> bool {
        self.sps_table.iter().any(|s| s.is_some())
    }

    pub fn has_pps(&self) -> bool {
        self.pps_table.iter().any(|p| p.is_some())
    }

    fn sps_at(&self, id: u8) -> Option<SpsInfo> {
        self.sps_table.get(id as usize).copied().flatten()
    }

    /// Stores a parsed SPS, recomputes the dirty hash, and runs the
    /// dimension-derivation / no-change-after-first-set policy.
    fn observe_sps(&mut self, sps: SpsInfo) -> Result<bool, loader::ChunkLoadError> {
        let id = sps.id as usize;
        if id >= self.sps_table.len() {
            return Ok(false);
        }
        let changed = self.sps_table[id] != Some(sps);
        self.sps_table[id] = Some(sps);
        self.recompute_sps_hash();
        if changed {
            self.sps_updated(sps)?;
        }
        Ok(changed)
    }

    fn observe_pps(&mut self, pps: PpsInfo) -> bool {
        let id = pps.id as usize;
        if id >= self.pps_table.len() {
            return false;
        }
        let changed = self.pps_table[id] != Some(pps);
        self.pps_table[id] = Some(pps);
        self.recompute_pps_hash();
        changed
    }

    fn recompute_sps_hash(&mut self) {
        self.sps_dirty_hash = self
            .sps_table
            .iter()
            .flatten()
            .fold(0u32, |acc, sps| acc ^ fnv1a_32_u32(sps.width ^ (sps.height << 1) ^ sps.id as u32));
    }

    fn recompute_pps_hash(&mut self) {
        self.pps_dirty_hash = self
            .pps_table
            .iter()
            .flatten()
            .fold(0u32, |acc, pps| acc ^ fnv1a_32_u32((pps.id as u32) ^ ((pps.sps_id as u32) << 8)));
    }

    fn sps_updated(&mut self, sps: SpsInfo) -> Result<(), loader::ChunkLoadError> {
        let padded_width = sps.width.div_ceil(16) * 16;
        let padded_height = sps.height.div_ceil(16) * 16;
        let num_dpb_slots = (sps.max_num_ref_frames.max(1) + 1).min(crate::limits::DECODER_SLOTS as u32);

        let already_set = self.width != 0 && self.height != 0;
        if already_set && (self.width != sps.width || self.height != sps.height || self.padded_width != padded_width || self.num_dpb_slots != num_dpb_slots) {
            return Err(loader::ChunkLoadError::DimensionsChanged);
        }

        self.width = sps.width;
        self.height = sps.height;
        self.padded_width = padded_width;
        self.padded_height = padded_height;
        self.num_dpb_slots = num_dpb_slots;
        // No VUI timing available from the bitstream parser adapter; frame
        // pacing degrades to wall-clock timing downstream.
        self.framerate = None;
        self.frame_duration_sec = 0.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_video_has_no_parameter_sets() {
        let video = H264Video::empty();
        assert!(!video.has_sps());
        assert!(!video.has_pps());
        assert_eq!(video.width, 0);
    }

    #[test]
    fn observe_sps_derives_dimensions_once() {
        let mut video = H264Video::empty();
        let sps = SpsInfo { id: 0, profile_idc: 66, level_idc: 30, width: 1280, height: 720, max_num_ref_frames: 2 };
        video.observe_sps(sps).unwrap();
        assert_eq!(video.width, 1280);
        assert_eq!(video.height, 720);
        assert_eq!(video.padded_width, 1280);
        assert_eq!(video.padded_height, 720);
    }

    #[test]
    fn observe_sps_rejects_dimension_change() {
        let mut video = H264Video::empty();
        let sps = SpsInfo { id: 0, profile_idc: 66, level_idc: 30, width: 1280, height: 720, max_num_ref_frames: 2 };
        video.observe_sps(sps).unwrap();
        let changed = SpsInfo { width: 640, height: 360, ..sps };
        assert!(video.observe_sps(changed).is_err());
    }
}

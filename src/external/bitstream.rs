//! H.264 bitstream parser adapter (§6).
//!
//! The chunk loader (`crate::h264::loader`) owns NAL-boundary discovery and
//! the IDR/chunk state machine itself — that is core, in-scope logic. This
//! module is the external "H.264 parser" black box the spec names
//! (`parse_sps`, `parse_pps`, `parse_pps_parse_sps_id`): given one NAL's raw
//! RBSP bytes, extract the syntax elements the loader needs and nothing
//! more. There is no VUI timing parse here, so derived framerate is always
//! `None`; presentation falls back to wall-clock pacing per the design
//! note in `H264Video::sps_updated`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub id: u8,
    pub profile_idc: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
    pub max_num_ref_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpsInfo {
    pub id: u8,
    pub sps_id: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum BitstreamError {
    #[error("NAL unit too short to contain a header")]
    Truncated,
    #[error("unsupported profile_idc {0} (scaling matrices not implemented)")]
    UnsupportedProfile(u8),
}

/// NAL unit type values relevant to the chunk loader.
pub mod nal_type {
    pub const SLICE_NON_IDR: u8 = 1;
    pub const SLICE_IDR: u8 = 5;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
}

pub trait BitstreamParser: Send + Sync {
    /// `rbsp` is the NAL payload including its 1-byte header.
    fn parse_sps(&self, rbsp: &[u8]) -> Result<SpsInfo, BitstreamError>;
    fn parse_pps_sps_id(&self, rbsp: &[u8]) -> Result<u8, BitstreamError>;
    fn parse_pps(&self, rbsp: &[u8], sps: &SpsInfo) -> Result<PpsInfo, BitstreamError>;
}

impl BitstreamParser for std::sync::Arc<dyn BitstreamParser> {
    fn parse_sps(&self, rbsp: &[u8]) -> Result<SpsInfo, BitstreamError> {
        self.as_ref().parse_sps(rbsp)
    }

    fn parse_pps_sps_id(&self, rbsp: &[u8]) -> Result<u8, BitstreamError> {
        self.as_ref().parse_pps_sps_id(rbsp)
    }

    fn parse_pps(&self, rbsp: &[u8], sps: &SpsInfo) -> Result<PpsInfo, BitstreamError> {
        self.as_ref().parse_pps(rbsp, sps)
    }
}

/// Strips `00 00 03` emulation-prevention bytes from an Annex-B RBSP.
fn strip_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zero_run = 0u8;
    for &byte in data {
        if zero_run >= 2 && byte == 0x03 {
            zero_run = 0;
            continue;
        }
        out.push(byte);
        zero_run = if byte == 0 { zero_run + 1 } else { 0 };
    }
    out
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read_bit(&mut self) -> u32 {
        let byte_idx = self.bit_pos / 8;
        if byte_idx >= self.data.len() {
            return 0;
        }
        let shift = 7 - (self.bit_pos % 8);
        self.bit_pos += 1;
        ((self.data[byte_idx] >> shift) & 1) as u32
    }

    fn read_bits(&mut self, n: u32) -> u32 {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.read_bit();
        }
        v
    }

    fn read_ue(&mut self) -> u32 {
        let mut leading_zeros = 0u32;
        while self.read_bit() == 0 && leading_zeros < 32 {
            leading_zeros += 1;
        }
        if leading_zeros == 0 {
            return 0;
        }
        let suffix = self.read_bits(leading_zeros);
        (1u32 << leading_zeros) - 1 + suffix
    }

    fn read_se(&mut self) -> i32 {
        let code = self.read_ue();
        let magnitude = (code + 1) / 2;
        if code % 2 == 0 {
            -(magnitude as i32)
        } else {
            magnitude as i32
        }
    }
}

/// Profiles that carry the high-profile extension fields (chroma format,
/// bit depth, scaling matrices) in their SPS. We refuse to parse scaling
/// matrices (not needed for any derived quantity the loader tracks) and
/// report `UnsupportedProfile` if one is actually present.
const HIGH_PROFILES: &[u8] = &[100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

pub struct H264ParserAdapter;

impl BitstreamParser for H264ParserAdapter {
    fn parse_sps(&self, rbsp: &[u8]) -> Result<SpsInfo, BitstreamError> {
        if rbsp.len() < 2 {
            return Err(BitstreamError::Truncated);
        }
        let ebsp = strip_emulation_prevention(&rbsp[1..]);
        let mut r = BitReader::new(&ebsp);

        let profile_idc = r.read_bits(8) as u8;
        let _constraint_flags_and_reserved = r.read_bits(8);
        let level_idc = r.read_bits(8) as u8;
        let seq_parameter_set_id = r.read_ue();

        if HIGH_PROFILES.contains(&profile_idc) {
            let chroma_format_idc = r.read_ue();
            if chroma_format_idc == 3 {
                r.read_bit();
            }
            r.read_ue();
            r.read_ue();
            r.read_bit();
            let scaling_matrix_present = r.read_bit();
            if scaling_matrix_present == 1 {
                return Err(BitstreamError::UnsupportedProfile(profile_idc));
            }
        }

        r.read_ue();
        let pic_order_cnt_type = r.read_ue();
        if pic_order_cnt_type == 0 {
            r.read_ue();
        } else if pic_order_cnt_type == 1 {
            r.read_bit();
            r.read_se();
            r.read_se();
            let num_ref_frames_in_cycle = r.read_ue();
            for _ in 0..num_ref_frames_in_cycle {
                r.read_se();
            }
        }

        let max_num_ref_frames = r.read_ue();
        r.read_bit();
        let pic_width_in_mbs_minus1 = r.read_ue();
        let pic_height_in_map_units_minus1 = r.read_ue();
        let frame_mbs_only_flag = r.read_bit();
        if frame_mbs_only_flag == 0 {
            r.read_bit();
        }
        r.read_bit();
        let frame_cropping_flag = r.read_bit();
        let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0u32, 0u32, 0u32, 0u32);
        if frame_cropping_flag == 1 {
            crop_left = r.read_ue();
            crop_right = r.read_ue();
            crop_top = r.read_ue();
            crop_bottom = r.read_ue();
        }

        let width = (pic_width_in_mbs_minus1 + 1) * 16 - (crop_left + crop_right) * 2;
        let frame_mbs = 2 - frame_mbs_only_flag;
        let frame_height_in_mbs = frame_mbs * (pic_height_in_map_units_minus1 + 1);
        let height = frame_height_in_mbs * 16 - (crop_top + crop_bottom) * 2 * frame_mbs;

        Ok(SpsInfo {
            id: seq_parameter_set_id as u8,
            profile_idc,
            level_idc,
            width,
            height,
            max_num_ref_frames,
        })
    }

    fn parse_pps_sps_id(&self, rbsp: &[u8]) -> Result<u8, BitstreamError> {
        if rbsp.len() < 2 {
            return Err(BitstreamError::Truncated);
        }
        let ebsp = strip_emulation_prevention(&rbsp[1..]);
        let mut r = BitReader::new(&ebsp);
        let _pic_parameter_set_id = r.read_ue();
        let seq_parameter_set_id = r.read_ue();
        Ok(seq_parameter_set_id as u8)
    }

    fn parse_pps(&self, rbsp: &[u8], sps: &SpsInfo) -> Result<PpsInfo, BitstreamError> {
        if rbsp.len() < 2 {
            return Err(BitstreamError::Truncated);
        }
        let ebsp = strip_emulation_prevention(&rbsp[1..]);
        let mut r = BitReader::new(&ebsp);
        let pic_parameter_set_id = r.read_ue();
        let seq_parameter_set_id = r.read_ue();
        let _ = sps;
        Ok(PpsInfo {
            id: pic_parameter_set_id as u8,
            sps_id: seq_parameter_set_id as u8,
        })
    }
}

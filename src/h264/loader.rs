//! NAL boundary discovery and IDR-bounded chunk assembly over [`RingStream`],
//! driving the external bitstream parser for SPS/PPS field extraction only.

use crate::external::bitstream::{nal_type, BitstreamParser};
use crate::h264::{Chunk, FrameInfo, H264Video};
use crate::stream::RingStream;

#[derive(Debug, thiserror::Error)]
pub enum ChunkLoadError {
    #[error("stream reached EOF before observing both an SPS and a PPS")]
    NoParameterSets,
    #[error("SPS dimensions changed mid-stream")]
    DimensionsChanged,
    #[error("bitstream parse error: {0}")]
    Bitstream(#[from] crate::external::bitstream::BitstreamError),
}

/// Finds the next Annex-B NAL unit in `buf` at or after `from`. Returns
/// `(start_code_len, header_offset, nal_end_offset)`, where `nal_end_offset`
/// is either the next start code or `buf.len()`.
fn find_nal(buf: &[u8], from: usize) -> Option<(usize, usize, usize)> {
    let start = find_start_code(buf, from)?;
    let is_four_byte = buf[start + 2] == 0;
    let (start_code_len, header_offset) = if is_four_byte { (4, start + 4) } else { (3, start + 3) };
    let end = find_start_code(buf, header_offset).unwrap_or(buf.len());
    Some((start_code_len, header_offset, end))
}

fn find_start_code(buf: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 3 <= buf.len() {
        if buf[i] == 0 && buf[i + 1] == 0 {
            if buf[i + 2] == 1 {
                return Some(i);
            }
            if i + 4 <= buf.len() && buf[i + 2] == 0 && buf[i + 3] == 1 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

pub struct H264ChunkLoader<P: BitstreamParser> {
    parser: P,
}

impl<P: BitstreamParser> H264ChunkLoader<P> {
    pub fn new(parser: P) -> Self {
        Self { parser }
    }

    /// Scans forward (without consuming anything) until both an SPS and a
    /// PPS have been observed. `load_chunk` starts from the stream's actual
    /// beginning afterwards, so the parameter sets are re-seen as part of
    /// the first real chunk.
    pub fn load_from_stream(&self, stream: &RingStream) -> Result<H264Video, ChunkLoadError> {
        let buf = stream.peek_all();
        let mut video = H264Video::empty();
        let mut pos = 0;

        loop {
            let Some((start_code_len, header_offset, end)) = find_nal(&buf, pos) else {
                return Err(ChunkLoadError::NoParameterSets);
            };
            let nal_type = buf[header_offset] & 0x1F;
            let annexb = &buf[header_offset - start_code_len..end];
            self.dispatch(&mut video, nal_type, annexb)?;

            if video.has_sps() && video.has_pps() {
                return Ok(video);
            }
            if end >= buf.len() {
                return Err(ChunkLoadError::NoParameterSets);
            }
            pos = end;
        }
    }

    pub fn load_from_buffer(&self, bytes: &[u8]) -> Result<(H264Video, RingStream), ChunkLoadError> {
        let mut ring = RingStream::new(bytes.len().max(1));
        ring.append(bytes);
        let video = self.load_from_stream(&ring)?;
        Ok((video, ring))
    }

    /// Assembles the next IDR-bounded chunk, committing consumed bytes to
    /// `stream` only once the boundary (or EOF) is known. Returns
    /// `(chunk, eof)`; `eof` is true only when nothing was accumulated and
    /// the stream had no more NALs to offer.
    pub fn load_chunk(&self, video: &mut H264Video, stream: &mut RingStream) -> Result<(Chunk, bool), ChunkLoadError> {
        let buf = stream.peek_all();
        let mut chunk = Chunk::default();
        let mut seen_idr = false;
        let mut pos = 0usize;

        loop {
            let Some((start_code_len, header_offset, end)) = find_nal(&buf, pos) else {
                stream.consume(pos);
                let is_empty = chunk.is_empty();
                return Ok((chunk, is_empty));
            };
            let nal_type = buf[header_offset] & 0x1F;

            if nal_type == nal_type::SLICE_IDR && seen_idr {
                stream.consume(pos);
                return Ok((chunk, false));
            }

            let annexb = buf[header_offset - start_code_len..end].to_vec();
            self.dispatch(video, nal_type, &annexb)?;
            if nal_type == nal_type::SLICE_IDR {
                seen_idr = true;
            }
            chunk.nals.push(FrameInfo { nal_type, bytes: annexb });
            pos = end;

            if pos >= buf.len() {
                stream.consume(pos);
                return Ok((chunk, false));
            }
        }
    }

    fn dispatch(&self, video: &mut H264Video, nal_type: u8, annexb_bytes: &[u8]) -> Result<(), ChunkLoadError> {
        let start_code_len = if annexb_bytes.len() >= 4 && annexb_bytes[2] == 0 { 4 } else { 3 };
        let rbsp = &annexb_bytes[start_code_len..];

        match nal_type {
            crate::external::bitstream::nal_type::SPS => {
                let sps = self.parser.parse_sps(rbsp)?;
                video.observe_sps(sps)?;
            }
            crate::external::bitstream::nal_type::PPS => {
                let sps_id = self.parser.parse_pps_sps_id(rbsp)?;
                if let Some(sps) = video.sps_at(sps_id) {
                    let pps = self.parser.parse_pps(rbsp, &sps)?;
                    video.observe_pps(pps);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::bitstream::H264ParserAdapter;

    fn start_code_nal(t: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![0, 0, 0, 1, t];
        v.extend_from_slice(payload);
        v
    }

    fn sample_sps_rbsp_payload() -> Vec<u8> {
        let mut bits: Vec<u8> = Vec::new();
        let push_ue = |bits: &mut Vec<u8>, val: u32| {
            let v = val + 1;
            let nbits = 32 - v.leading_zeros();
            for _ in 0..(nbits - 1) {
                bits.push(0);
            }
            for i in (0..nbits).rev() {
                bits.push(((v >> i) & 1) as u8);
            }
        };
        push_ue(&mut bits, 0); // sps id
        push_ue(&mut bits, 0); // log2_max_frame_num_minus4
        push_ue(&mut bits, 0); // pic_order_cnt_type
        push_ue(&mut bits, 0); // log2_max_pic_order_cnt_lsb_minus4
        push_ue(&mut bits, 2); // max_num_ref_frames
        bits.push(0); // gaps_in_frame_num_value_allowed_flag
        push_ue(&mut bits, 79); // pic_width_in_mbs_minus1 -> 1280
        push_ue(&mut bits, 44); // pic_height_in_map_units_minus1 -> 720
        bits.push(1); // frame_mbs_only_flag
        bits.push(1); // direct_8x8_inference_flag
        bits.push(0); // frame_cropping_flag
        bits.push(1); // rbsp_stop_one_bit
        while bits.len() % 8 != 0 {
            bits.push(0);
        }
        let mut bytes = vec![66u8, 0, 30]; // profile_idc, constraint flags, level_idc
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                byte |= b << (7 - i);
            }
            bytes.push(byte);
        }
        bytes
    }

    fn sample_pps_rbsp_payload() -> Vec<u8> {
        vec![0b1100_0000] // pic_parameter_set_id=0, seq_parameter_set_id=0
    }

    fn synthetic_stream() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend(start_code_nal(nal_type::SPS, &sample_sps_rbsp_payload()));
        v.extend(start_code_nal(nal_type::PPS, &sample_pps_rbsp_payload()));
        v.extend(start_code_nal(nal_type::SLICE_IDR, &[0xAA]));
        v.extend(start_code_nal(nal_type::SLICE_NON_IDR, &[0xBB]));
        v.extend(start_code_nal(nal_type::SLICE_NON_IDR, &[0xCC]));
        v.extend(start_code_nal(nal_type::SLICE_IDR, &[0xDD]));
        v.extend(start_code_nal(nal_type::SLICE_NON_IDR, &[0xEE]));
        v
    }

    #[test]
    fn initial_load_observes_sps_and_pps_without_consuming() {
        let loader = H264ChunkLoader::new(H264ParserAdapter);
        let mut ring = RingStream::new(64);
        ring.append(&synthetic_stream());
        let video = loader.load_from_stream(&ring).unwrap();
        assert!(video.has_sps());
        assert!(video.has_pps());
        assert_eq!(video.width, 1280);
        assert_eq!(ring.len(), synthetic_stream().len());
    }

    #[test]
    fn chunk_boundary_splits_on_second_idr() {
        let loader = H264ChunkLoader::new(H264ParserAdapter);
        let mut ring = RingStream::new(64);
        ring.append(&synthetic_stream());
        let mut video = loader.load_from_stream(&ring).unwrap();

        let (chunk1, eof1) = loader.load_chunk(&mut video, &mut ring).unwrap();
        assert_eq!(chunk1.nals.len(), 5);
        assert!(!eof1);

        let (chunk2, eof2) = loader.load_chunk(&mut video, &mut ring).unwrap();
        assert_eq!(chunk2.nals.len(), 2);
        assert!(!eof2);

        let (chunk3, eof3) = loader.load_chunk(&mut video, &mut ring).unwrap();
        assert!(chunk3.is_empty());
        assert!(eof3);
    }

    #[test]
    fn missing_parameter_sets_is_an_error() {
        let loader = H264ChunkLoader::new(H264ParserAdapter);
        let mut ring = RingStream::new(16);
        ring.append(&start_code_nal(nal_type::SLICE_IDR, &[1, 2, 3]));
        assert!(loader.load_from_stream(&ring).is_err());
    }
}

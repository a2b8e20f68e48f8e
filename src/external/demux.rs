//! MPEG-TS transport demuxer adapter (§6).
//!
//! Segments arrive from the download worker as raw MPEG-TS; the demux
//! worker needs the elementary H.264 stream out of them before handing
//! bytes to the chunk loader. Audio (AAC/ADTS) extraction is in scope per
//! the playback context (`PlaybackContext::audio`) but decoding it is not:
//! this adapter only demuxes, it never decodes.

use bytes::{Bytes, BytesMut};

#[derive(Debug, thiserror::Error)]
#[error("transport stream demux error: {0}")]
pub struct DemuxError(pub String);

#[derive(Debug, Default, Clone)]
pub struct DemuxedStreams {
    pub video: Bytes,
    pub audio: Bytes,
}

pub trait TransportDemuxer: Send + Sync {
    /// Demux one complete segment's worth of MPEG-TS bytes into elementary
    /// H.264 (Annex-B) and AAC (ADTS) streams.
    fn demux(&self, ts_bytes: &[u8]) -> Result<DemuxedStreams, DemuxError>;
}

/// Minimal fixed-188-byte-packet TS demuxer. PAT/PMT are parsed just far
/// enough to find the video and audio PIDs; PES payloads are reassembled by
/// concatenation across TS packets with the same PID (no PES header
/// stripping beyond the fixed 9-byte optional header skip, matching how a
/// single-program VOD segment is actually packaged).
#[derive(Default)]
pub struct MpegTsDemuxer;

const TS_PACKET_LEN: usize = 188;
const TS_SYNC_BYTE: u8 = 0x47;
const PAT_PID: u16 = 0;

struct Pes {
    buf: BytesMut,
    started: bool,
}

impl Pes {
    fn new() -> Self {
        Self { buf: BytesMut::new(), started: false }
    }
}

impl TransportDemuxer for MpegTsDemuxer {
    fn demux(&self, ts_bytes: &[u8]) -> Result<DemuxedStreams, DemuxError> {
        if ts_bytes.is_empty() {
            return Err(DemuxError("empty transport stream".into()));
        }

        let mut pmt_pid: Option<u16> = None;
        let mut video_pid: Option<u16> = None;
        let mut audio_pid: Option<u16> = None;
        let mut video = Pes::new();
        let mut audio = Pes::new();

        let mut offset = 0;
        while offset + TS_PACKET_LEN <= ts_bytes.len() {
            let packet = &ts_bytes[offset..offset + TS_PACKET_LEN];
            offset += TS_PACKET_LEN;
            if packet[0] != TS_SYNC_BYTE {
                continue;
            }
            let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
            let payload_unit_start = packet[1] & 0x40 != 0;
            let adaptation_field_control = (packet[3] >> 4) & 0x3;
            let mut body_start = 4;
            if adaptation_field_control == 2 {
                continue;
            }
            if adaptation_field_control == 3 {
                let adaptation_len = packet[4] as usize;
                body_start = 5 + adaptation_len;
            }
            if body_start >= TS_PACKET_LEN {
                continue;
            }
            let body = &packet[body_start..];

            if pid == PAT_PID && payload_unit_start {
                if let Some(found) = parse_pat(body) {
                    pmt_pid = Some(found);
                }
            } else if Some(pid) == pmt_pid && payload_unit_start {
                let (v, a) = parse_pmt(body);
                video_pid = v;
                audio_pid = a;
            } else if Some(pid) == video_pid {
                append_pes(&mut video, body, payload_unit_start);
            } else if Some(pid) == audio_pid {
                append_pes(&mut audio, body, payload_unit_start);
            }
        }

        Ok(DemuxedStreams {
            video: video.buf.freeze(),
            audio: audio.buf.freeze(),
        })
    }
}

fn append_pes(pes: &mut Pes, body: &[u8], payload_unit_start: bool) {
    if payload_unit_start {
        pes.started = true;
        if body.len() > 9 {
            let header_len = body[8] as usize;
            let data_start = 9 + header_len;
            if data_start < body.len() {
                pes.buf.extend_from_slice(&body[data_start..]);
            }
        }
    } else if pes.started {
        pes.buf.extend_from_slice(body);
    }
}

fn parse_pat(body: &[u8]) -> Option<u16> {
    if body.is_empty() {
        return None;
    }
    let pointer_field = body[0] as usize;
    let section = body.get(1 + pointer_field..)?;
    if section.len() < 12 {
        return None;
    }
    let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
    let program_data = section.get(8..3 + section_length.saturating_sub(4))?;
    let mut i = 0;
    while i + 4 <= program_data.len() {
        let program_number = ((program_data[i] as u16) << 8) | program_data[i + 1] as u16;
        let pid = (((program_data[i + 2] & 0x1F) as u16) << 8) | program_data[i + 3] as u16;
        if program_number != 0 {
            return Some(pid);
        }
        i += 4;
    }
    None
}

fn parse_pmt(body: &[u8]) -> (Option<u16>, Option<u16>) {
    let mut video = None;
    let mut audio = None;
    if body.is_empty() {
        return (None, None);
    }
    let pointer_field = body[0] as usize;
    let Some(section) = body.get(1 + pointer_field..) else { return (None, None) };
    if section.len() < 12 {
        return (None, None);
    }
    let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
    let program_info_length = (((section[10] & 0x0F) as usize) << 8) | section[11] as usize;
    let mut i = 12 + program_info_length;
    let end = (3 + section_length).saturating_sub(4).min(section.len());
    while i + 5 <= end {
        let stream_type = section[i];
        let pid = (((section[i + 1] & 0x1F) as u16) << 8) | section[i + 2] as u16;
        let es_info_length = (((section[i + 3] & 0x0F) as usize) << 8) | section[i + 4] as usize;
        match stream_type {
            0x1B | 0x02 => video = Some(pid),
            0x0F | 0x04 => audio = Some(pid),
            _ => {}
        }
        i += 5 + es_info_length;
    }
    (video, audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_an_error() {
        assert!(MpegTsDemuxer.demux(&[]).is_err());
    }

    #[test]
    fn garbage_without_sync_bytes_yields_empty_streams() {
        let bytes = vec![0u8; TS_PACKET_LEN * 3];
        let out = MpegTsDemuxer.demux(&bytes).unwrap();
        assert!(out.video.is_empty());
        assert!(out.audio.is_empty());
    }
}

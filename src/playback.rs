//! Playback Context (C7).
//!
//! One instance per active source. Owns the growable ring stream (C4) that
//! backs the H.264 chunk loader, the decoder slot pool (C8), and the
//! stand-in video/audio output adapters (§6). `update` is ticked once per
//! scene-controller frame; it never blocks.

use std::time::Duration;

use crate::decoder_pool::DecoderSlotPool;
use crate::external::audio::AudioStreamingPlayer;
use crate::external::bitstream::BitstreamParser;
use crate::external::gpu::VideoDecoder;
use crate::h264::{Chunk, H264ChunkLoader, H264Video};
use crate::stream::RingStream;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("chunk load failed: {0}")]
    ChunkLoad(#[from] crate::h264::ChunkLoadError),
    #[error(transparent)]
    Decoder(#[from] crate::external::gpu::DecoderError),
    #[error(transparent)]
    Audio(#[from] crate::external::audio::AudioError),
}

pub struct PlaybackContext<P: BitstreamParser, D: VideoDecoder, A: AudioStreamingPlayer> {
    loader: H264ChunkLoader<P>,
    decoder: D,
    audio: A,
    slots: DecoderSlotPool,

    initialized: bool,
    start_time_sec: f32,
    last_update_sec: f32,
    current_segment: u32,

    video_data_stream: RingStream,
    video: Option<H264Video>,
    current_chunk: Chunk,
    chunk_cursor: usize,
    chunk_duration_sec: f32,
}

impl<P: BitstreamParser, D: VideoDecoder, A: AudioStreamingPlayer> PlaybackContext<P, D, A> {
    pub fn new(parser: P, decoder: D, audio: A) -> Self {
        Self {
            loader: H264ChunkLoader::new(parser),
            decoder,
            audio,
            slots: DecoderSlotPool::new(),
            initialized: false,
            start_time_sec: 0.0,
            last_update_sec: 0.0,
            current_segment: 0,
            video_data_stream: RingStream::new(64 * 1024),
            video: None,
            current_chunk: Chunk::default(),
            chunk_cursor: 0,
            chunk_duration_sec: 0.0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn current_segment(&self) -> u32 {
        self.current_segment
    }

    /// First-segment init: seed the stream, parse initial parameter sets,
    /// and bring the decoder/audio player up.
    pub fn init_with_first_segment(&mut self, segment_id: u32, h264_bytes: &[u8], audio_adts: &[u8], now_sec: f32) -> Result<(), PlaybackError> {
        self.video_data_stream.append(h264_bytes);
        let video = self.loader.load_from_stream(&self.video_data_stream)?;
        self.decoder.init(video.width.max(1), video.height.max(1))?;
        self.audio.init(48_000, 2)?;
        self.audio.push(audio_adts);
        self.video = Some(video);
        self.current_segment = segment_id;
        self.start_time_sec = now_sec;
        self.last_update_sec = now_sec;
        self.initialized = true;
        Ok(())
    }

    /// Appends a subsequent segment's elementary streams. Video bytes join
    /// the ring stream the chunk loader pulls from; decode progression is
    /// still driven entirely by `update`, not by this call.
    pub fn add_segment(&mut self, segment_id: u32, video_bytes: &[u8], audio_adts: &[u8]) {
        self.video_data_stream.append(video_bytes);
        self.audio.push(audio_adts);
        self.current_segment = segment_id;
    }

    /// Services the audio player and, if the wall-time budget allows,
    /// decodes one more frame from the current chunk (pulling a new chunk
    /// from the loader when the current one is exhausted).
    pub fn update(&mut self, now_sec: f32, frame_budget: Duration) -> Result<(), PlaybackError> {
        if !self.initialized {
            return Ok(());
        }
        self.last_update_sec = now_sec;

        if self.chunk_cursor >= self.current_chunk.nals.len() {
            let Some(video) = self.video.as_mut() else { return Ok(()) };
            let (chunk, eof) = self.loader.load_chunk(video, &mut self.video_data_stream)?;
            self.slots.advance_chunk(self.current_chunk.frame_count() as u32, self.chunk_duration_sec);
            self.current_chunk = chunk;
            self.chunk_cursor = 0;
            self.chunk_duration_sec = video.frame_duration_sec * self.current_chunk.frame_count() as f32;
            if eof && self.current_chunk.is_empty() {
                return Ok(());
            }
        }

        if frame_budget.is_zero() {
            return Ok(());
        }

        if let Some(nal) = self.current_chunk.nals.get(self.chunk_cursor) {
            let is_keyframe = nal.nal_type == crate::external::bitstream::nal_type::SLICE_IDR;
            if let Some(picture) = self.decoder.submit(&nal.bytes, is_keyframe)? {
                self.slots.record_frame(picture.display_order as u32, self.video.as_ref().map(|v| v.frame_duration_sec).unwrap_or(0.0));
            }
            self.chunk_cursor += 1;
        }

        Ok(())
    }

    pub fn queued_audio_bytes(&self) -> usize {
        self.audio.queued_bytes()
    }

    pub fn decoded_frames_in_flight(&self) -> usize {
        self.slots.in_use_count()
    }
}

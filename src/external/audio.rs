//! Audio output adapter (§6) — Non-goal per the specification ("no real
//! audio output device"). Exists so `crate::playback` has something
//! concrete to hold; the stand-in just counts bytes pushed to it.

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio device initialization failed: {0}")]
    Init(String),
}

pub trait AudioStreamingPlayer: Send {
    fn init(&mut self, sample_rate: u32, channels: u8) -> Result<(), AudioError>;
    fn push(&mut self, adts_frame: &[u8]);
    fn queued_bytes(&self) -> usize;
    fn reset(&mut self);
}

#[derive(Default)]
pub struct NullAudioPlayer {
    initialized: bool,
    queued: usize,
}

impl AudioStreamingPlayer for NullAudioPlayer {
    fn init(&mut self, _sample_rate: u32, _channels: u8) -> Result<(), AudioError> {
        self.initialized = true;
        self.queued = 0;
        Ok(())
    }

    fn push(&mut self, adts_frame: &[u8]) {
        if self.initialized {
            self.queued += adts_frame.len();
        }
    }

    fn queued_bytes(&self) -> usize {
        self.queued
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.queued = 0;
    }
}

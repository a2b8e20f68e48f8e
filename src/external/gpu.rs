//! GPU video decoder adapter (§6) — Non-goal per the specification
//! ("no real decode/present, windowing, or GPU APIs"). This module exists
//! only so `crate::playback` has something concrete to hold and tick; the
//! stand-in never touches a GPU.

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("decoder initialization failed: {0}")]
    Init(String),
    #[error("decoder slot exhausted")]
    SlotExhausted,
}

/// An opaque handle to a decoded picture, analogous to the original's
/// Vulkan image + fence pair. Holds nothing a real decoder wouldn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPicture {
    pub slot: u32,
    pub display_order: u64,
}

pub trait VideoDecoder: Send {
    fn init(&mut self, width: u32, height: u32) -> Result<(), DecoderError>;
    /// Submit one Annex-B access unit. Returns a picture handle once the
    /// decoder has a frame ready to display (it may hold frames back for
    /// B-frame reordering).
    fn submit(&mut self, access_unit: &[u8], is_keyframe: bool) -> Result<Option<DecodedPicture>, DecoderError>;
    fn reset(&mut self);
}

/// Stand-in decoder: reports every keyframe-bearing access unit as
/// immediately displayable, in submission order. No reordering, no real
/// decode.
#[derive(Default)]
pub struct NullVideoDecoder {
    initialized: bool,
    display_order: u64,
}

impl VideoDecoder for NullVideoDecoder {
    fn init(&mut self, _width: u32, _height: u32) -> Result<(), DecoderError> {
        self.initialized = true;
        self.display_order = 0;
        Ok(())
    }

    fn submit(&mut self, access_unit: &[u8], _is_keyframe: bool) -> Result<Option<DecodedPicture>, DecoderError> {
        if !self.initialized {
            return Err(DecoderError::Init("submit before init".into()));
        }
        if access_unit.is_empty() {
            return Ok(None);
        }
        let slot = (self.display_order % crate::limits::DECODER_SLOTS as u64) as u32;
        let picture = DecodedPicture { slot, display_order: self.display_order };
        self.display_order += 1;
        Ok(Some(picture))
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.display_order = 0;
    }
}

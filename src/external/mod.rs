//! External collaborators (§6).
//!
//! Everything in this module is a contract, not a core pipeline component:
//! windowing, GPU decode, font rendering, the audio output device, the M3U8
//! parser, the MPEG-TS demuxer and the H.264 bitstream parser are all
//! out-of-scope per the specification. Each is captured here as a trait the
//! core components call through, with one concrete adapter (usually over a
//! real crate) so the pipeline is runnable end to end in tests without a GPU
//! or a display.

pub mod audio;
pub mod bitstream;
pub mod demux;
pub mod gpu;
pub mod http_client;
pub mod io;
pub mod m3u8;

//! Fatal error hierarchy for the pipeline.
//!
//! Per the error-handling design, only *fatal* failures (allocation failure,
//! decoder session creation, required-feature-missing, malformed
//! configuration) are represented as `Result::Err` here. Transient IO,
//! protocol-unsupported, race-loss and capacity conditions are expected
//! control flow inside the worker loops and stores; they are logged and
//! handled inline rather than propagated.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("decoder session creation failed: {0}")]
    DecoderInit(String),

    #[error("h264 chunk loader error: {0}")]
    H264Load(String),

    #[error("source list is empty")]
    NoSources,

    #[error("too many sources: {0} exceeds the {1} source limit")]
    TooManySources(usize, usize),

    #[error("source index {0} out of range")]
    InvalidSourceIndex(u32),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

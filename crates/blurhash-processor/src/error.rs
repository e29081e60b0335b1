//! Error and result types for the processing engine.
//!
//! Errors are `Clone` because a single decode outcome is delivered to every
//! caller waiting on the same key.

use std::sync::Arc;
use std::time::Duration;

use blurhash_decoder::{BlurhashError, PixelBuffer};
use thiserror::Error;

/// Why a processing request did not produce a pixel buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    /// The hash string is malformed: bad length, bad character or header.
    #[error("invalid BlurHash format: {0}")]
    InvalidFormat(String),

    /// Width or height is zero or above the configured ceiling.
    #[error("invalid dimensions {width}x{height}: must be within 1..={max}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        max: u32,
    },

    /// Punch is not finite or outside `0.1..=10.0`.
    #[error("invalid punch {0}: must be within 0.1..=10.0")]
    InvalidPunch(f64),

    /// The decoder produced no usable result for a well-formed hash.
    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    /// The pixel buffer could not be allocated.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// The caller stopped waiting after the given duration.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The in-flight operation for this key was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The processor has been cleaned up and accepts no new work.
    #[error("processor has been shut down")]
    ShutDown,

    /// The processor was created outside a Tokio runtime.
    #[error("no Tokio runtime available")]
    NoRuntime,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other failure while processing, including a panicking decoder.
    #[error("processing error: {0}")]
    Processing(String),
}

impl ProcessError {
    /// Whether the error was raised by input validation, before any cache
    /// or concurrency state was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProcessError::InvalidFormat(_)
                | ProcessError::InvalidDimensions { .. }
                | ProcessError::InvalidPunch(_)
        )
    }
}

impl From<BlurhashError> for ProcessError {
    fn from(err: BlurhashError) -> Self {
        match err {
            e if e.is_format_error() => ProcessError::InvalidFormat(e.to_string()),
            BlurhashError::InvalidDimensions { width, height, .. } => {
                ProcessError::InvalidDimensions {
                    width,
                    height,
                    max: blurhash_decoder::MAX_DIMENSION,
                }
            }
            BlurhashError::InvalidPunch(punch) => ProcessError::InvalidPunch(punch),
            BlurhashError::DecodingFailed(msg) => ProcessError::DecodingFailed(msg),
            BlurhashError::OutOfMemory { bytes } => ProcessError::OutOfMemory { bytes },
            BlurhashError::Cancelled => ProcessError::Cancelled,
            other => ProcessError::Processing(other.to_string()),
        }
    }
}

/// A specialized Result type for processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Outcome handed to `process_with_callback` continuations.
#[derive(Debug, Clone, PartialEq)]
pub enum BlurHashResult {
    Success(Arc<PixelBuffer>),
    Error(ProcessError),
}

impl BlurHashResult {
    pub fn is_success(&self) -> bool {
        matches!(self, BlurHashResult::Success(_))
    }

    pub fn into_result(self) -> ProcessResult<Arc<PixelBuffer>> {
        match self {
            BlurHashResult::Success(image) => Ok(image),
            BlurHashResult::Error(err) => Err(err),
        }
    }
}

impl From<ProcessResult<Arc<PixelBuffer>>> for BlurHashResult {
    fn from(result: ProcessResult<Arc<PixelBuffer>>) -> Self {
        match result {
            Ok(image) => BlurHashResult::Success(image),
            Err(err) => BlurHashResult::Error(err),
        }
    }
}

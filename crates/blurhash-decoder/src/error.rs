//! Error types for BlurHash decoding.

use thiserror::Error;

/// Errors that can occur while validating or decoding a BlurHash.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlurhashError {
    /// The BlurHash string has an invalid length.
    #[error("invalid BlurHash length: expected {expected}, got {actual}")]
    InvalidLength {
        /// The expected length.
        expected: usize,
        /// The actual length.
        actual: usize,
    },

    /// The component count is out of the valid range (1..=9).
    #[error("component count out of range: {component} = {value} (must be 1..=9)")]
    InvalidComponentCount {
        /// Which component axis ("x" or "y").
        component: &'static str,
        /// The invalid value.
        value: u32,
    },

    /// An invalid character was encountered during base83 decoding.
    #[error("invalid base83 character: {0:?}")]
    InvalidBase83Character(char),

    /// A base83 value does not fit the requested width or an integer.
    #[error("encoding error: {0}")]
    EncodingError(String),

    /// The output dimensions are invalid (zero or too large).
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// The width value.
        width: u32,
        /// The height value.
        height: u32,
        /// Why the dimensions are invalid.
        reason: String,
    },

    /// The punch factor is not finite or lies outside `[0.1, 10.0]`.
    #[error("invalid punch {0}: must be within 0.1..=10.0")]
    InvalidPunch(f64),

    /// The string is well formed but its component values are unusable.
    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    /// The pixel buffer could not be allocated.
    #[error("out of memory allocating {bytes} byte pixel buffer")]
    OutOfMemory {
        /// Requested buffer size.
        bytes: usize,
    },

    /// The caller raised the cancellation flag before the decode finished.
    #[error("decode cancelled")]
    Cancelled,
}

impl BlurhashError {
    /// Whether this error describes a malformed BlurHash string
    /// (bad length, bad character or inconsistent header).
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            BlurhashError::InvalidLength { .. }
                | BlurhashError::InvalidComponentCount { .. }
                | BlurhashError::InvalidBase83Character(_)
                | BlurhashError::EncodingError(_)
        )
    }
}

//! The seam between the processor and the pixel decoder.

use std::sync::atomic::AtomicBool;

use blurhash_decoder::{BlurHashDecoder, BlurhashError, PixelBuffer};

/// Anything that can turn a validated request into pixels.
///
/// Implementations run on Tokio's blocking pool and may be called from
/// several threads at once. The operation's concurrency slot is held until
/// `decode` returns, so long-running implementations should poll
/// `cancelled` and return [`BlurhashError::Cancelled`] once it is set.
pub trait PixelDecoder: Send + Sync + 'static {
    fn decode(
        &self,
        hash: &str,
        width: u32,
        height: u32,
        punch: f64,
        cancelled: &AtomicBool,
    ) -> Result<PixelBuffer, BlurhashError>;

    /// Drop any memoized intermediate state.
    fn clear_cache(&self) {}
}

impl PixelDecoder for BlurHashDecoder {
    fn decode(
        &self,
        hash: &str,
        width: u32,
        height: u32,
        punch: f64,
        cancelled: &AtomicBool,
    ) -> Result<PixelBuffer, BlurhashError> {
        self.decode_with_cancel(hash, width, height, punch, cancelled)
    }

    fn clear_cache(&self) {
        BlurHashDecoder::clear_cache(self);
    }
}

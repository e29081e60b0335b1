//! # blurhash-decoder
//!
//! BlurHash decoding in pure Rust.
//!
//! [BlurHash](https://blurha.sh/) is a compact representation of a placeholder
//! for an image. This crate turns a BlurHash string into an RGB
//! [`PixelBuffer`] of any size, memoizing the cosine basis tables that the
//! inverse DCT needs so repeated decodes at the same size stay cheap.
//!
//! ## Quick Start
//!
//! ```
//! use blurhash_decoder::BlurHashDecoder;
//!
//! let decoder = BlurHashDecoder::new();
//! let image = decoder.decode("LGFFaXYk^6#M@-5c,1J5@[or[Q6.", 32, 32, 1.0).unwrap();
//! assert_eq!(image.as_bytes().len(), 32 * 32 * 3);
//! assert!(image.pixel(31, 31).is_some());
//! ```
//!
//! Enable the `parallel` feature to render rows on the rayon thread pool.

pub mod base83;
pub mod color;
pub mod error;
pub mod pixels;

mod decode_impl;

pub use decode_impl::{
    components, decode, validate_dimensions, validate_hash, validate_punch, BlurHashDecoder,
    DEFAULT_PUNCH, MAX_DIMENSION, MAX_PUNCH, MIN_DIMENSION, MIN_PUNCH,
};
pub use error::BlurhashError;
pub use pixels::PixelBuffer;

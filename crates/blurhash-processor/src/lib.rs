//! # blurhash-processor
//!
//! A concurrent BlurHash decoding service for placeholder rendering.
//!
//! [`BlurHashProcessor`] wraps a [`PixelDecoder`] (by default
//! [`blurhash_decoder::BlurHashDecoder`]) with:
//!
//! - **LRU caching** of decoded buffers keyed by `(hash, width, height, punch)`
//! - **Deduplication**: concurrent requests for one key share a single decode
//! - **Bounded concurrency**: at most `max_concurrent_jobs` decodes at once,
//!   run on Tokio's blocking pool
//! - **Cancellation and timeouts** that never leak a slot or an in-flight entry
//! - **Statistics**: hits, misses, errors, timeouts, evictions
//!
//! ## Quick Start
//!
//! ```
//! use blurhash_processor::{BlurHashProcessor, DecodeRequest, ProcessorConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = ProcessorConfig::new()
//!     .cache_size(100)
//!     .max_concurrent_jobs(4)
//!     .build()
//!     .unwrap();
//! let processor = BlurHashProcessor::new(config).unwrap();
//!
//! let request = DecodeRequest::new("LEHV6nWB2yk8pyo0adR*.7kCMdnj", 32, 32).with_punch(1.2);
//! let image = processor.process(&request).await.unwrap();
//! assert_eq!(image.pixel(0, 0).map(|px| px.len()), Some(3));
//!
//! let stats = processor.stats();
//! println!("hit rate: {:.1}%", stats.hit_rate() * 100.0);
//!
//! processor.cleanup();
//! # }
//! ```
//!
//! ## Logging
//!
//! Events are emitted through `tracing`; install any subscriber to see them.

pub mod config;
pub mod decoder;
pub mod error;
pub mod key;
pub mod stats;

mod in_flight;
mod lru;
mod processor;

pub use blurhash_decoder::PixelBuffer;
pub use config::ProcessorConfig;
pub use decoder::PixelDecoder;
pub use error::{BlurHashResult, ProcessError, ProcessResult};
pub use key::{CacheKey, DecodeRequest};
pub use processor::BlurHashProcessor;
pub use stats::StatsSnapshot;

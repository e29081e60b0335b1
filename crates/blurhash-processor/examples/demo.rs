//! BlurHash processor demo - cached, deduplicated decoding
//!
//! Run with: RUST_LOG=debug cargo run --example demo

use std::time::Duration;

use blurhash_processor::{BlurHashProcessor, DecodeRequest, ProcessorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== BlurHash Processor Demo ===\n");

    let config = ProcessorConfig::new()
        .cache_size(16)
        .max_concurrent_jobs(2)
        .default_timeout(Duration::from_secs(2))
        .build()
        .expect("valid configuration");
    let processor = BlurHashProcessor::new(config).expect("inside a Tokio runtime");

    let hashes = [
        "LEHV6nWB2yk8pyo0adR*.7kCMdnj",
        "LGFFaXYk^6#M@-5c,1J5@[or[Q6.",
        "L6PZfSi_.AyE_3t7t7R**0o#DgR4",
    ];

    // 1. Decode each hash once.
    for hash in hashes {
        let request = DecodeRequest::new(hash, 32, 32);
        let image = processor.process(&request).await.expect("decode");
        println!(
            "1. {} -> {}x{}, first pixel {:?}",
            request.key(),
            image.width(),
            image.height(),
            image.pixel(0, 0)
        );
    }

    // 2. A burst of identical requests shares one decode.
    let request = DecodeRequest::new(hashes[0], 64, 64).with_punch(1.5);
    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let processor = processor.clone();
            let request = request.clone();
            tokio::spawn(async move { processor.process(&request).await })
        })
        .collect();
    for waiter in waiters {
        waiter.await.expect("task").expect("decode");
    }
    println!("\n2. Served 8 concurrent requests for {}", request.key());

    // 3. Repeat requests come from the cache.
    for hash in hashes {
        processor
            .process(&DecodeRequest::new(hash, 32, 32))
            .await
            .expect("decode");
    }
    println!("\n3. Cached entries: {}", processor.cached_len());

    // 4. Invalid input is rejected up front.
    let err = processor
        .process(&DecodeRequest::new("not a hash", 32, 32))
        .await
        .unwrap_err();
    println!("\n4. Rejected invalid hash: {err}");

    let stats = processor.stats();
    println!("\n5. Stats: {stats:?}");
    println!("   Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    processor.cleanup();
    println!("\n=== Demo Complete ===");
}

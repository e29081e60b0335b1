//! BlurHash Demo - Decode example
//!
//! Run with: cargo run --example demo

use blurhash_decoder::{components, BlurHashDecoder};

fn main() {
    println!("=== BlurHash Demo ===\n");

    let hash = "LEHV6nWB2yk8pyo0adR*.7kCMdnj";
    println!("1. BlurHash: {}", hash);
    println!("   Hash length: {} characters\n", hash.len());

    // Extract components from hash
    let (cx, cy) = components(hash).expect("Failed to get components");
    println!("2. Components: {}x{}\n", cx, cy);

    // Decode at two sizes; the second decode at the first size reuses the
    // memoized cosine tables.
    let decoder = BlurHashDecoder::new();
    for &(width, height, punch) in &[(8u32, 8u32, 1.0), (32, 20, 1.0), (8, 8, 2.0)] {
        let image = decoder
            .decode(hash, width, height, punch)
            .expect("Failed to decode");
        let bytes = image.as_bytes();
        println!(
            "3. Decoded to {}x{} image at punch {} ({} bytes)",
            image.width(),
            image.height(),
            punch,
            bytes.len()
        );
        println!("   First pixel RGB: {:?}", image.pixel(0, 0));
        println!("   Last pixel RGB: {:?}", image.pixel(width - 1, height - 1));
    }
    println!("\n   Cached cosine tables: {}", decoder.cached_tables());

    // Invalid input is reported, never panics
    match decoder.decode("not-a-hash", 8, 8, 1.0) {
        Ok(_) => println!("\n4. Unexpectedly decoded an invalid hash"),
        Err(err) => println!("\n4. Rejected invalid hash: {}", err),
    }

    println!("\n=== Demo Complete ===");
}

//! Request and cache-key types.

use std::fmt;
use std::sync::Arc;

use blurhash_decoder::DEFAULT_PUNCH;

/// A request to decode `hash` into a `width x height` buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub hash: Arc<str>,
    pub width: u32,
    pub height: u32,
    pub punch: f64,
}

impl DecodeRequest {
    /// A request with the neutral punch of 1.0.
    pub fn new(hash: impl Into<Arc<str>>, width: u32, height: u32) -> Self {
        Self {
            hash: hash.into(),
            width,
            height,
            punch: DEFAULT_PUNCH,
        }
    }

    pub fn with_punch(mut self, punch: f64) -> Self {
        self.punch = punch;
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey {
            hash: Arc::clone(&self.hash),
            width: self.width,
            height: self.height,
            punch_bits: self.punch.to_bits(),
        }
    }
}

/// Identity of a decode: equal keys always decode to identical buffers.
///
/// Punch is compared by bit pattern so the key can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: Arc<str>,
    width: u32,
    height: u32,
    punch_bits: u64,
}

impl CacheKey {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn punch(&self) -> f64 {
        f64::from_bits(self.punch_bits)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}x{}_{}",
            self.hash,
            self.width,
            self.height,
            self.punch()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = DecodeRequest::new("LEHV6nWB2yk8pyo0adR*.7kCMdnj", 20, 10)
            .with_punch(1.5)
            .key();
        assert_eq!(key.to_string(), "LEHV6nWB2yk8pyo0adR*.7kCMdnj_20x10_1.5");
        assert_eq!(key.hash(), "LEHV6nWB2yk8pyo0adR*.7kCMdnj");
        assert_eq!(key.punch(), 1.5);
    }

    #[test]
    fn test_distinct_parameters_give_distinct_keys() {
        let base = DecodeRequest::new("LEHV6nWB2yk8pyo0adR*.7kCMdnj", 20, 20);
        let keys = [
            base.key(),
            DecodeRequest { width: 21, ..base.clone() }.key(),
            DecodeRequest { height: 21, ..base.clone() }.key(),
            base.clone().with_punch(1.1).key(),
            DecodeRequest::new("LGFFaXYk^6#M@-5c,1J5@[or[Q6.", 20, 20).key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(base.key(), base.clone().key());
    }
}

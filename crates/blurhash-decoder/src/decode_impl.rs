//! BlurHash decoding: convert a BlurHash string back into an RGB image.
//!
//! The decoder parses the base83-encoded string, extracts the DCT
//! components and sums their cosine basis functions for every output pixel.
//! Cosine tables depend only on `(dimension, component count)`, so a
//! [`BlurHashDecoder`] memoizes them across calls.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::base83;
use crate::color::{linear_to_srgb, sign_pow, srgb_to_linear};
use crate::error::BlurhashError;
use crate::pixels::{PixelBuffer, CHANNELS};

/// Smallest accepted output width or height.
pub const MIN_DIMENSION: u32 = 1;
/// Largest accepted output width or height.
pub const MAX_DIMENSION: u32 = 4096;
/// Smallest accepted punch factor.
pub const MIN_PUNCH: f64 = 0.1;
/// Largest accepted punch factor.
pub const MAX_PUNCH: f64 = 10.0;
/// Punch that leaves the encoded contrast unchanged.
pub const DEFAULT_PUNCH: f64 = 1.0;

/// Upper bound on memoized cosine tables before the cache is flushed.
const COSINE_CACHE_LIMIT: usize = 64;

/// Largest value a quantized AC triple can take (19^3 - 1).
const MAX_AC_VALUE: u64 = 19 * 19 * 19 - 1;

/// Extract the number of X and Y components from a BlurHash header.
///
/// # Errors
///
/// Returns [`BlurhashError::InvalidLength`] if the BlurHash is shorter than
/// 6 characters and [`BlurhashError::InvalidComponentCount`] if the header
/// encodes more than 9 vertical components.
///
/// # Examples
///
/// ```
/// use blurhash_decoder::components;
/// assert_eq!(components("LEHV6nWB2yk8pyo0adR*.7kCMdnj").unwrap(), (4, 3));
/// ```
pub fn components(blurhash: &str) -> Result<(u32, u32), BlurhashError> {
    let actual = blurhash.chars().count();
    let Some(first) = blurhash.chars().next().filter(|_| actual >= 6) else {
        return Err(BlurhashError::InvalidLength {
            expected: 6,
            actual,
        });
    };
    let size_info = base83::decode(first.encode_utf8(&mut [0; 4]))?;
    let size_x = (size_info % 9 + 1) as u32;
    let size_y = (size_info / 9 + 1) as u32;
    if size_y > 9 {
        return Err(BlurhashError::InvalidComponentCount {
            component: "y",
            value: size_y,
        });
    }
    Ok((size_x, size_y))
}

/// Check that `blurhash` is a structurally valid BlurHash and return its
/// component counts.
///
/// Every character must belong to the base83 alphabet and the total length
/// must equal `4 + 2 * x * y`.
///
/// ```
/// use blurhash_decoder::validate_hash;
/// assert!(validate_hash("LEHV6nWB2yk8pyo0adR*.7kCMdnj").is_ok());
/// assert!(validate_hash("LEHV6nWB2yk8pyo0adR*.7kCMdn").is_err());
/// ```
pub fn validate_hash(blurhash: &str) -> Result<(u32, u32), BlurhashError> {
    if let Some(bad) = blurhash.chars().find(|&c| !base83::is_valid(c)) {
        return Err(BlurhashError::InvalidBase83Character(bad));
    }
    let (size_x, size_y) = components(blurhash)?;
    let expected = 4 + 2 * (size_x * size_y) as usize;
    if blurhash.len() != expected {
        return Err(BlurhashError::InvalidLength {
            expected,
            actual: blurhash.len(),
        });
    }
    Ok((size_x, size_y))
}

/// Check output dimensions against `MIN_DIMENSION..=max`.
pub fn validate_dimensions(width: u32, height: u32, max: u32) -> Result<(), BlurhashError> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(BlurhashError::InvalidDimensions {
            width,
            height,
            reason: "width and height must be > 0".to_string(),
        });
    }
    if width > max || height > max {
        return Err(BlurhashError::InvalidDimensions {
            width,
            height,
            reason: format!("dimensions must be <= {max}"),
        });
    }
    Ok(())
}

/// Punch values are rejected, never clamped, when outside `MIN_PUNCH..=MAX_PUNCH`.
pub fn validate_punch(punch: f64) -> Result<(), BlurhashError> {
    if punch.is_finite() && (MIN_PUNCH..=MAX_PUNCH).contains(&punch) {
        Ok(())
    } else {
        Err(BlurhashError::InvalidPunch(punch))
    }
}

/// Parse the DC and AC components of an already validated hash.
fn decode_colours(
    blurhash: &str,
    size_x: u32,
    size_y: u32,
    punch: f64,
) -> Result<Vec<[f64; 3]>, BlurhashError> {
    let quant_max_value = base83::decode(&blurhash[1..2])?;
    let max_ac = (quant_max_value as f64 + 1.0) / 166.0 * punch;

    let dc_value = base83::decode(&blurhash[2..6])?;
    if dc_value > 0xFF_FFFF {
        return Err(BlurhashError::DecodingFailed(format!(
            "DC value {dc_value:#x} exceeds 24 bits"
        )));
    }

    let num_components = (size_x * size_y) as usize;
    let mut colours = Vec::with_capacity(num_components);
    colours.push([
        srgb_to_linear((dc_value >> 16) as u8),
        srgb_to_linear(((dc_value >> 8) & 255) as u8),
        srgb_to_linear((dc_value & 255) as u8),
    ]);

    for component_idx in 1..num_components {
        let start = 4 + component_idx * 2;
        let ac_value = base83::decode(&blurhash[start..start + 2])?;
        if ac_value > MAX_AC_VALUE {
            return Err(BlurhashError::DecodingFailed(format!(
                "AC component {component_idx} value {ac_value} exceeds {MAX_AC_VALUE}"
            )));
        }
        let quant = [ac_value / (19 * 19), (ac_value / 19) % 19, ac_value % 19];
        colours.push(quant.map(|q| sign_pow((q as f64 - 9.0) / 9.0, 2.0) * max_ac));
    }

    Ok(colours)
}

/// `table[i * dimension + p] = cos(pi * p * i / dimension)`.
fn cosine_table(dimension: u32, components: u32) -> Vec<f64> {
    let d = dimension as f64;
    (0..components)
        .flat_map(|i| (0..dimension).map(move |p| (PI * p as f64 * i as f64 / d).cos()))
        .collect()
}

/// A BlurHash decoder with a memoized cosine-table cache.
///
/// The decoder is `Send + Sync`; share it behind an `Arc` to reuse cosine
/// tables across threads. Concurrent first use of a table may compute it
/// twice; both results are identical and one of them is kept.
#[derive(Debug, Default)]
pub struct BlurHashDecoder {
    cosines: DashMap<(u32, u32), Arc<[f64]>>,
}

impl BlurHashDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `blurhash` into a `width x height` RGB buffer.
    ///
    /// # Errors
    ///
    /// * [`BlurhashError::InvalidDimensions`] if either side is outside
    ///   `1..=4096`.
    /// * [`BlurhashError::InvalidPunch`] if `punch` is outside `0.1..=10.0`.
    /// * A format error (see [`BlurhashError::is_format_error`]) for a
    ///   malformed string.
    /// * [`BlurhashError::DecodingFailed`] for component values no encoder
    ///   produces, [`BlurhashError::OutOfMemory`] if the buffer cannot be
    ///   allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use blurhash_decoder::BlurHashDecoder;
    /// let decoder = BlurHashDecoder::new();
    /// let image = decoder.decode("LEHV6nWB2yk8pyo0adR*.7kCMdnj", 32, 32, 1.0).unwrap();
    /// assert_eq!(image.as_bytes().len(), 32 * 32 * 3);
    /// ```
    pub fn decode(
        &self,
        blurhash: &str,
        width: u32,
        height: u32,
        punch: f64,
    ) -> Result<PixelBuffer, BlurhashError> {
        self.decode_with_cancel(blurhash, width, height, punch, &AtomicBool::new(false))
    }

    /// Like [`decode`](Self::decode), but gives up with
    /// [`BlurhashError::Cancelled`] once `cancelled` is set. The flag is
    /// checked before allocating and at the start of every output row.
    pub fn decode_with_cancel(
        &self,
        blurhash: &str,
        width: u32,
        height: u32,
        punch: f64,
        cancelled: &AtomicBool,
    ) -> Result<PixelBuffer, BlurhashError> {
        validate_dimensions(width, height, MAX_DIMENSION)?;
        validate_punch(punch)?;
        let (size_x, size_y) = validate_hash(blurhash)?;
        let colours = decode_colours(blurhash, size_x, size_y, punch)?;
        if cancelled.load(Ordering::Relaxed) {
            return Err(BlurhashError::Cancelled);
        }

        let cos_x = self.cosines(width, size_x);
        let cos_y = self.cosines(height, size_y);
        let mut image = PixelBuffer::try_zeroed(width, height)?;

        let w = width as usize;
        let h = height as usize;
        let sx = size_x as usize;
        let sy = size_y as usize;

        let render_row = |(y, row): (usize, &mut [u8])| {
            if cancelled.load(Ordering::Relaxed) {
                return;
            }
            for (x, out) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let mut rgb = [0.0f64; 3];
                for j in 0..sy {
                    let cy = cos_y[j * h + y];
                    for i in 0..sx {
                        let basis = cos_x[i * w + x] * cy;
                        let colour = &colours[i + j * sx];
                        rgb[0] += colour[0] * basis;
                        rgb[1] += colour[1] * basis;
                        rgb[2] += colour[2] * basis;
                    }
                }
                out[0] = linear_to_srgb(rgb[0]);
                out[1] = linear_to_srgb(rgb[1]);
                out[2] = linear_to_srgb(rgb[2]);
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            image
                .as_bytes_mut()
                .par_chunks_mut(w * CHANNELS)
                .enumerate()
                .for_each(render_row);
        }
        #[cfg(not(feature = "parallel"))]
        image
            .as_bytes_mut()
            .chunks_mut(w * CHANNELS)
            .enumerate()
            .for_each(render_row);

        if cancelled.load(Ordering::Relaxed) {
            return Err(BlurhashError::Cancelled);
        }
        Ok(image)
    }

    /// Drop every memoized cosine table.
    pub fn clear_cache(&self) {
        self.cosines.clear();
    }

    /// Number of memoized cosine tables.
    pub fn cached_tables(&self) -> usize {
        self.cosines.len()
    }

    fn cosines(&self, dimension: u32, components: u32) -> Arc<[f64]> {
        let key = (dimension, components);
        if let Some(table) = self.cosines.get(&key) {
            return Arc::clone(table.value());
        }
        let table: Arc<[f64]> = cosine_table(dimension, components).into();
        if self.cosines.len() >= COSINE_CACHE_LIMIT {
            self.cosines.clear();
        }
        let entry = self.cosines.entry(key).or_insert(table);
        Arc::clone(entry.value())
    }
}

/// Decode a BlurHash with a throw-away [`BlurHashDecoder`].
///
/// Prefer a long-lived decoder when decoding many hashes at the same size.
///
/// ```
/// use blurhash_decoder::decode;
/// let image = decode("LEHV6nWB2yk8pyo0adR*.7kCMdnj", 8, 8, 1.0).unwrap();
/// assert_eq!((image.width(), image.height()), (8, 8));
/// ```
pub fn decode(
    blurhash: &str,
    width: u32,
    height: u32,
    punch: f64,
) -> Result<PixelBuffer, BlurhashError> {
    BlurHashDecoder::new().decode(blurhash, width, height, punch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_HASH: &str = "LEHV6nWB2yk8pyo0adR*.7kCMdnj";

    /// A 1x1-component hash whose DC colour is `rgb`.
    fn solid_hash(rgb: u32) -> String {
        format!("00{}", base83::encode(rgb as u64, 4).unwrap())
    }

    #[test]
    fn test_components_extraction() {
        assert_eq!(components(KNOWN_HASH).unwrap(), (4, 3));
        assert_eq!(components(&solid_hash(0)).unwrap(), (1, 1));
    }

    #[test]
    fn test_components_too_short() {
        assert!(matches!(
            components("ABC"),
            Err(BlurhashError::InvalidLength { expected: 6, actual: 3 })
        ));
    }

    #[test]
    fn test_components_header_out_of_range() {
        // '~' = 82 -> 82 / 9 + 1 = 10 vertical components.
        assert!(matches!(
            components("~00000"),
            Err(BlurhashError::InvalidComponentCount { component: "y", value: 10 })
        ));
    }

    #[test]
    fn test_validate_hash_length_mismatch() {
        assert_eq!(
            validate_hash("L00000").unwrap_err(),
            BlurhashError::InvalidLength {
                expected: 28,
                actual: 6
            }
        );
        assert!(validate_hash(&format!("{KNOWN_HASH}0")).is_err());
    }

    #[test]
    fn test_validate_hash_non_ascii() {
        let err = validate_hash("LEHV6nWB2yk8pyo0adR*.7kCMdné").unwrap_err();
        assert_eq!(err, BlurhashError::InvalidBase83Character('é'));
    }

    #[test]
    fn test_validate_dimensions() {
        assert!(validate_dimensions(1, 1, MAX_DIMENSION).is_ok());
        assert!(validate_dimensions(4096, 4096, MAX_DIMENSION).is_ok());
        assert!(validate_dimensions(0, 10, MAX_DIMENSION).is_err());
        assert!(validate_dimensions(10, 4097, MAX_DIMENSION).is_err());
        assert!(validate_dimensions(1001, 10, 1000).is_err());
    }

    #[test]
    fn test_validate_punch_rejects_out_of_range() {
        assert!(validate_punch(0.1).is_ok());
        assert!(validate_punch(10.0).is_ok());
        assert_eq!(
            validate_punch(0.09).unwrap_err(),
            BlurhashError::InvalidPunch(0.09)
        );
        assert!(validate_punch(10.5).is_err());
        assert!(validate_punch(f64::NAN).is_err());
        assert!(validate_punch(f64::INFINITY).is_err());
    }

    #[test]
    fn test_decode_output_size() {
        let image = decode(KNOWN_HASH, 32, 16, 1.0).unwrap();
        assert_eq!(image.width(), 32);
        assert_eq!(image.height(), 16);
        assert_eq!(image.as_bytes().len(), 32 * 16 * 3);
    }

    #[test]
    fn test_decode_solid_colour() {
        let image = decode(&solid_hash(0x80_40_20), 4, 4, 1.0).unwrap();
        for px in image.pixels() {
            assert_eq!(px, [0x80, 0x40, 0x20]);
        }
    }

    #[test]
    fn test_decode_dc_out_of_range() {
        // "~~~~" decodes to 83^4 - 1, far beyond 24 bits.
        assert!(matches!(
            decode("00~~~~", 4, 4, 1.0),
            Err(BlurhashError::DecodingFailed(_))
        ));
    }

    #[test]
    fn test_decode_ac_out_of_range() {
        // 2x1 components: header '1', one AC pair "~~" = 6888 > 6858.
        let hash = format!("10{}~~", base83::encode(0x808080, 4).unwrap());
        assert!(matches!(
            decode(&hash, 4, 4, 1.0),
            Err(BlurhashError::DecodingFailed(_))
        ));
    }

    #[test]
    fn test_decode_punch_changes_output() {
        let normal = decode(KNOWN_HASH, 4, 4, 1.0).unwrap();
        let punched = decode(KNOWN_HASH, 4, 4, 2.0).unwrap();
        assert_ne!(normal, punched);
    }

    #[test]
    fn test_cosine_tables_are_memoized() {
        let decoder = BlurHashDecoder::new();
        decoder.decode(KNOWN_HASH, 16, 16, 1.0).unwrap();
        // (16, 4) for x and (16, 3) for y.
        assert_eq!(decoder.cached_tables(), 2);
        decoder.decode(KNOWN_HASH, 16, 16, 1.0).unwrap();
        assert_eq!(decoder.cached_tables(), 2);
        decoder.clear_cache();
        assert_eq!(decoder.cached_tables(), 0);
    }

    #[test]
    fn test_cosine_cache_is_bounded() {
        let decoder = BlurHashDecoder::new();
        for size in 1..=40 {
            decoder.decode(KNOWN_HASH, size, size, 1.0).unwrap();
        }
        assert!(decoder.cached_tables() <= COSINE_CACHE_LIMIT);
    }

    #[test]
    fn test_cached_and_fresh_decoders_agree() {
        let warm = BlurHashDecoder::new();
        let first = warm.decode(KNOWN_HASH, 20, 12, 1.5).unwrap();
        let second = warm.decode(KNOWN_HASH, 20, 12, 1.5).unwrap();
        let fresh = decode(KNOWN_HASH, 20, 12, 1.5).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_decode_with_cancel() {
        let decoder = BlurHashDecoder::new();
        let cancelled = AtomicBool::new(true);
        assert_eq!(
            decoder.decode_with_cancel(KNOWN_HASH, 16, 16, 1.0, &cancelled),
            Err(BlurhashError::Cancelled)
        );

        cancelled.store(false, Ordering::Relaxed);
        let image = decoder
            .decode_with_cancel(KNOWN_HASH, 16, 16, 1.0, &cancelled)
            .unwrap();
        assert_eq!(image, decoder.decode(KNOWN_HASH, 16, 16, 1.0).unwrap());
    }

    #[test]
    fn test_cancel_does_not_mask_validation() {
        let cancelled = AtomicBool::new(true);
        assert!(matches!(
            BlurHashDecoder::new().decode_with_cancel(KNOWN_HASH, 0, 16, 1.0, &cancelled),
            Err(BlurhashError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_cosine_table_layout() {
        let table = cosine_table(4, 2);
        assert_eq!(table.len(), 8);
        assert!(table[..4].iter().all(|&c| (c - 1.0).abs() < 1e-12));
        // cos(pi * 2 * 1 / 4) = cos(pi / 2) = 0
        assert!(table[4 + 2].abs() < 1e-12);
    }
}

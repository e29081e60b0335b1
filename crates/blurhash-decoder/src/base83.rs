//! Base83 digits used by the BlurHash format.
//!
//! Every character of a BlurHash string is a digit in a custom 83-symbol
//! alphabet. Multi-character fields (the DC colour, the AC triples) are
//! big-endian base83 numbers.

use crate::error::BlurhashError;

/// The 83-character alphabet used by BlurHash base83 encoding.
pub const ALPHABET: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

const INVALID: u8 = 255;

const fn build_decode_lut() -> [u8; 128] {
    let mut lut = [INVALID; 128];
    let mut i = 0;
    while i < 83 {
        lut[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    lut
}

/// ASCII byte -> digit value, `INVALID` for bytes outside the alphabet.
static DECODE_LUT: [u8; 128] = build_decode_lut();

#[inline]
fn digit(byte: u8) -> Option<u8> {
    match DECODE_LUT.get(byte as usize) {
        Some(&d) if d != INVALID => Some(d),
        _ => None,
    }
}

/// Whether `ch` is part of the base83 alphabet.
///
/// ```
/// use blurhash_decoder::base83::is_valid;
/// assert!(is_valid('~'));
/// assert!(!is_valid('!'));
/// ```
pub fn is_valid(ch: char) -> bool {
    ch.is_ascii() && digit(ch as u8).is_some()
}

/// Decode a base83 string into an integer.
///
/// # Errors
///
/// Returns [`BlurhashError::InvalidBase83Character`] if the string contains
/// a character not in the base83 alphabet, or [`BlurhashError::EncodingError`]
/// if the value does not fit in a `u64`.
///
/// # Examples
///
/// ```
/// use blurhash_decoder::base83::decode;
/// assert_eq!(decode("0").unwrap(), 0);
/// assert_eq!(decode("~").unwrap(), 82);
/// ```
pub fn decode(base83_str: &str) -> Result<u64, BlurhashError> {
    base83_str.chars().try_fold(0u64, |value, ch| {
        let d = if ch.is_ascii() { digit(ch as u8) } else { None }
            .ok_or(BlurhashError::InvalidBase83Character(ch))?;
        value
            .checked_mul(83)
            .and_then(|v| v.checked_add(d as u64))
            .ok_or_else(|| {
                BlurhashError::EncodingError(format!(
                    "base83 value overflow decoding {base83_str:?}"
                ))
            })
    })
}

/// Encode an integer into a base83 string of exactly `length` digits.
///
/// # Errors
///
/// Returns [`BlurhashError::EncodingError`] if the value is too large to
/// be represented in the given number of digits.
///
/// # Examples
///
/// ```
/// use blurhash_decoder::base83::encode;
/// assert_eq!(encode(0, 1).unwrap(), "0");
/// assert_eq!(encode(83, 2).unwrap(), "10");
/// ```
pub fn encode(value: u64, length: usize) -> Result<String, BlurhashError> {
    let max_value = 83u64.checked_pow(length as u32).unwrap_or(u64::MAX);
    if value >= max_value {
        return Err(BlurhashError::EncodingError(format!(
            "value {value} is too large for {length} base83 digits (max {})",
            max_value - 1
        )));
    }

    let mut digits = vec![0u8; length];
    let mut remaining = value;
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(remaining % 83) as usize];
        remaining /= 83;
    }
    Ok(digits.into_iter().map(char::from).collect())
}

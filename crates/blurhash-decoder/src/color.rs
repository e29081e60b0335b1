//! sRGB <-> linear RGB conversion.
//!
//! The forward direction (byte -> linear) goes through a table computed at
//! compile time. The inverse runs the piecewise sRGB transfer function
//! directly, since its input is a continuous sum of cosine terms.

/// `base^2.4` in const context via `x^2.4 = x^2 * (x^2)^(1/5)`.
const fn const_pow_2_4(base: f64) -> f64 {
    if base <= 0.0 {
        return 0.0;
    }
    let x2 = base * base;
    x2 * const_nth_root(x2, 5)
}

/// Newton iteration for the nth root, usable in const context.
const fn const_nth_root(value: f64, n: u32) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    if value == 1.0 {
        return 1.0;
    }
    let mut x = if value < 1.0 { 1.0 } else { value };
    let nf = n as f64;
    let nm1 = (n - 1) as f64;
    let mut i = 0;
    while i < 100 {
        let mut xpow = 1.0;
        let mut j = 0;
        while j < n - 1 {
            xpow *= x;
            j += 1;
        }
        let next = (nm1 * x + value / xpow) / nf;
        let diff = if next > x { next - x } else { x - next };
        if diff < 1e-15 {
            return next;
        }
        x = next;
        i += 1;
    }
    x
}

const fn build_srgb_to_linear_lut() -> [f64; 256] {
    let mut lut = [0.0f64; 256];
    let mut i = 0u32;
    while i < 256 {
        let value = i as f64 / 255.0;
        lut[i as usize] = if value <= 0.04045 {
            value / 12.92
        } else {
            const_pow_2_4((value + 0.055) / 1.055)
        };
        i += 1;
    }
    lut
}

static SRGB_TO_LINEAR_LUT: [f64; 256] = build_srgb_to_linear_lut();

/// Convert an sRGB byte value (0..=255) to linear RGB (0.0..=1.0).
///
/// # Examples
///
/// ```
/// use blurhash_decoder::color::srgb_to_linear;
/// assert!((srgb_to_linear(0) - 0.0).abs() < 1e-10);
/// assert!((srgb_to_linear(255) - 1.0).abs() < 1e-10);
/// ```
#[inline]
pub fn srgb_to_linear(value: u8) -> f64 {
    SRGB_TO_LINEAR_LUT[value as usize]
}

/// Convert a linear RGB value to an sRGB byte, clamping to `[0.0, 1.0]`
/// first. NaN maps to 0.
///
/// # Examples
///
/// ```
/// use blurhash_decoder::color::linear_to_srgb;
/// assert_eq!(linear_to_srgb(0.0), 0);
/// assert_eq!(linear_to_srgb(1.0), 255);
/// assert_eq!(linear_to_srgb(7.5), 255);
/// ```
#[inline]
pub fn linear_to_srgb(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    let v = value.clamp(0.0, 1.0);
    let encoded = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Compute `sign(value) * |value|^exp`.
///
/// # Examples
///
/// ```
/// use blurhash_decoder::color::sign_pow;
/// assert!((sign_pow(-0.5, 2.0) + 0.25).abs() < 1e-12);
/// ```
#[inline]
pub fn sign_pow(value: f64, exp: f64) -> f64 {
    value.abs().powf(exp).copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_to_linear_known_values() {
        let val = srgb_to_linear(128);
        assert!((val - 0.2158605).abs() < 1e-6, "got {val}");
        // Linear segment below the 0.04045 knee.
        assert!((srgb_to_linear(10) - (10.0 / 255.0) / 12.92).abs() < 1e-12);
    }

    #[test]
    fn test_linear_to_srgb_clamp() {
        assert_eq!(linear_to_srgb(-0.5), 0);
        assert_eq!(linear_to_srgb(1.5), 255);
        assert_eq!(linear_to_srgb(f64::NAN), 0);
        assert_eq!(linear_to_srgb(f64::INFINITY), 255);
    }

    #[test]
    fn test_roundtrip_srgb_is_exact() {
        for i in 0..=255u8 {
            assert_eq!(linear_to_srgb(srgb_to_linear(i)), i, "roundtrip failed for {i}");
        }
    }

    #[test]
    fn test_srgb_to_linear_monotonic() {
        let mut prev = srgb_to_linear(0);
        for i in 1..=255u8 {
            let curr = srgb_to_linear(i);
            assert!(curr > prev, "not monotonic at {i}: {prev} >= {curr}");
            prev = curr;
        }
    }

    #[test]
    fn test_sign_pow() {
        assert!((sign_pow(4.0, 0.5) - 2.0).abs() < 1e-10);
        assert!((sign_pow(-4.0, 0.5) + 2.0).abs() < 1e-10);
        assert!((sign_pow(-3.0, 2.0) + 9.0).abs() < 1e-10);
        assert_eq!(sign_pow(0.0, 2.0), 0.0);
    }
}

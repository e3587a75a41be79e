//! Little-endian integer I/O and a portable encoding for `f64`.
//!
//! Integers are always stored little-endian regardless of the host. Doubles are
//! stored as a scaled integer mantissa plus a binary exponent (see
//! [`encode_f64`]), which keeps the file format independent of how the host lays
//! out IEEE-754 values.
//!
//! # Example
//!
//! ```
//! use surge_core::codec::{decode_f64, encode_f64};
//!
//! let bytes = encode_f64(3.14);
//! assert_eq!(bytes.len(), 11);
//! assert_eq!(decode_f64(&bytes), Some(3.14));
//!
//! assert_eq!(encode_f64(f64::INFINITY), b"+inf");
//! ```

use std::io::{self, Read, Write};

/// Leading tag of a finite encoded double.
pub const F64_TAG: u8 = b'x';

/// Size in bytes of a finite encoded double: tag, `i64` mantissa, `i16` exponent.
pub const F64_ENCODED_LEN: usize = 1 + 8 + 2;

const NAN: &[u8] = b"nan";
const POS_INF: &[u8] = b"+inf";
const NEG_INF: &[u8] = b"-inf";

macro_rules! le_io {
    ($write:ident, $read:ident, $ty:ty, $n:expr) => {
        #[doc = concat!("Writes a `", stringify!($ty), "` in little-endian order.")]
        pub fn $write<W: Write>(writer: &mut W, value: $ty) -> io::Result<()> {
            writer.write_all(&value.to_le_bytes())
        }

        #[doc = concat!("Reads a little-endian `", stringify!($ty), "`.")]
        pub fn $read<R: Read>(reader: &mut R) -> io::Result<$ty> {
            let mut buf = [0u8; $n];
            reader.read_exact(&mut buf)?;
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

le_io!(write_u8, read_u8, u8, 1);
le_io!(write_u16, read_u16, u16, 2);
le_io!(write_u32, read_u32, u32, 4);
le_io!(write_u64, read_u64, u64, 8);
le_io!(write_i16, read_i16, i16, 2);
le_io!(write_i32, read_i32, i32, 4);
le_io!(write_i64, read_i64, i64, 8);

/// Splits `x` into a mantissa in `[0.5, 1)` (by magnitude) and a power of two.
///
/// Zero, infinities and NaN are returned unchanged with exponent 0.
pub fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }

    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // subnormal: scale into the normal range first
        let (m, e) = frexp(x * 2f64.powi(54));
        return (m, e - 54);
    }

    let mantissa_bits = (bits & !(0x7ff << 52)) | (1022 << 52);
    (f64::from_bits(mantissa_bits), biased - 1022)
}

/// Computes `m * 2^e` without overflowing the intermediate power of two.
pub fn ldexp(m: f64, e: i32) -> f64 {
    let mut x = m;
    let mut e = e;
    while e > 1000 {
        x *= 2f64.powi(1000);
        e -= 1000;
    }
    while e < -1000 {
        x *= 2f64.powi(-1000);
        e += 1000;
    }
    x * 2f64.powi(e)
}

/// Encodes a double portably.
///
/// Finite values become `'x'`, the `frexp` mantissa scaled by `i64::MAX` as a
/// little-endian `i64`, and the exponent as a little-endian `i16`. Non-finite values
/// become the literal strings `"nan"`, `"+inf"` or `"-inf"`.
pub fn encode_f64(value: f64) -> Vec<u8> {
    if value.is_nan() {
        return NAN.to_vec();
    }
    if value.is_infinite() {
        return if value > 0.0 { POS_INF } else { NEG_INF }.to_vec();
    }

    let (m, e) = frexp(value);
    let mantissa = (m * i64::MAX as f64) as i64;

    let mut out = Vec::with_capacity(F64_ENCODED_LEN);
    out.push(F64_TAG);
    out.extend_from_slice(&mantissa.to_le_bytes());
    out.extend_from_slice(&(e as i16).to_le_bytes());
    out
}

/// Decodes a double produced by [`encode_f64`].
///
/// Dispatches on the leading byte and the length; returns `None` for anything
/// that is not a recognised encoding.
pub fn decode_f64(bytes: &[u8]) -> Option<f64> {
    match bytes {
        [F64_TAG, rest @ ..] if bytes.len() == F64_ENCODED_LEN => {
            let mut mantissa = [0u8; 8];
            mantissa.copy_from_slice(&rest[..8]);
            let exponent = i16::from_le_bytes([rest[8], rest[9]]);
            let m = i64::from_le_bytes(mantissa) as f64 / i64::MAX as f64;
            Some(ldexp(m, exponent as i32))
        }
        b if b == NAN => Some(f64::NAN),
        b if b == POS_INF => Some(f64::INFINITY),
        b if b == NEG_INF => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integers_are_little_endian() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x1122_3344).unwrap();
        write_u16(&mut buf, 0xAABB).unwrap();
        assert_eq!(buf, [0x44, 0x33, 0x22, 0x11, 0xBB, 0xAA]);

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0x1122_3344);
        assert_eq!(read_u16(&mut cursor).unwrap(), 0xAABB);
    }

    #[test]
    fn short_read_is_an_error() {
        let mut cursor = Cursor::new(vec![1u8, 2]);
        assert!(read_u32(&mut cursor).is_err());
    }

    #[test]
    fn frexp_ranges() {
        for x in [1.0, -1.0, 0.3, 1234.5678, -1e300, 5e-324, f64::MAX] {
            let (m, e) = frexp(x);
            assert!((0.5..1.0).contains(&m.abs()), "mantissa of {x}: {m}");
            assert_eq!(ldexp(m, e), x);
        }
        assert_eq!(frexp(0.0), (0.0, 0));
    }

    #[test]
    fn finite_values_roundtrip() {
        for x in [0.0, 1.0, -2.5, 3.14, 1e-300, -7.25e200, f64::MAX, f64::MIN_POSITIVE] {
            let bytes = encode_f64(x);
            assert_eq!(bytes.len(), F64_ENCODED_LEN);
            assert_eq!(bytes[0], F64_TAG);
            assert_eq!(decode_f64(&bytes), Some(x));
        }
    }

    #[test]
    fn non_finite_values_use_literals() {
        assert_eq!(encode_f64(f64::NAN), b"nan");
        assert_eq!(encode_f64(f64::INFINITY), b"+inf");
        assert_eq!(encode_f64(f64::NEG_INFINITY), b"-inf");

        assert!(decode_f64(b"nan").unwrap().is_nan());
        assert_eq!(decode_f64(b"+inf"), Some(f64::INFINITY));
        assert_eq!(decode_f64(b"-inf"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert_eq!(decode_f64(b""), None);
        assert_eq!(decode_f64(b"inf"), None);
        assert_eq!(decode_f64(b"x123"), None);
    }
}

//! Primitive wire types and the lossless conversions between them.
//!
//! A field's *stored type* may differ from its logical type (a `u8` on the wire widened to
//! `i32` in memory, an enum stored as `u16`, a `f32` stored as a half float). Conversions go
//! through [`Value`] and succeed only when the value survives the round trip unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The primitive representations the codec can read and write directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F16,
    F32,
    F64,
    Decimal,
    Guid,
}

impl PrimitiveKind {
    /// Size in bytes on the wire.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
            Self::Decimal | Self::Guid => 16,
        }
    }

    /// Lower-case type name, as used in `store = "..."` attributes.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Guid => "guid",
        }
    }

    /// Integer kinds, including `bool`.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::U8
                | Self::I8
                | Self::U16
                | Self::I16
                | Self::U32
                | Self::I32
                | Self::U64
                | Self::I64
        )
    }

    /// Kinds that can serve as a version number.
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::F16 | Self::F32 | Self::F64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single primitive read from or about to be written to a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F16(Half),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Guid(Uuid),
}

impl Value {
    /// The kind of this value.
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Bool(_) => PrimitiveKind::Bool,
            Self::U8(_) => PrimitiveKind::U8,
            Self::I8(_) => PrimitiveKind::I8,
            Self::U16(_) => PrimitiveKind::U16,
            Self::I16(_) => PrimitiveKind::I16,
            Self::U32(_) => PrimitiveKind::U32,
            Self::I32(_) => PrimitiveKind::I32,
            Self::U64(_) => PrimitiveKind::U64,
            Self::I64(_) => PrimitiveKind::I64,
            Self::F16(_) => PrimitiveKind::F16,
            Self::F32(_) => PrimitiveKind::F32,
            Self::F64(_) => PrimitiveKind::F64,
            Self::Decimal(_) => PrimitiveKind::Decimal,
            Self::Guid(_) => PrimitiveKind::Guid,
        }
    }

    fn integer(self) -> Option<i128> {
        Some(match self {
            Self::Bool(v) => i128::from(v),
            Self::U8(v) => i128::from(v),
            Self::I8(v) => i128::from(v),
            Self::U16(v) => i128::from(v),
            Self::I16(v) => i128::from(v),
            Self::U32(v) => i128::from(v),
            Self::I32(v) => i128::from(v),
            Self::U64(v) => i128::from(v),
            Self::I64(v) => i128::from(v),
            _ => return None,
        })
    }

    fn float(self) -> Option<f64> {
        match self {
            Self::F16(v) => Some(f64::from(v.to_f32())),
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a version number or length. `None` for decimals and GUIDs.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        self.float().or_else(|| self.integer().map(|n| n as f64))
    }

    /// Converts to `to`, returning `None` unless the conversion is lossless.
    pub fn convert(self, to: PrimitiveKind) -> Option<Value> {
        if self.kind() == to {
            return Some(self);
        }
        if let Some(n) = self.integer() {
            return from_integer(n, to);
        }
        if let Some(x) = self.float() {
            return from_float(x, to);
        }
        None
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn from_integer(n: i128, to: PrimitiveKind) -> Option<Value> {
    Some(match to {
        PrimitiveKind::Bool => match n {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return None,
        },
        PrimitiveKind::U8 => Value::U8(u8::try_from(n).ok()?),
        PrimitiveKind::I8 => Value::I8(i8::try_from(n).ok()?),
        PrimitiveKind::U16 => Value::U16(u16::try_from(n).ok()?),
        PrimitiveKind::I16 => Value::I16(i16::try_from(n).ok()?),
        PrimitiveKind::U32 => Value::U32(u32::try_from(n).ok()?),
        PrimitiveKind::I32 => Value::I32(i32::try_from(n).ok()?),
        PrimitiveKind::U64 => Value::U64(u64::try_from(n).ok()?),
        PrimitiveKind::I64 => Value::I64(i64::try_from(n).ok()?),
        PrimitiveKind::F16 | PrimitiveKind::F32 | PrimitiveKind::F64 => {
            let x = n as f64;
            if x as i128 != n {
                return None;
            }
            return from_float(x, to);
        }
        PrimitiveKind::Decimal => Value::Decimal(Decimal::new(n, 0)?),
        PrimitiveKind::Guid => return None,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn from_float(x: f64, to: PrimitiveKind) -> Option<Value> {
    match to {
        PrimitiveKind::F64 => Some(Value::F64(x)),
        PrimitiveKind::F32 => {
            let y = x as f32;
            (f64::from(y) == x || x.is_nan()).then_some(Value::F32(y))
        }
        PrimitiveKind::F16 => {
            let h = Half::from_f32(x as f32);
            (f64::from(h.to_f32()) == x || x.is_nan()).then_some(Value::F16(h))
        }
        PrimitiveKind::Decimal | PrimitiveKind::Guid => None,
        _ => {
            if !x.is_finite() || x.fract() != 0.0 {
                return None;
            }
            let n = x as i128;
            if n as f64 != x {
                return None;
            }
            from_integer(n, to)
        }
    }
}

/// An IEEE 754 half-precision float, kept as its raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Half(pub u16);

impl Half {
    /// Rounds `value` to the nearest half-precision value (ties to even).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f32(value: f32) -> Self {
        let bits = value.to_bits();
        let sign = ((bits >> 16) & 0x8000) as u16;
        let exp = ((bits >> 23) & 0xFF) as i32;
        let mantissa = bits & 0x007F_FFFF;

        if exp == 0xFF {
            let nan = if mantissa != 0 { 0x0200 } else { 0 };
            return Self(sign | 0x7C00 | nan);
        }

        let unbiased = exp - 127 + 15;
        if unbiased >= 31 {
            return Self(sign | 0x7C00);
        }

        if unbiased <= 0 {
            if unbiased < -10 {
                return Self(sign);
            }
            // subnormal: shift the implicit bit into the 10-bit mantissa
            let m = mantissa | 0x0080_0000;
            let shift = (14 - unbiased) as u32;
            let truncated = m >> shift;
            let half_way = 1u32 << (shift - 1);
            let rest = m & ((half_way << 1) - 1);
            let rounded = if rest > half_way || (rest == half_way && truncated & 1 != 0) {
                truncated + 1
            } else {
                truncated
            };
            return Self(sign | rounded as u16);
        }

        let truncated = mantissa >> 13;
        let round_bit = (mantissa >> 12) & 1;
        let sticky = mantissa & 0x0FFF;
        let rounded = if round_bit != 0 && (sticky != 0 || truncated & 1 != 0) {
            truncated + 1
        } else {
            truncated
        };
        // a mantissa carry rolls into the exponent, up to infinity
        let magnitude = ((unbiased as u32) << 10) + rounded;
        Self(sign | magnitude as u16)
    }

    /// Widens to `f32`. Every half value is exactly representable.
    pub fn to_f32(self) -> f32 {
        let sign = u32::from(self.0 & 0x8000) << 16;
        let exp = u32::from((self.0 >> 10) & 0x1F);
        let mantissa = u32::from(self.0 & 0x03FF);
        match exp {
            0 => {
                #[allow(clippy::cast_precision_loss)]
                let magnitude = mantissa as f32 * f32::powi(2.0, -24);
                f32::from_bits(sign | magnitude.to_bits())
            }
            31 => f32::from_bits(sign | 0x7F80_0000 | (mantissa << 13)),
            _ => f32::from_bits(sign | ((exp + 112) << 23) | (mantissa << 13)),
        }
    }

    /// The raw bits.
    pub const fn to_bits(self) -> u16 {
        self.0
    }
}

impl From<Half> for f32 {
    fn from(value: Half) -> Self {
        value.to_f32()
    }
}

/// A 128-bit decimal: a 96-bit magnitude, a sign and a power-of-ten scale.
///
/// The four words are `[lo, mid, hi, flags]`, with the scale in bits 16..24 of `flags` and
/// the sign in bit 31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decimal {
    bits: [i32; 4],
}

impl Decimal {
    const SIGN_MASK: u32 = 0x8000_0000;

    /// Builds a decimal from its raw words.
    pub const fn from_bits(bits: [i32; 4]) -> Self {
        Self { bits }
    }

    /// The raw words.
    pub const fn bits(&self) -> [i32; 4] {
        self.bits
    }

    /// Builds `mantissa / 10^scale`. Returns `None` if the magnitude needs more than 96 bits
    /// or the scale exceeds 28.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >> 96 != 0 || scale > 28 {
            return None;
        }
        let mut flags = u32::from(scale) << 16;
        if mantissa < 0 {
            flags |= Self::SIGN_MASK;
        }
        Some(Self {
            bits: [
                magnitude as u32 as i32,
                (magnitude >> 32) as u32 as i32,
                (magnitude >> 64) as u32 as i32,
                flags as i32,
            ],
        })
    }

    /// Signed integer mantissa.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn mantissa(&self) -> i128 {
        let [lo, mid, hi, flags] = self.bits;
        let magnitude = u128::from(lo as u32)
            | (u128::from(mid as u32) << 32)
            | (u128::from(hi as u32) << 64);
        if flags as u32 & Self::SIGN_MASK != 0 {
            -(magnitude as i128)
        } else {
            magnitude as i128
        }
    }

    /// Power-of-ten scale.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn scale(&self) -> u8 {
        ((self.bits[3] as u32 >> 16) & 0xFF) as u8
    }

    /// Nearest `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        self.mantissa() as f64 / 10f64.powi(i32::from(self.scale()))
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_is_lossless() {
        assert_eq!(Value::U8(200).convert(PrimitiveKind::I32), Some(Value::I32(200)));
        assert_eq!(Value::I16(-5).convert(PrimitiveKind::I64), Some(Value::I64(-5)));
    }

    #[test]
    fn narrowing_checks_range() {
        assert_eq!(Value::I32(255).convert(PrimitiveKind::U8), Some(Value::U8(255)));
        assert_eq!(Value::I32(256).convert(PrimitiveKind::U8), None);
        assert_eq!(Value::I32(-1).convert(PrimitiveKind::U32), None);
    }

    #[test]
    fn float_integer_conversions() {
        assert_eq!(Value::F32(3.0).convert(PrimitiveKind::I16), Some(Value::I16(3)));
        assert_eq!(Value::F32(3.5).convert(PrimitiveKind::I16), None);
        assert_eq!(Value::I32(7).convert(PrimitiveKind::F32), Some(Value::F32(7.0)));
        assert_eq!(Value::U64(u64::MAX).convert(PrimitiveKind::F64), None);
        assert_eq!(Value::F64(0.1).convert(PrimitiveKind::F32), None);
    }

    #[test]
    fn bool_accepts_only_zero_or_one() {
        assert_eq!(Value::U8(1).convert(PrimitiveKind::Bool), Some(Value::Bool(true)));
        assert_eq!(Value::U8(2).convert(PrimitiveKind::Bool), None);
    }

    #[test]
    fn half_round_trips_representable_values() {
        for v in [0.0f32, 1.0, -2.5, 65504.0, 0.000_061_035_156, 5.960_464_5e-8] {
            assert_eq!(Half::from_f32(v).to_f32(), v);
        }
        assert_eq!(Half::from_f32(1.0).to_bits(), 0x3C00);
        assert!(Half::from_f32(1.0e6).to_f32().is_infinite());
        assert!(Half::from_f32(f32::NAN).to_f32().is_nan());
    }

    #[test]
    fn decimal_parts() {
        let d = Decimal::new(-12345, 2).expect("in range");
        assert_eq!(d.mantissa(), -12345);
        assert_eq!(d.scale(), 2);
        assert!((d.to_f64() + 123.45).abs() < 1e-9);
        assert!(Decimal::new(1 << 96, 0).is_none());
    }
}

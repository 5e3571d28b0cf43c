//! Byte order and text encoding settings shared by readers, writers and buffer views.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};

/// The order in which the bytes of a multi-byte value are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant byte first.
    #[default]
    LittleEndian,
    /// Most significant byte first.
    BigEndian,
}

impl ByteOrder {
    /// The byte order of the running platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LittleEndian
        } else {
            Self::BigEndian
        }
    }

    /// Returns `true` when values in this order can be used without byte swapping.
    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::native()),
            (Self::LittleEndian, Self::LittleEndian) | (Self::BigEndian, Self::BigEndian)
        )
    }

    /// The opposite order.
    pub const fn reversed(self) -> Self {
        match self {
            Self::LittleEndian => Self::BigEndian,
            Self::BigEndian => Self::LittleEndian,
        }
    }
}

/// Reverses every `pack`-sized run of `bytes` in place.
///
/// A pack size of 0 or 1 leaves the bytes untouched. Trailing bytes that do not fill a whole
/// pack are left as they are.
pub fn reverse_packs(bytes: &mut [u8], pack: usize) {
    if pack <= 1 {
        return;
    }
    for run in bytes.chunks_exact_mut(pack) {
        run.reverse();
    }
}

/// Character encoding used for string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8 (default).
    #[default]
    Utf8,
    /// UTF-16, little-endian code units.
    Utf16Le,
    /// UTF-16, big-endian code units.
    Utf16Be,
    /// ISO-8859-1; every byte is one character.
    Latin1,
}

impl TextEncoding {
    /// Size in bytes of one code unit. Null terminators are one unit wide.
    pub const fn unit_size(self) -> usize {
        match self {
            Self::Utf8 | Self::Latin1 => 1,
            Self::Utf16Le | Self::Utf16Be => 2,
        }
    }

    /// Encodes `text` into bytes.
    ///
    /// # Errors
    /// Returns [`CodecError::Encoding`] for Latin-1 text containing characters above U+00FF.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        CodecError::Encoding(format!("'{c}' is not representable in Latin-1"))
                    })
                })
                .collect(),
        }
    }

    /// Decodes `bytes` into a string.
    ///
    /// # Errors
    /// Returns [`CodecError::Encoding`] for malformed UTF-8 or UTF-16 data.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| CodecError::Encoding(e.to_string())),
            Self::Utf16Le | Self::Utf16Be => {
                let units = bytes.chunks_exact(2).map(|c| match self {
                    Self::Utf16Be => u16::from_be_bytes([c[0], c[1]]),
                    _ => u16::from_le_bytes([c[0], c[1]]),
                });
                char::decode_utf16(units)
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|e| CodecError::Encoding(e.to_string()))
            }
            Self::Latin1 => Ok(bytes.iter().copied().map(char::from).collect()),
        }
    }

    /// Decodes `bytes`, replacing malformed sequences with U+FFFD.
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf16Le | Self::Utf16Be => {
                let units = bytes.chunks_exact(2).map(|c| match self {
                    Self::Utf16Be => u16::from_be_bytes([c[0], c[1]]),
                    _ => u16::from_le_bytes([c[0], c[1]]),
                });
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
            Self::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }

    /// Position of the first null unit in `bytes`, aligned to the unit size.
    pub(crate) fn find_terminator(self, bytes: &[u8]) -> Option<usize> {
        let unit = self.unit_size();
        bytes
            .chunks_exact(unit)
            .position(|c| c.iter().all(|b| *b == 0))
            .map(|i| i * unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_packs_of_one_is_identity() {
        let mut bytes = [1u8, 2, 3, 4];
        reverse_packs(&mut bytes, 1);
        assert_eq!(bytes, [1, 2, 3, 4]);
    }

    #[test]
    fn reverse_packs_reverses_each_run() {
        let mut bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        reverse_packs(&mut bytes, 4);
        assert_eq!(bytes, [4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn utf16_terminator_is_unit_aligned() {
        // 'A' = 0x0041 little-endian, then 0x0100 ('Ā'), then terminator
        let bytes = [0x41, 0x00, 0x00, 0x01, 0x00, 0x00];
        assert_eq!(TextEncoding::Utf16Le.find_terminator(&bytes), Some(4));
        assert_eq!(TextEncoding::Utf8.find_terminator(&bytes), Some(1));
    }

    #[test]
    fn latin1_rejects_wide_chars() {
        assert!(TextEncoding::Latin1.encode("é").is_ok());
        assert!(TextEncoding::Latin1.encode("€").is_err());
    }
}

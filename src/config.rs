//! Reader and writer defaults.

use crate::order::{ByteOrder, TextEncoding};
use serde::{Deserialize, Serialize};

/// Defaults applied by [`crate::EndianReader::with_config`] and
/// [`crate::EndianWriter::with_config`].
///
/// ```rust
/// use layoutio::{ByteOrder, CodecConfig, TextEncoding};
///
/// let config = CodecConfig::default()
///     .with_byte_order(ByteOrder::BigEndian)
///     .with_encoding(TextEncoding::Latin1);
/// assert!(config.plan_cache);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Ambient byte order for fields without an override.
    pub byte_order: ByteOrder,
    /// Encoding for string fields.
    pub encoding: TextEncoding,
    /// Reuse compiled layout plans across calls.
    pub plan_cache: bool,
    /// Upper bound, in bytes, for null-terminated strings without a cap and for
    /// length-prefixed strings.
    pub max_string_len: usize,
}

impl CodecConfig {
    /// Default cap on variable-length strings (1 MiB).
    pub const DEFAULT_MAX_STRING_LEN: usize = 1024 * 1024;

    /// Sets the ambient byte order.
    #[must_use]
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Sets the string encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enables or disables the compiled plan cache.
    #[must_use]
    pub fn with_plan_cache(mut self, enabled: bool) -> Self {
        self.plan_cache = enabled;
        self
    }

    /// Sets the variable-length string cap.
    #[must_use]
    pub fn with_max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            encoding: TextEncoding::Utf8,
            plan_cache: true,
            max_string_len: Self::DEFAULT_MAX_STRING_LEN,
        }
    }
}

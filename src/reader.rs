//! Endian-aware reading of primitives and strings.
//!
//! [`EndianReader`] wraps any `Read + Seek` stream. Every position it reports and every seek it
//! performs is relative to its *origin*, so a reader created with
//! [`EndianReader::virtual_reader_at`] sees an arbitrary window of the stream as starting at
//! address zero.
//!
//! Virtual readers borrow the parent's stream mutably. They share its single cursor, add no
//! buffering of their own, and cannot close the stream, because they never own it.
//!
//! ```rust
//! use layoutio::{ByteOrder, EndianReader};
//! use std::io::{Cursor, SeekFrom};
//!
//! let data = vec![0xAA, 0xBB, 0x00, 0x00, 0x01, 0x02];
//! let mut reader = EndianReader::new(Cursor::new(data), ByteOrder::BigEndian);
//! reader.seek(SeekFrom::Start(4))?;
//! assert_eq!(reader.peek_u16()?, 0x0102);
//! assert_eq!(reader.position()?, 4);
//!
//! let mut window = reader.virtual_reader_at(2)?;
//! window.seek(SeekFrom::Start(2))?;
//! assert_eq!(window.read_u16()?, 0x0102);
//! # Ok::<(), layoutio::CodecError>(())
//! ```

use crate::buffer::{Bufferable, BufferedCollection};
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::io::{read_up_to, seek_target, stream_len};
use crate::layout::StringRule;
use crate::order::{ByteOrder, TextEncoding, reverse_packs};
use crate::value::{Decimal, Half, PrimitiveKind, Value};
use byteorder::{BigEndian as BE, LittleEndian as LE, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use uuid::Uuid;

macro_rules! read_primitives {
    ($($ty:ty => $read:ident, $read_with:ident, $peek:ident, $peek_with:ident;)*) => {
        $(
            #[doc = concat!("Reads a `", stringify!($ty), "` in the reader's byte order.")]
            pub fn $read(&mut self) -> Result<$ty> {
                self.$read_with(self.order)
            }

            #[doc = concat!("Reads a `", stringify!($ty), "` in `order`.")]
            pub fn $read_with(&mut self, order: ByteOrder) -> Result<$ty> {
                Ok(match order {
                    ByteOrder::LittleEndian => self.inner.$read::<LE>()?,
                    ByteOrder::BigEndian => self.inner.$read::<BE>()?,
                })
            }

            #[doc = concat!("Reads a `", stringify!($ty), "` without advancing.")]
            pub fn $peek(&mut self) -> Result<$ty> {
                self.peek(Self::$read)
            }

            #[doc = concat!("Reads a `", stringify!($ty), "` in `order` without advancing.")]
            pub fn $peek_with(&mut self, order: ByteOrder) -> Result<$ty> {
                self.peek(|r| r.$read_with(order))
            }
        )*
    };
}

/// Reads primitives, strings and declared structures from a seekable stream.
#[derive(Debug)]
pub struct EndianReader<R> {
    inner: R,
    origin: u64,
    order: ByteOrder,
    encoding: TextEncoding,
    plan_cache: bool,
    max_string_len: usize,
}

impl<R: Read + Seek> EndianReader<R> {
    /// Wraps `inner` with the given ambient byte order and default settings otherwise.
    pub fn new(inner: R, order: ByteOrder) -> Self {
        Self::with_config(inner, &CodecConfig::default().with_byte_order(order))
    }

    /// Wraps `inner` using `config`.
    pub fn with_config(inner: R, config: &CodecConfig) -> Self {
        Self {
            inner,
            origin: 0,
            order: config.byte_order,
            encoding: config.encoding,
            plan_cache: config.plan_cache,
            max_string_len: config.max_string_len,
        }
    }

    /// The settings this reader currently uses.
    pub fn config(&self) -> CodecConfig {
        CodecConfig {
            byte_order: self.order,
            encoding: self.encoding,
            plan_cache: self.plan_cache,
            max_string_len: self.max_string_len,
        }
    }

    /// Ambient byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Changes the ambient byte order.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// String encoding.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Changes the string encoding.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// Whether compiled layout plans are reused.
    pub fn plan_cache(&self) -> bool {
        self.plan_cache
    }

    /// Absolute stream address that this reader treats as zero.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Shared access to the stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutable access to the stream. Moving its cursor moves this reader's cursor.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Total length of the underlying stream, ignoring the origin.
    pub fn stream_len(&mut self) -> Result<u64> {
        Ok(stream_len(&mut self.inner)?)
    }

    /// Position relative to the origin.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] if the shared cursor was moved before the origin.
    pub fn position(&mut self) -> Result<u64> {
        let absolute = self.inner.stream_position()?;
        absolute.checked_sub(self.origin).ok_or_else(|| {
            CodecError::bounds(format!(
                "cursor {absolute} is before the reader origin {}",
                self.origin
            ))
        })
    }

    /// Seeks relative to the origin (`Start`), the cursor (`Current`) or the stream end (`End`),
    /// returning the new position relative to the origin.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] if the target lies before the origin. The cursor is left where it
    /// was.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = seek_target(&mut self.inner, self.origin, pos)?;
        self.inner.seek(SeekFrom::Start(target))?;
        Ok(target - self.origin)
    }

    /// Seeks to `offset` from the origin.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        let absolute = self.absolute(offset)?;
        self.inner.seek(SeekFrom::Start(absolute))?;
        Ok(())
    }

    fn absolute(&self, offset: u64) -> Result<u64> {
        self.origin
            .checked_add(offset)
            .ok_or_else(|| CodecError::bounds(format!("offset {offset} overflows the stream")))
    }

    /// Creates a view whose address zero is `origin` bytes past this reader's origin.
    ///
    /// The view shares the stream and its cursor, which is moved to the new origin. It
    /// inherits this reader's settings.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] if the new origin lies past the end of the stream.
    pub fn virtual_reader_at(&mut self, origin: u64) -> Result<EndianReader<&mut R>> {
        let absolute = self.absolute(origin)?;
        let len = self.stream_len()?;
        if absolute > len {
            return Err(CodecError::bounds(format!(
                "virtual origin {absolute} is past the end of a {len}-byte stream"
            )));
        }
        self.inner.seek(SeekFrom::Start(absolute))?;
        Ok(EndianReader {
            inner: &mut self.inner,
            origin: absolute,
            order: self.order,
            encoding: self.encoding,
            plan_cache: self.plan_cache,
            max_string_len: self.max_string_len,
        })
    }

    /// Runs `f` and moves the cursor back to where it was, whether or not `f` succeeded.
    ///
    /// If `f` fails, its error is returned in preference to any error from restoring the
    /// cursor.
    pub fn peek<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let start = self.inner.stream_position()?;
        let result = f(self);
        let restored = self.inner.seek(SeekFrom::Start(start));
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Reads exactly `buf.len()` bytes.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    /// Reads one signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.inner.read_i8()?)
    }

    /// Reads one byte without advancing.
    pub fn peek_u8(&mut self) -> Result<u8> {
        self.peek(Self::read_u8)
    }

    /// Reads a byte as a boolean. Any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_primitives! {
        u16 => read_u16, read_u16_with, peek_u16, peek_u16_with;
        i16 => read_i16, read_i16_with, peek_i16, peek_i16_with;
        u32 => read_u32, read_u32_with, peek_u32, peek_u32_with;
        i32 => read_i32, read_i32_with, peek_i32, peek_i32_with;
        u64 => read_u64, read_u64_with, peek_u64, peek_u64_with;
        i64 => read_i64, read_i64_with, peek_i64, peek_i64_with;
        f32 => read_f32, read_f32_with, peek_f32, peek_f32_with;
        f64 => read_f64, read_f64_with, peek_f64, peek_f64_with;
    }

    /// Reads a half-precision float in the reader's byte order.
    pub fn read_f16(&mut self) -> Result<Half> {
        self.read_f16_with(self.order)
    }

    /// Reads a half-precision float in `order`.
    pub fn read_f16_with(&mut self, order: ByteOrder) -> Result<Half> {
        Ok(Half(self.read_u16_with(order)?))
    }

    /// Reads a half-precision float without advancing.
    pub fn peek_f16(&mut self) -> Result<Half> {
        self.peek(Self::read_f16)
    }

    /// Reads a 16-byte decimal in the reader's byte order.
    pub fn read_decimal(&mut self) -> Result<Decimal> {
        self.read_decimal_with(self.order)
    }

    /// Reads a 16-byte decimal in `order`.
    ///
    /// In big-endian data the whole 16-byte block is reversed, so the words appear in reverse
    /// order as well as byte-swapped.
    pub fn read_decimal_with(&mut self, order: ByteOrder) -> Result<Decimal> {
        let mut raw = [0u8; 16];
        self.inner.read_exact(&mut raw)?;
        let word = |i: usize| match order {
            ByteOrder::LittleEndian => <LE as byteorder::ByteOrder>::read_i32(&raw[i * 4..]),
            ByteOrder::BigEndian => <BE as byteorder::ByteOrder>::read_i32(&raw[i * 4..]),
        };
        let bits = match order {
            ByteOrder::LittleEndian => [word(0), word(1), word(2), word(3)],
            ByteOrder::BigEndian => [word(3), word(2), word(1), word(0)],
        };
        Ok(Decimal::from_bits(bits))
    }

    /// Reads a decimal without advancing.
    pub fn peek_decimal(&mut self) -> Result<Decimal> {
        self.peek(Self::read_decimal)
    }

    /// Reads a GUID in the reader's byte order.
    pub fn read_guid(&mut self) -> Result<Uuid> {
        self.read_guid_with(self.order)
    }

    /// Reads a GUID: an `i32`, two `i16` in `order`, then eight raw bytes.
    #[allow(clippy::cast_sign_loss)]
    pub fn read_guid_with(&mut self, order: ByteOrder) -> Result<Uuid> {
        let a = self.read_i32_with(order)?;
        let b = self.read_i16_with(order)?;
        let c = self.read_i16_with(order)?;
        let mut d = [0u8; 8];
        self.inner.read_exact(&mut d)?;
        Ok(Uuid::from_fields(a as u32, b as u16, c as u16, &d))
    }

    /// Reads a GUID without advancing.
    pub fn peek_guid(&mut self) -> Result<Uuid> {
        self.peek(Self::read_guid)
    }

    /// Reads one primitive of the given kind.
    pub fn read_value(&mut self, kind: PrimitiveKind, order: ByteOrder) -> Result<Value> {
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(self.read_bool()?),
            PrimitiveKind::U8 => Value::U8(self.read_u8()?),
            PrimitiveKind::I8 => Value::I8(self.read_i8()?),
            PrimitiveKind::U16 => Value::U16(self.read_u16_with(order)?),
            PrimitiveKind::I16 => Value::I16(self.read_i16_with(order)?),
            PrimitiveKind::U32 => Value::U32(self.read_u32_with(order)?),
            PrimitiveKind::I32 => Value::I32(self.read_i32_with(order)?),
            PrimitiveKind::U64 => Value::U64(self.read_u64_with(order)?),
            PrimitiveKind::I64 => Value::I64(self.read_i64_with(order)?),
            PrimitiveKind::F16 => Value::F16(self.read_f16_with(order)?),
            PrimitiveKind::F32 => Value::F32(self.read_f32_with(order)?),
            PrimitiveKind::F64 => Value::F64(self.read_f64_with(order)?),
            PrimitiveKind::Decimal => Value::Decimal(self.read_decimal_with(order)?),
            PrimitiveKind::Guid => Value::Guid(self.read_guid_with(order)?),
        })
    }

    /// Reads exactly `len` bytes and decodes them. With `trim`, trailing whitespace and NULs
    /// are removed. Malformed sequences decode to U+FFFD.
    pub fn read_string_fixed(&mut self, len: usize, trim: bool) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        let text = self.encoding.decode_lossy(&bytes);
        if trim {
            let kept = text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
            return Ok(kept.to_owned());
        }
        Ok(text)
    }

    /// Reads a null-terminated string.
    ///
    /// Without `max_len`, bytes are consumed up to and including the terminator, or to the end
    /// of the stream. With `max_len`, exactly `max_len` bytes are consumed and the string ends
    /// at the first terminator inside them, decoding malformed sequences to U+FFFD.
    pub fn read_string_null_terminated(&mut self, max_len: Option<usize>) -> Result<String> {
        if let Some(cap) = max_len {
            let mut bytes = self.read_bytes(cap)?;
            if let Some(end) = self.encoding.find_terminator(&bytes) {
                bytes.truncate(end);
            }
            return Ok(self.encoding.decode_lossy(&bytes));
        }

        let unit = self.encoding.unit_size();
        let mut scratch = [0u8; 2];
        let mut bytes = Vec::new();
        loop {
            let chunk = &mut scratch[..unit];
            if read_up_to(&mut self.inner, chunk)? < unit || chunk.iter().all(|b| *b == 0) {
                break;
            }
            bytes.extend_from_slice(chunk);
            if bytes.len() > self.max_string_len {
                return Err(CodecError::bounds(format!(
                    "unterminated string longer than {} bytes",
                    self.max_string_len
                )));
            }
        }
        self.encoding.decode(&bytes)
    }

    /// Reads an `i32` byte count in the reader's byte order, then that many bytes.
    pub fn read_string_length_prefixed(&mut self) -> Result<String> {
        let declared = self.read_i32()?;
        let len = usize::try_from(declared)
            .map_err(|_| CodecError::bounds(format!("negative string length {declared}")))?;
        if len > self.max_string_len {
            return Err(CodecError::bounds(format!(
                "string length {len} exceeds the limit of {} bytes",
                self.max_string_len
            )));
        }
        let bytes = self.read_bytes(len)?;
        self.encoding.decode(&bytes)
    }

    /// Reads a string framed by `rule`.
    pub fn read_string(&mut self, rule: StringRule) -> Result<String> {
        match rule {
            StringRule::FixedLength { len, trim: true, .. } => self.read_string_fixed(len, true),
            StringRule::FixedLength { len, pad, .. } => {
                let text = self.read_string_fixed(len, false)?;
                Ok(text.trim_end_matches(|c: char| c == pad || c == '\0').to_owned())
            }
            StringRule::NullTerminated { max_len } => self.read_string_null_terminated(max_len),
            StringRule::LengthPrefixed => self.read_string_length_prefixed(),
        }
    }

    /// Reads a string framed by `rule` without advancing.
    pub fn peek_string(&mut self, rule: StringRule) -> Result<String> {
        self.peek(|r| r.read_string(rule))
    }

    /// Reads one fixed-size record, swapping its packs when the reader's byte order is not
    /// the platform's.
    pub fn read_bufferable<T: Bufferable>(&mut self) -> Result<T> {
        let mut bytes = self.read_bytes(T::SIZE)?;
        if !self.order.is_native() {
            reverse_packs(&mut bytes, T::PACK_SIZE);
        }
        Ok(T::read_from(&bytes))
    }

    /// Reads `count` consecutive records into an owned buffer view, converted to native order.
    pub fn read_buffer<T: Bufferable>(&mut self, count: usize) -> Result<BufferedCollection<T>> {
        let len = T::SIZE.checked_mul(count).ok_or_else(|| {
            CodecError::bounds(format!("{count} records of {} bytes overflow", T::SIZE))
        })?;
        let bytes = self.read_bytes(len)?;
        let mut buffer = BufferedCollection::with_count(bytes, count)?;
        if !self.order.is_native() {
            buffer.reverse_byte_order();
        }
        Ok(buffer)
    }
}

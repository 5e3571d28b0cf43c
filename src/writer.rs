//! Endian-aware writing, the mirror of [`crate::reader`].
//!
//! Writers must be able to seek forward: structures are written field by field at their
//! declared offsets, not appended in sequence.

use crate::buffer::Bufferable;
use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::io::{seek_target, stream_len};
use crate::layout::StringRule;
use crate::order::{ByteOrder, TextEncoding, reverse_packs};
use crate::value::{Decimal, Half, Value};
use byteorder::{BigEndian as BE, LittleEndian as LE, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use uuid::Uuid;

const FILL_BLOCK: usize = 4096;

macro_rules! write_primitives {
    ($($ty:ty => $write:ident, $write_with:ident;)*) => {
        $(
            #[doc = concat!("Writes a `", stringify!($ty), "` in the writer's byte order.")]
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                self.$write_with(value, self.order)
            }

            #[doc = concat!("Writes a `", stringify!($ty), "` in `order`.")]
            pub fn $write_with(&mut self, value: $ty, order: ByteOrder) -> Result<()> {
                match order {
                    ByteOrder::LittleEndian => self.inner.$write::<LE>(value)?,
                    ByteOrder::BigEndian => self.inner.$write::<BE>(value)?,
                }
                Ok(())
            }
        )*
    };
}

/// Writes primitives, strings and declared structures to a seekable stream.
#[derive(Debug)]
pub struct EndianWriter<W> {
    inner: W,
    origin: u64,
    order: ByteOrder,
    encoding: TextEncoding,
    plan_cache: bool,
}

impl<W: Write + Seek> EndianWriter<W> {
    /// Wraps `inner` with the given ambient byte order and default settings otherwise.
    pub fn new(inner: W, order: ByteOrder) -> Self {
        Self::with_config(inner, &CodecConfig::default().with_byte_order(order))
    }

    /// Wraps `inner` using `config`.
    pub fn with_config(inner: W, config: &CodecConfig) -> Self {
        Self {
            inner,
            origin: 0,
            order: config.byte_order,
            encoding: config.encoding,
            plan_cache: config.plan_cache,
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

    /// Absolute stream address that this writer treats as zero.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Shared access to the stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutable access to the stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Flushes the stream.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Total length of the underlying stream, ignoring the origin.
    pub fn stream_len(&mut self) -> Result<u64> {
        Ok(stream_len(&mut self.inner)?)
    }

    /// Position relative to the origin.
    pub fn position(&mut self) -> Result<u64> {
        let absolute = self.inner.stream_position()?;
        absolute.checked_sub(self.origin).ok_or_else(|| {
            CodecError::bounds(format!(
                "cursor {absolute} is before the writer origin {}",
                self.origin
            ))
        })
    }

    /// Seeks like [`crate::EndianReader::seek`].
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

    /// Seeks to `offset` from the origin, zero-filling if that lies past the end of the stream.
    pub fn extend_to(&mut self, offset: u64) -> Result<()> {
        let absolute = self.absolute(offset)?;
        let len = self.stream_len()?;
        if absolute > len {
            self.inner.seek(SeekFrom::Start(len))?;
            self.fill_absolute(0, absolute - len)?;
        }
        self.inner.seek(SeekFrom::Start(absolute))?;
        Ok(())
    }

    /// Creates a view whose address zero is `origin` bytes past this writer's origin.
    ///
    /// Unlike readers, writers may create views past the current end of the stream.
    pub fn virtual_writer_at(&mut self, origin: u64) -> Result<EndianWriter<&mut W>> {
        let absolute = self.absolute(origin)?;
        self.inner.seek(SeekFrom::Start(absolute))?;
        Ok(EndianWriter {
            inner: &mut self.inner,
            origin: absolute,
            order: self.order,
            encoding: self.encoding,
            plan_cache: self.plan_cache,
        })
    }

    /// Writes all of `bytes`.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Writes `len` copies of `byte`.
    pub fn fill(&mut self, byte: u8, len: u64) -> Result<()> {
        self.fill_absolute(byte, len)
    }

    fn fill_absolute(&mut self, byte: u8, len: u64) -> Result<()> {
        let block = [byte; FILL_BLOCK];
        let mut remaining = len;
        while remaining > 0 {
            let n = usize::try_from(remaining).map_or(FILL_BLOCK, |r| r.min(FILL_BLOCK));
            self.inner.write_all(&block[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    /// Writes one signed byte.
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.inner.write_i8(value)?)
    }

    /// Writes a boolean as one byte, `1` or `0`.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    write_primitives! {
        u16 => write_u16, write_u16_with;
        i16 => write_i16, write_i16_with;
        u32 => write_u32, write_u32_with;
        i32 => write_i32, write_i32_with;
        u64 => write_u64, write_u64_with;
        i64 => write_i64, write_i64_with;
        f32 => write_f32, write_f32_with;
        f64 => write_f64, write_f64_with;
    }

    /// Writes a half-precision float in the writer's byte order.
    pub fn write_f16(&mut self, value: Half) -> Result<()> {
        self.write_f16_with(value, self.order)
    }

    /// Writes a half-precision float in `order`.
    pub fn write_f16_with(&mut self, value: Half, order: ByteOrder) -> Result<()> {
        self.write_u16_with(value.to_bits(), order)
    }

    /// Writes a decimal in the writer's byte order.
    pub fn write_decimal(&mut self, value: Decimal) -> Result<()> {
        self.write_decimal_with(value, self.order)
    }

    /// Writes a decimal in `order`. See [`crate::EndianReader::read_decimal_with`].
    pub fn write_decimal_with(&mut self, value: Decimal, order: ByteOrder) -> Result<()> {
        let bits = value.bits();
        match order {
            ByteOrder::LittleEndian => {
                for word in bits {
                    self.inner.write_i32::<LE>(word)?;
                }
            }
            ByteOrder::BigEndian => {
                for word in bits.iter().rev() {
                    self.inner.write_i32::<BE>(*word)?;
                }
            }
        }
        Ok(())
    }

    /// Writes a GUID in the writer's byte order.
    pub fn write_guid(&mut self, value: &Uuid) -> Result<()> {
        self.write_guid_with(value, self.order)
    }

    /// Writes a GUID: an `i32`, two `i16` in `order`, then eight raw bytes.
    #[allow(clippy::cast_possible_wrap)]
    pub fn write_guid_with(&mut self, value: &Uuid, order: ByteOrder) -> Result<()> {
        let (a, b, c, d) = value.as_fields();
        self.write_i32_with(a as i32, order)?;
        self.write_i16_with(b as i16, order)?;
        self.write_i16_with(c as i16, order)?;
        self.write_bytes(d)
    }

    /// Writes one primitive.
    pub fn write_value(&mut self, value: Value, order: ByteOrder) -> Result<()> {
        match value {
            Value::Bool(v) => self.write_bool(v),
            Value::U8(v) => self.write_u8(v),
            Value::I8(v) => self.write_i8(v),
            Value::U16(v) => self.write_u16_with(v, order),
            Value::I16(v) => self.write_i16_with(v, order),
            Value::U32(v) => self.write_u32_with(v, order),
            Value::I32(v) => self.write_i32_with(v, order),
            Value::U64(v) => self.write_u64_with(v, order),
            Value::I64(v) => self.write_i64_with(v, order),
            Value::F16(v) => self.write_f16_with(v, order),
            Value::F32(v) => self.write_f32_with(v, order),
            Value::F64(v) => self.write_f64_with(v, order),
            Value::Decimal(v) => self.write_decimal_with(v, order),
            Value::Guid(v) => self.write_guid_with(&v, order),
        }
    }

    /// Encodes as many whole characters of `text` as fit in `limit` bytes.
    fn encode_within(&self, text: &str, limit: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(limit.min(text.len()));
        let mut utf8 = [0u8; 4];
        for c in text.chars() {
            let encoded = self.encoding.encode(c.encode_utf8(&mut utf8))?;
            if out.len() + encoded.len() > limit {
                break;
            }
            out.extend_from_slice(&encoded);
        }
        Ok(out)
    }

    /// Writes exactly `len` bytes: `text` truncated to fit, then padded with `pad`.
    pub fn write_string_fixed(&mut self, text: &str, len: usize, pad: char) -> Result<()> {
        let mut bytes = self.encode_within(text, len)?;
        let mut utf8 = [0u8; 4];
        let pad_bytes = self.encoding.encode(pad.encode_utf8(&mut utf8))?;
        while !pad_bytes.is_empty() && bytes.len() + pad_bytes.len() <= len {
            bytes.extend_from_slice(&pad_bytes);
        }
        bytes.resize(len, 0);
        self.write_bytes(&bytes)
    }

    /// Writes a null-terminated string.
    ///
    /// Without `max_len`, the encoded text is followed by one terminator unit. With `max_len`,
    /// exactly `max_len` bytes are written: the text truncated to fit, then NUL padding.
    pub fn write_string_null_terminated(&mut self, text: &str, max_len: Option<usize>) -> Result<()> {
        let unit = self.encoding.unit_size();
        match max_len {
            Some(cap) => {
                let mut bytes = self.encode_within(text, cap)?;
                bytes.resize(cap, 0);
                self.write_bytes(&bytes)
            }
            None => {
                let mut bytes = self.encoding.encode(text)?;
                if self.encoding.find_terminator(&bytes).is_some() {
                    return Err(CodecError::Encoding(
                        "null-terminated string contains a NUL character".into(),
                    ));
                }
                bytes.resize(bytes.len() + unit, 0);
                self.write_bytes(&bytes)
            }
        }
    }

    /// Writes an `i32` byte count in the writer's byte order, then the encoded text.
    pub fn write_string_length_prefixed(&mut self, text: &str) -> Result<()> {
        let bytes = self.encoding.encode(text)?;
        let len = i32::try_from(bytes.len()).map_err(|_| {
            CodecError::bounds(format!("string of {} bytes is too long to prefix", bytes.len()))
        })?;
        self.write_i32(len)?;
        self.write_bytes(&bytes)
    }

    /// Writes a string framed by `rule`.
    pub fn write_string(&mut self, text: &str, rule: StringRule) -> Result<()> {
        match rule {
            StringRule::FixedLength { len, pad, .. } => self.write_string_fixed(text, len, pad),
            StringRule::NullTerminated { max_len } => {
                self.write_string_null_terminated(text, max_len)
            }
            StringRule::LengthPrefixed => self.write_string_length_prefixed(text),
        }
    }

    /// Writes one fixed-size record, swapping its packs when the writer's byte order is not
    /// the platform's.
    pub fn write_bufferable<T: Bufferable>(&mut self, value: &T) -> Result<()> {
        let mut bytes = vec![0; T::SIZE];
        value.write_to(&mut bytes);
        if !self.order.is_native() {
            reverse_packs(&mut bytes, T::PACK_SIZE);
        }
        self.write_bytes(&bytes)
    }
}

impl<W: Read + Write + Seek> EndianWriter<W> {
    /// Inserts `bytes` at the cursor, shifting the rest of the stream forward. The cursor ends
    /// up just past the inserted bytes.
    pub fn insert(&mut self, bytes: &[u8]) -> Result<()> {
        let at = self.inner.stream_position()?;
        let mut tail = Vec::new();
        self.inner.read_to_end(&mut tail)?;
        self.inner.seek(SeekFrom::Start(at))?;
        self.inner.write_all(bytes)?;
        self.inner.write_all(&tail)?;
        self.inner.seek(SeekFrom::Start(at + bytes.len() as u64))?;
        Ok(())
    }

    /// Copies `len` bytes from `source` to `destination`, both relative to the origin. The
    /// regions may overlap. The cursor is restored afterwards.
    pub fn copy(&mut self, source: u64, destination: u64, len: usize) -> Result<()> {
        let restore = self.inner.stream_position()?;
        self.seek_to(source)?;
        let mut bytes = vec![0; len];
        self.inner.read_exact(&mut bytes)?;
        self.seek_to(destination)?;
        self.inner.write_all(&bytes)?;
        self.inner.seek(SeekFrom::Start(restore))?;
        Ok(())
    }
}

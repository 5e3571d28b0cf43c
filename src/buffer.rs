//! Typed, zero-copy views over byte buffers.
//!
//! A [`DataBuffer`] interprets a byte buffer as `count` records of a fixed-size type, each
//! `stride` bytes apart, starting `start` bytes in and `offset` bytes into each stride. The
//! geometry is validated once, at construction; element access after that only checks the
//! index.
//!
//! Records are decoded in native byte order. Data in the other order is converted in place
//! with [`DataBuffer::reverse_byte_order`], which swaps each *pack* (one scalar inside a
//! record) rather than the record as a whole.
//!
//! ```rust
//! use layoutio::DataBuffer;
//!
//! // Two interleaved vertices of 8 bytes: a [u16; 2] position followed by a u32 colour.
//! let mut bytes = vec![0u8; 16];
//! let mut colours = DataBuffer::<u32, _>::with_stride(&mut bytes[..], 2, 8, 4)?;
//! colours.set(1, &0xFF00_FF00)?;
//! assert_eq!(colours.get(1), Some(0xFF00_FF00));
//! assert_eq!(colours.get(2), None);
//! # Ok::<(), layoutio::CodecError>(())
//! ```

use crate::error::{CodecError, Result};
use crate::order::reverse_packs;
use crate::value::Half;
use byteorder::{ByteOrder as _, NativeEndian};
use std::fmt;
use std::marker::PhantomData;

/// A fixed-size, plain-data record that can be read from and written to raw bytes.
pub trait Bufferable: Sized {
    /// Size of one record in bytes.
    const SIZE: usize;

    /// Size of the scalar units whose bytes are swapped when the byte order changes.
    const PACK_SIZE: usize;

    /// Decodes a record from the first [`Self::SIZE`] bytes of `bytes`, in native order.
    fn read_from(bytes: &[u8]) -> Self;

    /// Encodes the record into the first [`Self::SIZE`] bytes of `bytes`, in native order.
    fn write_to(&self, bytes: &mut [u8]);
}

impl Bufferable for u8 {
    const SIZE: usize = 1;
    const PACK_SIZE: usize = 1;

    fn read_from(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_to(&self, bytes: &mut [u8]) {
        bytes[0] = *self;
    }
}

impl Bufferable for i8 {
    const SIZE: usize = 1;
    const PACK_SIZE: usize = 1;

    fn read_from(bytes: &[u8]) -> Self {
        i8::from_ne_bytes([bytes[0]])
    }

    fn write_to(&self, bytes: &mut [u8]) {
        bytes[0] = self.to_ne_bytes()[0];
    }
}

macro_rules! bufferable_scalar {
    ($($ty:ty => $size:literal, $read:ident, $write:ident;)*) => {
        $(
            impl Bufferable for $ty {
                const SIZE: usize = $size;
                const PACK_SIZE: usize = $size;

                fn read_from(bytes: &[u8]) -> Self {
                    NativeEndian::$read(bytes)
                }

                fn write_to(&self, bytes: &mut [u8]) {
                    NativeEndian::$write(bytes, *self);
                }
            }
        )*
    };
}

bufferable_scalar! {
    u16 => 2, read_u16, write_u16;
    i16 => 2, read_i16, write_i16;
    u32 => 4, read_u32, write_u32;
    i32 => 4, read_i32, write_i32;
    u64 => 8, read_u64, write_u64;
    i64 => 8, read_i64, write_i64;
    f32 => 4, read_f32, write_f32;
    f64 => 8, read_f64, write_f64;
}

impl Bufferable for Half {
    const SIZE: usize = 2;
    const PACK_SIZE: usize = 2;

    fn read_from(bytes: &[u8]) -> Self {
        Half(NativeEndian::read_u16(bytes))
    }

    fn write_to(&self, bytes: &mut [u8]) {
        NativeEndian::write_u16(bytes, self.0);
    }
}

impl<T: Bufferable, const N: usize> Bufferable for [T; N] {
    const SIZE: usize = T::SIZE * N;
    const PACK_SIZE: usize = T::PACK_SIZE;

    fn read_from(bytes: &[u8]) -> Self {
        std::array::from_fn(|i| T::read_from(&bytes[i * T::SIZE..]))
    }

    fn write_to(&self, bytes: &mut [u8]) {
        for (i, item) in self.iter().enumerate() {
            item.write_to(&mut bytes[i * T::SIZE..]);
        }
    }
}

/// A typed view over `count` strided records in a byte buffer.
pub struct DataBuffer<T, B = Vec<u8>> {
    buf: B,
    count: usize,
    start: usize,
    stride: usize,
    offset: usize,
    _marker: PhantomData<fn() -> T>,
}

/// An owned buffer view, as produced by [`crate::EndianReader::read_buffer`].
pub type BufferedCollection<T> = DataBuffer<T, Vec<u8>>;

impl<T: Bufferable, B: AsRef<[u8]>> DataBuffer<T, B> {
    /// Creates a view with explicit geometry.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] unless `offset + T::SIZE <= stride` and
    /// `start + stride * count` fits in the buffer.
    pub fn new(buf: B, count: usize, start: usize, stride: usize, offset: usize) -> Result<Self> {
        if !offset.checked_add(T::SIZE).is_some_and(|end| end <= stride) {
            return Err(CodecError::bounds(format!(
                "a {}-byte record at offset {offset} does not fit a stride of {stride}",
                T::SIZE
            )));
        }

        let len = buf.as_ref().len();
        let fits = stride
            .checked_mul(count)
            .and_then(|span| span.checked_add(start))
            .is_some_and(|end| end <= len);
        if !fits {
            return Err(CodecError::bounds(format!(
                "{count} records with stride {stride} from {start} overrun a {len}-byte buffer"
            )));
        }

        Ok(Self {
            buf,
            count,
            start,
            stride,
            offset,
            _marker: PhantomData,
        })
    }

    /// Views the whole buffer as tightly packed records. Trailing bytes that do not fill a
    /// record are ignored.
    pub fn from_buffer(buf: B) -> Result<Self> {
        let count = buf.as_ref().len() / T::SIZE.max(1);
        Self::new(buf, count, 0, T::SIZE, 0)
    }

    /// Views the first `count` tightly packed records.
    pub fn with_count(buf: B, count: usize) -> Result<Self> {
        Self::new(buf, count, 0, T::SIZE, 0)
    }

    /// Views `count` records `stride` bytes apart, each `offset` bytes into its stride.
    pub fn with_stride(buf: B, count: usize, stride: usize, offset: usize) -> Result<Self> {
        Self::new(buf, count, 0, stride, offset)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.count
    }

    /// No records.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Offset of the first stride.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Distance between records.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Offset of the record inside each stride.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn position(&self, index: usize) -> Option<usize> {
        (index < self.count).then(|| self.start + index * self.stride + self.offset)
    }

    /// The raw bytes of record `index`.
    pub fn bytes(&self, index: usize) -> Option<&[u8]> {
        let at = self.position(index)?;
        self.buf.as_ref().get(at..at + T::SIZE)
    }

    /// Decodes record `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.bytes(index).map(T::read_from)
    }

    /// Iterates over all records.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    /// Iterates over `len` records starting at `index`.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] if the range extends past the last record.
    pub fn subset(&self, index: usize, len: usize) -> Result<impl Iterator<Item = T> + '_> {
        let end = index
            .checked_add(len)
            .filter(|end| *end <= self.count)
            .ok_or_else(|| {
                CodecError::bounds(format!(
                    "records {index}..{index}+{len} exceed a view of {}",
                    self.count
                ))
            })?;
        Ok((index..end).filter_map(move |i| self.get(i)))
    }

    /// The whole underlying buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Releases the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buf
    }
}

impl<T: Bufferable, B: AsRef<[u8]> + AsMut<[u8]>> DataBuffer<T, B> {
    /// Encodes `value` into record `index`.
    ///
    /// # Errors
    /// [`CodecError::Bounds`] if `index` is past the last record.
    pub fn set(&mut self, index: usize, value: &T) -> Result<()> {
        let at = self.position(index).ok_or_else(|| {
            CodecError::bounds(format!("index {index} is out of range for {} records", self.count))
        })?;
        value.write_to(&mut self.buf.as_mut()[at..at + T::SIZE]);
        Ok(())
    }

    /// Swaps the bytes of every pack of every record, converting the view between byte
    /// orders. Bytes outside the records are untouched.
    pub fn reverse_byte_order(&mut self) {
        if T::PACK_SIZE <= 1 {
            return;
        }
        for index in 0..self.count {
            let at = self.start + index * self.stride + self.offset;
            reverse_packs(&mut self.buf.as_mut()[at..at + T::SIZE], T::PACK_SIZE);
        }
    }
}

impl<T: Bufferable> DataBuffer<T, Vec<u8>> {
    /// An owned, zero-filled view of `count` packed records.
    pub fn zeroed(count: usize) -> Result<Self> {
        let len = T::SIZE.checked_mul(count).ok_or_else(|| {
            CodecError::bounds(format!("{count} records of {} bytes overflow", T::SIZE))
        })?;
        Self::with_count(vec![0; len], count)
    }
}

impl<T, B: Clone> Clone for DataBuffer<T, B> {
    fn clone(&self) -> Self {
        Self {
            buf: self.buf.clone(),
            count: self.count,
            start: self.start,
            stride: self.stride,
            offset: self.offset,
            _marker: PhantomData,
        }
    }
}

impl<T, B> fmt::Debug for DataBuffer<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBuffer")
            .field("type", &std::any::type_name::<T>())
            .field("count", &self.count)
            .field("start", &self.start)
            .field("stride", &self.stride)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

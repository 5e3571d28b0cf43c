//! A seekable, read-only view over a sequence of independently compressed chunks.
//!
//! A [`ChunkedStream`] presents the concatenated, decompressed contents of its chunks as one
//! logical stream. Only one chunk is held in memory at a time. The chunk map is requested from
//! the [`ChunkTable`] on the first read or seek, never at construction, so tables that parse a
//! header out of the backing stream do no I/O until the data is needed.
//!
//! ```rust
//! use layoutio::chunk::{ChunkLocator, ChunkedStream};
//! use layoutio::NoCompression;
//! use std::io::{Cursor, Read, Seek, SeekFrom};
//!
//! let backing = Cursor::new(b"hello, world".to_vec());
//! let table = vec![ChunkLocator::stored(0, 7), ChunkLocator::stored(7, 5)];
//! let mut stream = ChunkedStream::new(backing, table, NoCompression);
//!
//! stream.seek(SeekFrom::Start(5))?;
//! let mut text = String::new();
//! stream.read_to_string(&mut text)?;
//! assert_eq!(text, ", world");
//! # Ok::<(), std::io::Error>(())
//! ```

use crate::compression::Decompressor;
use crate::error::{CodecError, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, trace};

/// Where one chunk lives in the backing stream and how large it is once decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocator {
    /// Absolute offset of the chunk in the backing stream.
    pub source_offset: u64,
    /// Bytes occupied in the backing stream. `None` marks a chunk stored without
    /// compression, occupying `uncompressed_size` bytes.
    pub compressed_size: Option<u64>,
    /// Size of the chunk in the logical stream.
    pub uncompressed_size: u64,
}

impl ChunkLocator {
    /// A compressed chunk.
    pub const fn compressed(source_offset: u64, compressed_size: u64, uncompressed_size: u64) -> Self {
        Self {
            source_offset,
            compressed_size: Some(compressed_size),
            uncompressed_size,
        }
    }

    /// A chunk stored as-is.
    pub const fn stored(source_offset: u64, size: u64) -> Self {
        Self {
            source_offset,
            compressed_size: None,
            uncompressed_size: size,
        }
    }

    /// Bytes to read from the backing stream.
    pub const fn source_size(&self) -> u64 {
        match self.compressed_size {
            Some(size) => size,
            None => self.uncompressed_size,
        }
    }
}

/// Supplies the chunk map of a backing stream.
///
/// Chunks are laid end to end in the logical stream in the order returned.
pub trait ChunkTable<S: ?Sized> {
    /// Builds the chunk map. Called at most once per stream, on first use.
    fn read_chunks(&mut self, base: &mut S) -> Result<Vec<ChunkLocator>>;
}

/// A chunk map known up front.
impl<S: ?Sized> ChunkTable<S> for Vec<ChunkLocator> {
    fn read_chunks(&mut self, _base: &mut S) -> Result<Vec<ChunkLocator>> {
        Ok(std::mem::take(self))
    }
}

#[derive(Debug)]
struct ChunkMap {
    chunks: Vec<ChunkLocator>,
    /// Logical offset at which each chunk starts.
    starts: Vec<u64>,
    len: u64,
}

impl ChunkMap {
    fn build(chunks: Vec<ChunkLocator>) -> Result<Self> {
        let mut starts = Vec::with_capacity(chunks.len());
        let mut len = 0u64;
        for chunk in &chunks {
            starts.push(len);
            len = len.checked_add(chunk.uncompressed_size).ok_or_else(|| {
                CodecError::bounds("total decompressed size overflows u64".to_owned())
            })?;
        }
        Ok(Self { chunks, starts, len })
    }

    /// Index of the chunk containing `position`, which must be below `len`.
    fn locate(&self, position: u64) -> Option<usize> {
        let index = self.starts.partition_point(|start| *start <= position).checked_sub(1)?;
        let end = self.starts[index] + self.chunks[index].uncompressed_size;
        (position < end).then_some(index)
    }
}

/// Decompressed, seekable access to a chunked backing stream.
#[derive(Debug)]
pub struct ChunkedStream<S, T, D> {
    base: S,
    table: T,
    decompressor: D,
    map: Option<ChunkMap>,
    position: u64,
    current: Option<usize>,
    window: Vec<u8>,
    scratch: Vec<u8>,
}

impl<S: Read + Seek, T: ChunkTable<S>, D: Decompressor> ChunkedStream<S, T, D> {
    /// Wraps `base`. Nothing is read until the first read or seek.
    pub fn new(base: S, table: T, decompressor: D) -> Self {
        Self {
            base,
            table,
            decompressor,
            map: None,
            position: 0,
            current: None,
            window: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Whether the chunk map has been built.
    pub fn is_initialized(&self) -> bool {
        self.map.is_some()
    }

    /// Current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total decompressed length. Builds the chunk map if needed.
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.map()?.len)
    }

    /// Whether the logical stream is empty. Builds the chunk map if needed.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of chunks. Builds the chunk map if needed.
    pub fn chunk_count(&mut self) -> Result<usize> {
        Ok(self.map()?.chunks.len())
    }

    /// Chunked streams are read-only.
    ///
    /// # Errors
    /// Always [`CodecError::Unsupported`].
    pub fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(CodecError::unsupported("cannot resize a chunked stream"))
    }

    /// Releases the backing stream.
    pub fn into_inner(self) -> S {
        self.base
    }

    fn map(&mut self) -> Result<&ChunkMap> {
        if self.map.is_none() {
            let chunks = self.table.read_chunks(&mut self.base)?;
            let map = ChunkMap::build(chunks)?;
            let largest = map
                .chunks
                .iter()
                .map(|c| c.uncompressed_size)
                .max()
                .unwrap_or(0);
            self.window = Vec::with_capacity(usize::try_from(largest).unwrap_or(0));
            debug!(
                chunks = map.chunks.len(),
                len = map.len,
                decompressor = self.decompressor.name(),
                "built chunk map"
            );
            self.map = Some(map);
        }
        self.map
            .as_ref()
            .ok_or_else(|| CodecError::unsupported("chunk map unavailable"))
    }

    /// Decompresses chunk `index` into the window.
    fn load(&mut self, index: usize) -> Result<()> {
        let chunk = self.map()?.chunks[index];
        let expected = usize::try_from(chunk.uncompressed_size).map_err(|_| {
            CodecError::bounds(format!("chunk {index} is too large for this platform"))
        })?;
        let source_size = usize::try_from(chunk.source_size()).map_err(|_| {
            CodecError::bounds(format!("chunk {index} is too large for this platform"))
        })?;

        self.current = None;
        self.base.seek(SeekFrom::Start(chunk.source_offset))?;
        self.scratch.clear();
        self.scratch.resize(source_size, 0);
        self.base.read_exact(&mut self.scratch)?;

        if chunk.compressed_size.is_some() {
            self.decompressor
                .decompress(&self.scratch, expected, &mut self.window)?;
        } else {
            std::mem::swap(&mut self.scratch, &mut self.window);
        }

        if self.window.len() != expected {
            return Err(CodecError::Compression(format!(
                "chunk {index} decompressed to {} bytes, expected {expected}",
                self.window.len()
            )));
        }

        trace!(
            chunk = index,
            source_offset = chunk.source_offset,
            source_size,
            size = expected,
            "materialized chunk"
        );
        self.current = Some(index);
        Ok(())
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let position = self.position;
            let map = self.map()?;
            if position >= map.len {
                break;
            }
            let index = map.locate(position).ok_or_else(|| {
                CodecError::bounds(format!("no chunk contains offset {position}"))
            })?;
            let start = map.starts[index];
            if self.current != Some(index) {
                self.load(index)?;
            }

            #[allow(clippy::cast_possible_truncation)]
            let within = (position - start) as usize;
            let available = &self.window[within..];
            let n = available.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&available[..n]);
            filled += n;
            self.position += n as u64;
        }
        Ok(filled)
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.map()?.len;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(delta) => i128::from(len) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
        };
        self.position = u64::try_from(target)
            .ok()
            .filter(|t| *t <= len)
            .ok_or_else(|| {
                CodecError::bounds(format!(
                    "seek to {target} is outside a {len}-byte chunked stream"
                ))
            })?;
        Ok(self.position)
    }
}

impl<S: Read + Seek, T: ChunkTable<S>, D: Decompressor> Read for ChunkedStream<S, T, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

impl<S: Read + Seek, T: ChunkTable<S>, D: Decompressor> Seek for ChunkedStream<S, T, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_inner(pos)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl<S: Read + Seek, T: ChunkTable<S>, D: Decompressor> Write for ChunkedStream<S, T, D> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(CodecError::unsupported("chunked streams are read-only").into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(CodecError::unsupported("chunked streams are read-only").into())
    }
}
